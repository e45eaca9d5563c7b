//! AMQP-backed delay bus.
//!
//! Topology, declared once at connect time: a durable `x-delayed-message`
//! exchange with direct routing, the main queue bound with the `notify` key,
//! and a dead-letter queue whose message TTL cycles poison tokens back into
//! the main exchange as a last-resort retry. The delay itself rides in the
//! `x-delay` header, so the broker owns the timer.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use futures_util::StreamExt;
use herald_common::{RetryStrategy, Signal, internal};
use lapin::{
    BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
        BasicQosOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
    },
    types::{AMQPValue, FieldTable},
};
use serde::Deserialize;
use tokio::sync::{Semaphore, broadcast};
use tracing::{error, warn};
use uuid::Uuid;

use crate::{
    BusError, DelayBus, token,
    worker::{self, Outcome, SHUTDOWN_GRACE_SECS, TokenProcessor, WorkerConfig},
};

/// Name of the delayed-message exchange.
pub const EXCHANGE: &str = "delayed_notifications";

/// Name of the main consumer queue.
pub const QUEUE: &str = "notifications";

/// Name of the dead-letter queue.
pub const DLQ: &str = "notifications_dlq";

/// Routing key binding the queue to the exchange.
pub const ROUTING_KEY: &str = "notify";

/// How long a dead-lettered token sits before cycling back (milliseconds).
const DLQ_MESSAGE_TTL_MS: i32 = 1000;

const fn default_vhost() -> String {
    String::new()
}

const fn default_connect_timeout_secs() -> u64 {
    10
}

const fn default_heartbeat_secs() -> u64 {
    10
}

/// Connection settings for the AMQP backend.
#[derive(Debug, Clone, Deserialize)]
pub struct AmqpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,

    /// Virtual host; empty means the broker default.
    #[serde(default = "default_vhost")]
    pub vhost: String,

    /// Connection establishment timeout, in seconds.
    ///
    /// Default: 10
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Heartbeat interval, in seconds.
    ///
    /// Default: 10
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
}

impl AmqpConfig {
    fn url(&self) -> String {
        let vhost = if self.vhost.is_empty() || self.vhost == "/" {
            "%2f"
        } else {
            self.vhost.as_str()
        };
        format!(
            "amqp://{}:{}@{}:{}/{}?heartbeat={}",
            self.user, self.pass, self.host, self.port, vhost, self.heartbeat_secs
        )
    }
}

/// Delay bus backed by an AMQP broker with the delayed-message plugin.
pub struct AmqpBus {
    connection: Connection,
    channel: Channel,
    retries: RetryStrategy,
    workers: WorkerConfig,
}

impl AmqpBus {
    /// Connect to the broker and declare the bus topology.
    ///
    /// # Errors
    /// Returns an error if the connection cannot be established within the
    /// configured timeout or any declaration fails.
    pub async fn connect(
        config: &AmqpConfig,
        retries: RetryStrategy,
        workers: WorkerConfig,
    ) -> Result<Self, BusError> {
        let connection = tokio::time::timeout(
            Duration::from_secs(config.connect_timeout_secs),
            Connection::connect(&config.url(), ConnectionProperties::default()),
        )
        .await
        .map_err(|_| BusError::ConnectTimeout)??;

        let channel = connection.create_channel().await?;
        declare_topology(&channel).await?;

        internal!("AMQP bus connected, topology declared");

        Ok(Self {
            connection,
            channel,
            retries,
            workers,
        })
    }
}

async fn declare_topology(channel: &Channel) -> Result<(), BusError> {
    let mut exchange_args = FieldTable::default();
    exchange_args.insert(
        "x-delayed-type".into(),
        AMQPValue::LongString("direct".to_string().into()),
    );
    channel
        .exchange_declare(
            EXCHANGE,
            ExchangeKind::Custom("x-delayed-message".to_string()),
            ExchangeDeclareOptions {
                durable: true,
                ..ExchangeDeclareOptions::default()
            },
            exchange_args,
        )
        .await?;

    channel
        .queue_declare(
            QUEUE,
            QueueDeclareOptions {
                durable: true,
                ..QueueDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await?;

    channel
        .queue_bind(
            QUEUE,
            EXCHANGE,
            ROUTING_KEY,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await?;

    let mut dlq_args = FieldTable::default();
    dlq_args.insert(
        "x-dead-letter-exchange".into(),
        AMQPValue::LongString(EXCHANGE.to_string().into()),
    );
    dlq_args.insert(
        "x-dead-letter-routing-key".into(),
        AMQPValue::LongString(ROUTING_KEY.to_string().into()),
    );
    dlq_args.insert("x-message-ttl".into(), AMQPValue::LongInt(DLQ_MESSAGE_TTL_MS));
    channel
        .queue_declare(
            DLQ,
            QueueDeclareOptions {
                durable: true,
                ..QueueDeclareOptions::default()
            },
            dlq_args,
        )
        .await?;

    Ok(())
}

#[async_trait]
impl DelayBus for AmqpBus {
    async fn publish_delayed(&self, id: Uuid, delay: Duration) -> Result<(), BusError> {
        let payload = token::encode(id)?;
        let delay_ms = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX).max(0);

        let mut headers = FieldTable::default();
        headers.insert("x-delay".into(), AMQPValue::LongInt(delay_ms));
        let properties = BasicProperties::default()
            .with_headers(headers)
            .with_delivery_mode(2);

        let channel = self.channel.clone();
        self.retries
            .run(|| {
                let channel = channel.clone();
                let payload = payload.clone();
                let properties = properties.clone();
                async move {
                    channel
                        .basic_publish(
                            EXCHANGE,
                            ROUTING_KEY,
                            BasicPublishOptions::default(),
                            &payload,
                            properties,
                        )
                        .await?
                        .await
                }
            })
            .await?;

        Ok(())
    }

    async fn consume(
        &self,
        processor: Arc<dyn TokenProcessor>,
        mut shutdown: broadcast::Receiver<Signal>,
    ) -> Result<(), BusError> {
        let channel = self.connection.create_channel().await?;
        channel
            .basic_qos(self.workers.prefetch, BasicQosOptions::default())
            .await?;
        let mut consumer = channel
            .basic_consume(
                QUEUE,
                "herald-worker",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        let semaphore = Arc::new(Semaphore::new(
            usize::try_from(self.workers.count).unwrap_or(usize::MAX),
        ));

        internal!(
            "Notification worker pool starting ({} workers, prefetch {})",
            self.workers.count,
            self.workers.prefetch
        );

        loop {
            tokio::select! {
                delivery = consumer.next() => {
                    let Some(delivery) = delivery else {
                        warn!("Bus consumer stream ended");
                        break;
                    };
                    let delivery = delivery?;

                    let Ok(permit) = semaphore.clone().acquire_owned().await else {
                        break;
                    };
                    let processor = processor.clone();
                    tokio::spawn(async move {
                        let outcome = worker::dispatch(processor.as_ref(), &delivery.data).await;
                        let settled = match outcome {
                            Outcome::Done => delivery.ack(BasicAckOptions::default()).await,
                            Outcome::Requeue => {
                                delivery
                                    .nack(BasicNackOptions {
                                        requeue: true,
                                        ..BasicNackOptions::default()
                                    })
                                    .await
                            }
                            Outcome::Reject => {
                                delivery
                                    .nack(BasicNackOptions {
                                        requeue: false,
                                        ..BasicNackOptions::default()
                                    })
                                    .await
                            }
                        };
                        if let Err(err) = settled {
                            error!(error = %err, "Failed to settle bus delivery");
                        }
                        drop(permit);
                    });
                }
                sig = shutdown.recv() => {
                    match sig {
                        Ok(Signal::Shutdown | Signal::Finalised) => {
                            internal!("Worker pool received shutdown signal");
                        }
                        Err(err) => {
                            error!("Worker pool shutdown channel error: {err}");
                        }
                    }
                    break;
                }
            }
        }

        // Bounded grace for in-flight handlers; anything unacked past the
        // deadline redelivers on the next startup.
        let drained = tokio::time::timeout(
            Duration::from_secs(SHUTDOWN_GRACE_SECS),
            semaphore.acquire_many(self.workers.count),
        )
        .await;
        if drained.is_err() {
            warn!("Shutdown grace exceeded; unacked tokens will be redelivered");
        }

        internal!("Worker pool stopped");
        Ok(())
    }

    async fn close(&self) {
        if let Err(err) = self.connection.close(200, "shutting down").await {
            warn!(error = %err, "Failed to close AMQP connection cleanly");
        }
    }
}

//! Top-level wiring: configuration in, running service out.

use std::{
    sync::{Arc, LazyLock},
    time::Duration,
};

use herald_bus::{BusConfig, WorkerConfig};
use herald_common::{RetryStrategy, Signal, internal, logging, tracing};
use herald_http::{HttpServer, ServerConfig};
use herald_notify::{EmailConfig, MultiNotifier, TelegramConfig};
use herald_scheduler::Scheduler;
use herald_store::{CacheConfig, CachedStore, NotificationStore, StoreConfig};
use serde::Deserialize;
use tokio::sync::broadcast;

const fn default_cache_ttl_hours() -> u64 {
    24
}

const fn default_sweep_interval_secs() -> u64 {
    60
}

/// The whole service, deserialized straight from the configuration file.
#[derive(Default, Deserialize)]
pub struct Herald {
    #[serde(default)]
    server: ServerConfig,

    #[serde(default)]
    store: StoreConfig,

    #[serde(default)]
    cache: CacheConfig,

    #[serde(default)]
    bus: BusConfig,

    /// Shared retry strategy: in-layer backend retries and the outer send
    /// attempt budget both read from here.
    #[serde(default)]
    retries: RetryStrategy,

    /// Lifetime of cached records, in hours.
    #[serde(default = "default_cache_ttl_hours")]
    cache_ttl_hours: u64,

    #[serde(default)]
    workers: WorkerConfig,

    /// Interval of the catch-up sweep over overdue pending records.
    #[serde(default = "default_sweep_interval_secs")]
    sweep_interval_secs: u64,

    /// Email sender settings; omit to leave the channel unconfigured.
    #[serde(default)]
    email: Option<EmailConfig>,

    /// Telegram sender settings; omit to leave the channel unconfigured.
    #[serde(default)]
    telegram: Option<TelegramConfig>,
}

pub static SHUTDOWN_BROADCAST: LazyLock<broadcast::Sender<Signal>> = LazyLock::new(|| {
    let (sender, _receiver) = broadcast::channel(64);
    sender
});

async fn shutdown() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!("CTRL+C entered -- Enter it again to force shutdown");
        }
        _ = terminate.recv() => {
            internal!("Terminate Signal received, shutting down");
        }
    };

    let mut receiver = SHUTDOWN_BROADCAST.subscribe();

    SHUTDOWN_BROADCAST
        .send(Signal::Shutdown)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Interrupted, e.to_string()))?;

    loop {
        tokio::select! {
            sig = receiver.recv() => {
                match sig {
                    Ok(s) => tracing::debug!("Received {s:?}"),
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(e) => tracing::debug!("Received: {e:?}"),
                }
            }

            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    Ok(())
}

impl Herald {
    /// Run the service, and everything it controls.
    ///
    /// Brings up cache, store, bus, senders, scheduler and the HTTP facade,
    /// then serves until a shutdown signal. Teardown is ordered: the worker
    /// pool and serve loops stop first, then the bus connection, then the
    /// store, then the cache.
    ///
    /// # Errors
    ///
    /// Returns an error if any backend fails to connect or a serve loop
    /// fails fatally.
    pub async fn run(self) -> anyhow::Result<()> {
        logging::init();
        self.retries.validate()?;

        internal!("Controller running");

        let cache_ttl = Duration::from_secs(self.cache_ttl_hours.saturating_mul(3600));
        let cache = self.cache.into_cache(self.retries, cache_ttl).await?;
        let backing = self.store.into_store(self.retries).await?;
        let store: Arc<dyn NotificationStore> = Arc::new(CachedStore::new(backing, cache));

        let bus = self.bus.into_bus(self.retries, self.workers).await?;
        let notifier = Arc::new(MultiNotifier::new(self.email, self.telegram));

        let scheduler = Arc::new(Scheduler::new(
            store.clone(),
            bus.clone(),
            notifier,
            self.retries,
            Duration::from_secs(self.sweep_interval_secs),
        ));

        let server = HttpServer::bind(&self.server, scheduler.clone()).await?;

        let ret = tokio::select! {
            r = server.serve(SHUTDOWN_BROADCAST.subscribe()) => {
                r.map_err(anyhow::Error::from)
            }
            r = bus.consume(scheduler.clone(), SHUTDOWN_BROADCAST.subscribe()) => {
                r.map_err(anyhow::Error::from)
            }
            r = scheduler.serve(SHUTDOWN_BROADCAST.subscribe()) => {
                r.map_err(anyhow::Error::from)
            }
            r = shutdown() => {
                r
            }
        };

        internal!("Shutting down...");

        bus.close().await;
        store.close().await;

        ret
    }
}

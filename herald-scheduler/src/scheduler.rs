//! The scheduler: create/status/cancel/list/process plus the catch-up sweep.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use herald_bus::{DelayBus, Outcome, TokenProcessor};
use herald_common::{CreateNotification, Notification, RetryStrategy, Signal, Status, internal};
use herald_notify::Notifier;
use herald_store::NotificationStore;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::SchedulerError;

/// Delay from now until `send_at`, floored at zero.
fn delay_until(send_at: DateTime<Utc>) -> Duration {
    (send_at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
}

/// The delayed-delivery state machine over store, bus and senders.
///
/// Processing is idempotent: the store's status gate means a duplicate bus
/// delivery, a redelivered token after an unclean shutdown, or a cancel
/// racing a fire can never move a record out of a terminal status.
pub struct Scheduler {
    store: Arc<dyn NotificationStore>,
    bus: Arc<dyn DelayBus>,
    notifier: Arc<dyn Notifier>,
    retries: RetryStrategy,
    sweep_interval: Duration,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        bus: Arc<dyn DelayBus>,
        notifier: Arc<dyn Notifier>,
        retries: RetryStrategy,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            store,
            bus,
            notifier,
            retries,
            sweep_interval,
        }
    }

    /// Persist a fresh `Pending` record and arm its bus timer.
    ///
    /// A bus publish failure after the persist is logged, not returned: the
    /// catch-up sweep republishes any overdue record, so the create has
    /// already succeeded from the caller's point of view.
    pub async fn create(
        &self,
        request: CreateNotification,
    ) -> Result<Notification, SchedulerError> {
        if request.send_at <= Utc::now() {
            return Err(SchedulerError::SendAtInPast);
        }

        let record = Notification::from_request(request);
        self.store.create(&record).await?;

        let delay = delay_until(record.send_at);
        if let Err(err) = self.bus.publish_delayed(record.id, delay).await {
            warn!(
                id = %record.id,
                error = %err,
                "Failed to publish to bus; the catch-up sweep will recover this record"
            );
        }

        info!(id = %record.id, channel = %record.channel, send_at = %record.send_at, "Notification scheduled");
        Ok(record)
    }

    /// Current status of a record.
    pub async fn status(&self, id: Uuid) -> Result<Status, SchedulerError> {
        let record = self.store.get(id).await?.ok_or(SchedulerError::NotFound)?;
        Ok(record.status)
    }

    /// Cancel a still-pending record.
    ///
    /// The transition is gated on the record still being `Pending` at the
    /// store; losing that race against a concurrent fire reports
    /// [`SchedulerError::CannotCancel`] just like an already-terminal record.
    pub async fn cancel(&self, id: Uuid) -> Result<(), SchedulerError> {
        let record = self.store.get(id).await?.ok_or(SchedulerError::NotFound)?;
        if record.status != Status::Pending {
            return Err(SchedulerError::CannotCancel);
        }

        if self.store.update_status(id, Status::Cancelled).await? {
            info!(id = %id, "Notification cancelled");
            Ok(())
        } else {
            Err(SchedulerError::CannotCancel)
        }
    }

    /// The most recent records, newest first.
    pub async fn list(&self) -> Result<Vec<Notification>, SchedulerError> {
        Ok(self.store.list().await?)
    }

    /// One processing attempt for a fired token.
    ///
    /// Duplicate deliveries are no-ops (the record is no longer `Pending`),
    /// early deliveries are pushed back onto the bus, and a send failure
    /// either republishes with backoff or, once the attempt budget is
    /// spent, marks the record `Failed`.
    pub async fn process(&self, id: Uuid) -> Result<(), SchedulerError> {
        let Some(record) = self.store.get(id).await? else {
            return Err(SchedulerError::NotFound);
        };

        if record.status != Status::Pending {
            info!(id = %id, status = %record.status, "Notification already processed");
            return Ok(());
        }

        if !record.is_due() {
            debug!(id = %id, send_at = %record.send_at, "Token fired early, republishing");
            self.bus
                .publish_delayed(id, delay_until(record.send_at))
                .await?;
            return Ok(());
        }

        let notifier = self.notifier.clone();
        let send_result = self
            .retries
            .run(move || {
                let notifier = notifier.clone();
                let record = record.clone();
                async move { notifier.send(&record).await }
            })
            .await;

        match send_result {
            Ok(()) => {
                if self.store.update_status(id, Status::Sent).await? {
                    info!(id = %id, "Notification sent");
                } else {
                    // Cancelled while the send was in flight; the terminal
                    // status wins and the side effect stands.
                    warn!(id = %id, "Send completed but the record was no longer pending");
                }
                Ok(())
            }
            Err(err) => {
                error!(id = %id, error = %err, "Failed to send notification");

                if !self.store.increment_retry(id).await? {
                    // The record left Pending concurrently; nothing further
                    // to do here.
                    return Ok(());
                }
                let updated = self.store.get(id).await?.ok_or(SchedulerError::NotFound)?;
                let budget = i32::try_from(self.retries.attempts).unwrap_or(i32::MAX);

                if updated.retries >= budget {
                    self.store.update_status(id, Status::Failed).await?;
                    warn!(id = %id, retries = updated.retries, "Notification failed permanently");
                } else {
                    let attempt = u32::try_from(updated.retries).unwrap_or(u32::MAX);
                    let delay = self.retries.delay_for(attempt);
                    debug!(id = %id, retries = updated.retries, delay_ms = delay.as_millis(), "Republishing for retry");
                    self.bus.publish_delayed(id, delay).await?;
                }
                Ok(())
            }
        }
    }

    /// Run the catch-up sweep until shutdown.
    ///
    /// The first pass runs immediately so records stranded by a publish
    /// failure or a bus outage are republished at startup; after that the
    /// sweep fires on the configured interval.
    pub async fn serve(
        &self,
        mut shutdown: broadcast::Receiver<Signal>,
    ) -> Result<(), SchedulerError> {
        internal!("Catch-up sweep starting");
        self.sweep().await;

        let mut timer = tokio::time::interval(self.sweep_interval);
        timer.tick().await; // skip the immediate tick

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    self.sweep().await;
                }
                sig = shutdown.recv() => {
                    match sig {
                        Ok(Signal::Shutdown | Signal::Finalised) => {
                            internal!("Catch-up sweep shutting down");
                        }
                        Err(err) => {
                            error!("Catch-up sweep shutdown channel error: {err}");
                        }
                    }
                    break;
                }
            }
        }

        Ok(())
    }

    /// Republish every overdue `Pending` record. Errors are logged and left
    /// for the next pass.
    async fn sweep(&self) {
        match self.store.get_pending().await {
            Ok(records) if !records.is_empty() => {
                info!(count = records.len(), "Catch-up sweep republishing overdue records");
                for record in records {
                    if let Err(err) = self.bus.publish_delayed(record.id, Duration::ZERO).await {
                        warn!(id = %record.id, error = %err, "Sweep republish failed");
                    }
                }
            }
            Ok(_) => {
                debug!("Catch-up sweep found nothing overdue");
            }
            Err(err) => {
                error!(error = %err, "Catch-up sweep could not query pending records");
            }
        }
    }
}

#[async_trait]
impl TokenProcessor for Scheduler {
    async fn process(&self, id: Uuid) -> Outcome {
        match Self::process(self, id).await {
            Ok(()) => Outcome::Done,
            Err(SchedulerError::NotFound) => {
                info!(id = %id, "Dropping token for a deleted record");
                Outcome::Done
            }
            Err(err) => {
                error!(id = %id, error = %err, "Processing failed, token will redeliver");
                Outcome::Requeue
            }
        }
    }
}

//! In-memory delay bus.
//!
//! Timers are tokio sleeps feeding an unbounded channel; a nacked token is
//! re-sent after a short pause. Single consumer. Intended for tests and
//! development mode, but the at-least-once and not-before-delay contracts
//! match the AMQP backend.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use herald_common::{Signal, internal};
use tokio::sync::{Semaphore, broadcast, mpsc};
use uuid::Uuid;

use crate::{
    BusError, DelayBus, token,
    worker::{self, Outcome, SHUTDOWN_GRACE_SECS, TokenProcessor, WorkerConfig},
};

/// Pause before an in-memory redelivery, so a hot failure does not spin.
const REDELIVERY_PAUSE: Duration = Duration::from_millis(50);

/// Delay bus backed by tokio timers and a channel.
pub struct MemoryBus {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<Vec<u8>>>>,
    workers: WorkerConfig,
}

impl MemoryBus {
    /// Create a new in-memory bus.
    #[must_use]
    pub fn new(workers: WorkerConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            workers,
        }
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new(WorkerConfig::default())
    }
}

#[async_trait]
impl DelayBus for MemoryBus {
    async fn publish_delayed(&self, id: Uuid, delay: Duration) -> Result<(), BusError> {
        let payload = token::encode(id)?;
        let tx = self.tx.clone();
        if delay.is_zero() {
            tx.send(payload).map_err(|_| BusError::Closed)?;
        } else {
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = tx.send(payload);
            });
        }
        Ok(())
    }

    async fn consume(
        &self,
        processor: Arc<dyn TokenProcessor>,
        mut shutdown: broadcast::Receiver<Signal>,
    ) -> Result<(), BusError> {
        let mut rx = self
            .rx
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
            .ok_or(BusError::ConsumerTaken)?;

        let semaphore = Arc::new(Semaphore::new(
            usize::try_from(self.workers.count).unwrap_or(usize::MAX),
        ));

        internal!("In-memory worker pool starting ({} workers)", self.workers.count);

        loop {
            tokio::select! {
                payload = rx.recv() => {
                    let Some(payload) = payload else { break };

                    let Ok(permit) = semaphore.clone().acquire_owned().await else {
                        break;
                    };
                    let processor = processor.clone();
                    let tx = self.tx.clone();
                    tokio::spawn(async move {
                        match worker::dispatch(processor.as_ref(), &payload).await {
                            Outcome::Done | Outcome::Reject => {}
                            Outcome::Requeue => {
                                tokio::time::sleep(REDELIVERY_PAUSE).await;
                                let _ = tx.send(payload);
                            }
                        }
                        drop(permit);
                    });
                }
                sig = shutdown.recv() => {
                    if sig.is_err() {
                        internal!("In-memory worker pool shutdown channel closed");
                    }
                    break;
                }
            }
        }

        let drained = tokio::time::timeout(
            Duration::from_secs(SHUTDOWN_GRACE_SECS),
            semaphore.acquire_many(self.workers.count),
        )
        .await;
        drop(drained);

        internal!("In-memory worker pool stopped");
        Ok(())
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        time::Instant,
    };

    use tokio::sync::Notify;

    use super::*;

    /// Test processor that records every delivered id and replays scripted
    /// outcomes, defaulting to `Done` once the script runs out.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(Uuid, Instant)>>,
        outcomes: Mutex<VecDeque<Outcome>>,
        notify: Notify,
    }

    impl Recorder {
        fn scripted(outcomes: Vec<Outcome>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                ..Self::default()
            })
        }

        fn deliveries(&self) -> Vec<(Uuid, Instant)> {
            self.seen.lock().expect("Recorder mutex poisoned").clone()
        }

        async fn wait_for_count(&self, expected: usize, timeout: Duration) {
            tokio::time::timeout(timeout, async {
                loop {
                    if self.deliveries().len() >= expected {
                        return;
                    }
                    self.notify.notified().await;
                }
            })
            .await
            .expect("timed out waiting for deliveries");
        }
    }

    #[async_trait]
    impl TokenProcessor for Recorder {
        async fn process(&self, id: Uuid) -> Outcome {
            self.seen
                .lock()
                .expect("Recorder mutex poisoned")
                .push((id, Instant::now()));
            let outcome = self
                .outcomes
                .lock()
                .expect("Recorder mutex poisoned")
                .pop_front()
                .unwrap_or(Outcome::Done);
            self.notify.notify_waiters();
            outcome
        }
    }

    fn start_consumer(
        bus: &Arc<MemoryBus>,
        processor: Arc<Recorder>,
    ) -> broadcast::Sender<Signal> {
        let (tx, rx) = broadcast::channel(4);
        let bus = bus.clone();
        tokio::spawn(async move { bus.consume(processor, rx).await });
        tx
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn tokens_are_not_delivered_before_their_delay() {
        let bus = Arc::new(MemoryBus::default());
        let recorder = Recorder::scripted(vec![]);
        let shutdown = start_consumer(&bus, recorder.clone());

        let id = Uuid::new_v4();
        let published_at = Instant::now();
        let delay = Duration::from_millis(150);
        bus.publish_delayed(id, delay).await.expect("publish");

        recorder.wait_for_count(1, Duration::from_secs(5)).await;
        let deliveries = recorder.deliveries();
        assert_eq!(deliveries[0].0, id);
        assert!(deliveries[0].1.duration_since(published_at) >= delay);

        let _ = shutdown.send(Signal::Shutdown);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn requeued_tokens_are_redelivered() {
        let bus = Arc::new(MemoryBus::default());
        let recorder = Recorder::scripted(vec![Outcome::Requeue]);
        let shutdown = start_consumer(&bus, recorder.clone());

        let id = Uuid::new_v4();
        bus.publish_delayed(id, Duration::ZERO).await.expect("publish");

        recorder.wait_for_count(2, Duration::from_secs(5)).await;
        let ids: Vec<_> = recorder.deliveries().iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![id, id]);

        let _ = shutdown.send(Signal::Shutdown);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rejected_tokens_are_dropped() {
        let bus = Arc::new(MemoryBus::default());
        let recorder = Recorder::scripted(vec![Outcome::Reject]);
        let shutdown = start_consumer(&bus, recorder.clone());

        let id = Uuid::new_v4();
        bus.publish_delayed(id, Duration::ZERO).await.expect("publish");

        recorder.wait_for_count(1, Duration::from_secs(5)).await;
        tokio::time::sleep(REDELIVERY_PAUSE * 3).await;
        assert_eq!(recorder.deliveries().len(), 1);

        let _ = shutdown.send(Signal::Shutdown);
    }

    #[tokio::test]
    async fn second_consumer_is_refused() {
        let bus = MemoryBus::default();
        let recorder = Recorder::scripted(vec![]);
        let (tx, rx) = broadcast::channel(4);

        let _ = tx.send(Signal::Shutdown);
        bus.consume(recorder.clone(), rx).await.expect("first consume");

        let result = bus.consume(recorder, tx.subscribe()).await;
        assert!(matches!(result, Err(BusError::ConsumerTaken)));
    }
}

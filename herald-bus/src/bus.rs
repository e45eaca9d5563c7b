//! The delay bus contract.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use herald_common::Signal;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{BusError, worker::TokenProcessor};

/// A bus that holds back tokens until their delay elapses.
///
/// Delivery is at-least-once: a token may fire more than once (redelivery
/// after a nack or an unclean shutdown), and ordering across ids is not
/// guaranteed. Consumers must tolerate duplicates.
#[async_trait]
pub trait DelayBus: Send + Sync {
    /// Enqueue a token carrying `id`, to be delivered to a consumer no
    /// earlier than `delay` from now.
    async fn publish_delayed(&self, id: Uuid, delay: Duration) -> Result<(), BusError>;

    /// Run the consumer worker pool until shutdown, handing each delivered
    /// token to `processor` and settling it per the returned outcome.
    async fn consume(
        &self,
        processor: Arc<dyn TokenProcessor>,
        shutdown: broadcast::Receiver<Signal>,
    ) -> Result<(), BusError>;

    /// Close the underlying transport.
    async fn close(&self);
}

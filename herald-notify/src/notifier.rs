//! The sender contract.

use async_trait::async_trait;
use herald_common::Notification;

use crate::SendError;

/// One delivery attempt for one record.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), SendError>;
}

//! The record store contract.

use async_trait::async_trait;
use herald_common::{Notification, Status};
use uuid::Uuid;

use crate::Result;

/// How many records `list` returns at most, newest first.
pub const LIST_LIMIT: usize = 100;

/// How many due records `get_pending` returns at most, oldest `send_at` first.
pub const PENDING_LIMIT: usize = 50;

/// Durable CRUD over notification records.
///
/// Terminal statuses are enforced here: `update_status` and `increment_retry`
/// only apply while the record is still `Pending` and report whether they
/// did. This is what makes reprocessing idempotent: a duplicate bus delivery
/// or a cancel racing a fire can never clobber a terminal status.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Persist a fresh record. Fails with [`crate::StoreError::Conflict`] on
    /// a duplicate id.
    async fn create(&self, record: &Notification) -> Result<()>;

    /// Fetch a record by id. `None` means not found, not an error.
    async fn get(&self, id: Uuid) -> Result<Option<Notification>>;

    /// Set `status` and refresh `updated_at`, only while the record is still
    /// `Pending`. Returns whether the transition applied.
    async fn update_status(&self, id: Uuid, status: Status) -> Result<bool>;

    /// Atomically bump the retry count and refresh `updated_at`, only while
    /// the record is still `Pending`. Returns whether the increment applied.
    async fn increment_retry(&self, id: Uuid) -> Result<bool>;

    /// Remove the row. Reserved for operators; the scheduler never deletes.
    /// Removing an absent id is a no-op.
    async fn delete(&self, id: Uuid) -> Result<()>;

    /// The most recent records, capped at [`LIST_LIMIT`].
    async fn list(&self) -> Result<Vec<Notification>>;

    /// All `Pending` records whose `send_at` has passed, ordered by `send_at`
    /// ascending, capped at [`PENDING_LIMIT`]. Feeds the catch-up sweep.
    async fn get_pending(&self) -> Result<Vec<Notification>>;

    /// Release backend resources.
    async fn close(&self);
}

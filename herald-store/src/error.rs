//! Error types for the herald-store crate.

use thiserror::Error;
use uuid::Uuid;

/// Top-level store error type.
///
/// Backend failures surface here only after the in-layer bounded retries are
/// exhausted; callers can treat every variant except `Conflict` as a 500.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A record with this id already exists.
    #[error("notification already exists: {0}")]
    Conflict(Uuid),

    /// The database transport failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A persisted row could not be decoded back into a record.
    #[error("corrupted record {id}: {reason}")]
    Corrupted { id: String, reason: String },

    /// Internal error (lock poisoning, etc.).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Cache errors are non-fatal to store operations: a read error degrades to
/// a store read, a write error is logged.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Specialized `Result` type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

// Convenience conversion for lock poisoning
impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Self::Internal(format!("Lock poisoned: {e}"))
    }
}

//! The record cache contract.
//!
//! A key/value store in front of the record store, keyed by record id, with a
//! TTL. Cache errors are non-fatal by contract: [`crate::CachedStore`]
//! degrades a read error to a store read and logs a write error.

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use herald_common::Notification;
use uuid::Uuid;

pub use self::memory::MemoryCache;
pub use self::redis::{RedisCache, RedisConfig};

use crate::CacheError;

/// Specialized `Result` type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

pub(crate) fn cache_key(id: Uuid) -> String {
    format!("notif:{id}")
}

/// Key/value cache over serialized notification records.
#[async_trait]
pub trait RecordCache: Send + Sync {
    /// Look up a record. `None` on miss or expiry.
    async fn get(&self, id: Uuid) -> CacheResult<Option<Notification>>;

    /// Store (or replace) a record under its id for the configured TTL.
    async fn set(&self, record: &Notification) -> CacheResult<()>;

    /// Drop the entry for `id`. Absent keys are a no-op.
    async fn del(&self, id: Uuid) -> CacheResult<()>;

    /// Release backend resources.
    async fn close(&self);
}

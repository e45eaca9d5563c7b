//! Runtime selection of the store and cache backends.

use std::{sync::Arc, time::Duration};

use herald_common::RetryStrategy;
use serde::Deserialize;

use crate::{
    MemoryCache, MemoryStore, PostgresConfig, PostgresStore, RedisCache, RedisConfig,
    cache::{CacheResult, RecordCache},
    store::NotificationStore,
};

/// Configuration for the record store backend.
///
/// ```ron
/// store: Postgres((host: "localhost", port: 5432, user: "herald",
///     pass: "herald", dbname: "herald"))
/// ```
///
/// or, for development and tests:
///
/// ```ron
/// store: Memory
/// ```
#[derive(Debug, Clone, Deserialize)]
pub enum StoreConfig {
    /// Postgres-backed store (production)
    Postgres(PostgresConfig),
    /// Memory-backed store (testing/development)
    Memory,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Memory
    }
}

impl StoreConfig {
    /// Connect the configured backend and return it as a trait object.
    ///
    /// # Errors
    /// Returns an error if the Postgres pool or schema setup fails.
    pub async fn into_store(
        self,
        retries: RetryStrategy,
    ) -> crate::Result<Arc<dyn NotificationStore>> {
        match self {
            Self::Postgres(config) => Ok(Arc::new(
                PostgresStore::connect(&config, retries).await?,
            )),
            Self::Memory => Ok(Arc::new(MemoryStore::new())),
        }
    }
}

/// Configuration for the record cache backend.
#[derive(Debug, Clone, Deserialize)]
pub enum CacheConfig {
    /// Redis-backed cache (production)
    Redis(RedisConfig),
    /// Memory-backed cache (testing/development)
    Memory,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::Memory
    }
}

impl CacheConfig {
    /// Connect the configured backend and return it as a trait object.
    ///
    /// # Errors
    /// Returns an error if the Redis connection cannot be established.
    pub async fn into_cache(
        self,
        retries: RetryStrategy,
        ttl: Duration,
    ) -> CacheResult<Arc<dyn RecordCache>> {
        match self {
            Self::Redis(config) => Ok(Arc::new(
                RedisCache::connect(&config, retries, ttl).await?,
            )),
            Self::Memory => Ok(Arc::new(MemoryCache::new(ttl))),
        }
    }
}

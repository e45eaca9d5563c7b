//! Redis-backed record cache.
//!
//! Records are stored as JSON under `notif:<id>` with the configured TTL.
//! Every command runs through the bounded retry strategy.

use std::time::Duration;

use async_trait::async_trait;
use herald_common::{Notification, RetryStrategy};
use redis::{AsyncCommands, aio::ConnectionManager};
use serde::Deserialize;
use uuid::Uuid;

use super::{CacheResult, RecordCache, cache_key};

const fn default_db() -> i64 {
    0
}

/// Connection settings for the Redis backend.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,

    /// Password; empty means no AUTH.
    #[serde(default)]
    pub pass: String,

    /// Logical database index.
    ///
    /// Default: 0
    #[serde(default = "default_db")]
    pub db: i64,
}

impl RedisConfig {
    fn url(&self) -> String {
        if self.pass.is_empty() {
            format!("redis://{}:{}/{}", self.host, self.port, self.db)
        } else {
            format!("redis://:{}@{}:{}/{}", self.pass, self.host, self.port, self.db)
        }
    }
}

/// Record cache backed by Redis.
pub struct RedisCache {
    conn: ConnectionManager,
    retries: RetryStrategy,
    ttl: Duration,
}

impl RedisCache {
    /// Connect to Redis.
    ///
    /// # Errors
    /// Returns an error if the connection manager cannot be established.
    pub async fn connect(
        config: &RedisConfig,
        retries: RetryStrategy,
        ttl: Duration,
    ) -> CacheResult<Self> {
        let client = redis::Client::open(config.url())?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn, retries, ttl })
    }
}

#[async_trait]
impl RecordCache for RedisCache {
    async fn get(&self, id: Uuid) -> CacheResult<Option<Notification>> {
        let key = cache_key(id);
        let conn = self.conn.clone();
        let value: Option<String> = self
            .retries
            .run(|| {
                let mut conn = conn.clone();
                let key = key.clone();
                async move { conn.get(key).await }
            })
            .await?;

        match value {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, record: &Notification) -> CacheResult<()> {
        let key = cache_key(record.id);
        let json = serde_json::to_string(record)?;
        let ttl_secs = self.ttl.as_secs().max(1);
        let conn = self.conn.clone();
        self.retries
            .run(|| {
                let mut conn = conn.clone();
                let key = key.clone();
                let json = json.clone();
                async move { conn.set_ex::<_, _, ()>(key, json, ttl_secs).await }
            })
            .await?;
        Ok(())
    }

    async fn del(&self, id: Uuid) -> CacheResult<()> {
        let key = cache_key(id);
        let conn = self.conn.clone();
        self.retries
            .run(|| {
                let mut conn = conn.clone();
                let key = key.clone();
                async move { conn.del::<_, ()>(key).await }
            })
            .await?;
        Ok(())
    }

    async fn close(&self) {
        // ConnectionManager tears down with the last clone.
    }
}

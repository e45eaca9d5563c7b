use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use herald_common::Notification;
use uuid::Uuid;

use super::{CacheResult, RecordCache};

/// In-memory record cache with per-entry expiry.
///
/// Entries are checked lazily: an expired entry is removed on the read that
/// finds it. Intended for tests and development mode.
#[derive(Debug)]
pub struct MemoryCache {
    entries: DashMap<Uuid, (Notification, Instant)>,
    ttl: Duration,
}

impl MemoryCache {
    /// Create a cache whose entries live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Current number of live entries (expired entries may still count).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl RecordCache for MemoryCache {
    async fn get(&self, id: Uuid) -> CacheResult<Option<Notification>> {
        match self.entries.get(&id) {
            Some(entry) if entry.1 > Instant::now() => Ok(Some(entry.0.clone())),
            Some(entry) => {
                drop(entry); // release the shard lock before removing
                self.entries.remove(&id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, record: &Notification) -> CacheResult<()> {
        self.entries
            .insert(record.id, (record.clone(), Instant::now() + self.ttl));
        Ok(())
    }

    async fn del(&self, id: Uuid) -> CacheResult<()> {
        self.entries.remove(&id);
        Ok(())
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use herald_common::{Channel, CreateNotification};

    use super::*;

    fn record() -> Notification {
        Notification::from_request(CreateNotification {
            user_id: "user@example.com".to_string(),
            channel: Channel::Email,
            message: "hello".to_string(),
            send_at: Utc::now() + chrono::Duration::minutes(5),
        })
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = MemoryCache::new(Duration::from_secs(60));
        let record = record();

        cache.set(&record).await.expect("set");
        assert_eq!(cache.get(record.id).await.expect("get"), Some(record));
    }

    #[tokio::test]
    async fn del_removes_the_entry() {
        let cache = MemoryCache::new(Duration::from_secs(60));
        let record = record();

        cache.set(&record).await.expect("set");
        cache.del(record.id).await.expect("del");
        assert_eq!(cache.get(record.id).await.expect("get"), None);
    }

    #[tokio::test]
    async fn expired_entries_read_as_misses() {
        let cache = MemoryCache::new(Duration::from_millis(10));
        let record = record();

        cache.set(&record).await.expect("set");
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.get(record.id).await.expect("get"), None);
    }
}

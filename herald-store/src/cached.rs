//! Write-through/invalidate composition of a store and a cache.

use std::sync::Arc;

use async_trait::async_trait;
use herald_common::{Notification, Status};
use tracing::warn;
use uuid::Uuid;

use crate::{NotificationStore, cache::RecordCache};

/// A record store with a cache in front of it.
///
/// Reads go cache-first and populate the cache on a miss. Every mutation
/// invalidates the cache entry before the call returns success, so a reader
/// can never observe a stale status after a completed transition. Cache
/// failures never fail the operation: reads degrade to the inner store,
/// writes and invalidations are logged.
pub struct CachedStore {
    inner: Arc<dyn NotificationStore>,
    cache: Arc<dyn RecordCache>,
}

impl CachedStore {
    pub fn new(inner: Arc<dyn NotificationStore>, cache: Arc<dyn RecordCache>) -> Self {
        Self { inner, cache }
    }

    async fn populate(&self, record: &Notification) {
        if let Err(err) = self.cache.set(record).await {
            warn!(id = %record.id, error = %err, "Failed to populate record cache");
        }
    }

    async fn invalidate(&self, id: Uuid) {
        if let Err(err) = self.cache.del(id).await {
            warn!(id = %id, error = %err, "Failed to invalidate record cache");
        }
    }
}

#[async_trait]
impl NotificationStore for CachedStore {
    async fn create(&self, record: &Notification) -> crate::Result<()> {
        self.inner.create(record).await?;
        self.populate(record).await;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> crate::Result<Option<Notification>> {
        match self.cache.get(id).await {
            Ok(Some(record)) => return Ok(Some(record)),
            Ok(None) => {}
            Err(err) => {
                warn!(id = %id, error = %err, "Record cache read failed, falling back to store");
            }
        }

        let record = self.inner.get(id).await?;
        if let Some(record) = &record {
            self.populate(record).await;
        }
        Ok(record)
    }

    async fn update_status(&self, id: Uuid, status: Status) -> crate::Result<bool> {
        let applied = self.inner.update_status(id, status).await?;
        self.invalidate(id).await;
        Ok(applied)
    }

    async fn increment_retry(&self, id: Uuid) -> crate::Result<bool> {
        let applied = self.inner.increment_retry(id).await?;
        self.invalidate(id).await;
        Ok(applied)
    }

    async fn delete(&self, id: Uuid) -> crate::Result<()> {
        self.inner.delete(id).await?;
        self.invalidate(id).await;
        Ok(())
    }

    async fn list(&self) -> crate::Result<Vec<Notification>> {
        self.inner.list().await
    }

    async fn get_pending(&self) -> crate::Result<Vec<Notification>> {
        self.inner.get_pending().await
    }

    async fn close(&self) {
        self.inner.close().await;
        self.cache.close().await;
    }
}

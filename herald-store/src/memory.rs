use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;
use chrono::Utc;
use herald_common::{Notification, Status};
use uuid::Uuid;

use crate::{
    StoreError,
    store::{LIST_LIMIT, NotificationStore, PENDING_LIMIT},
};

/// In-memory record store.
///
/// Records live in a `HashMap` protected by an `RwLock`. Primarily intended
/// for tests and development mode; the status gates behave exactly like the
/// Postgres backend's conditional updates.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<HashMap<Uuid, Notification>>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current number of records.
    ///
    /// Recovers gracefully if the lock is poisoned by accessing the
    /// underlying data.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Whether the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn create(&self, record: &Notification) -> crate::Result<()> {
        let mut records = self.records.write()?;
        if records.contains_key(&record.id) {
            return Err(StoreError::Conflict(record.id));
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> crate::Result<Option<Notification>> {
        Ok(self.records.read()?.get(&id).cloned())
    }

    async fn update_status(&self, id: Uuid, status: Status) -> crate::Result<bool> {
        let mut records = self.records.write()?;
        match records.get_mut(&id) {
            Some(record) if record.status == Status::Pending => {
                record.status = status;
                record.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn increment_retry(&self, id: Uuid) -> crate::Result<bool> {
        let mut records = self.records.write()?;
        match records.get_mut(&id) {
            Some(record) if record.status == Status::Pending => {
                record.retries += 1;
                record.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> crate::Result<()> {
        self.records.write()?.remove(&id);
        Ok(())
    }

    async fn list(&self) -> crate::Result<Vec<Notification>> {
        let mut records: Vec<_> = self.records.read()?.values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        records.truncate(LIST_LIMIT);
        Ok(records)
    }

    async fn get_pending(&self) -> crate::Result<Vec<Notification>> {
        let now = Utc::now();
        let mut records: Vec<_> = self
            .records
            .read()?
            .values()
            .filter(|record| record.status == Status::Pending && record.send_at <= now)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.send_at.cmp(&b.send_at));
        records.truncate(PENDING_LIMIT);
        Ok(records)
    }

    async fn close(&self) {}
}

//! Postgres-backed record store.
//!
//! Every query runs through the configured bounded retry, so transient
//! backend errors are absorbed here and only surface once the in-layer
//! budget is exhausted. Status mutations are conditional updates
//! (`… AND status = 'pending'`) so the row itself enforces the sticky
//! terminal statuses.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use herald_common::{Notification, RetryStrategy, Status};
use serde::Deserialize;
use sqlx::{
    Row,
    postgres::{PgPool, PgPoolOptions, PgRow},
};
use uuid::Uuid;

use crate::{
    StoreError,
    store::{LIST_LIMIT, NotificationStore, PENDING_LIMIT},
};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS notifications (
    id         VARCHAR(36) PRIMARY KEY,
    user_id    VARCHAR(100) NOT NULL,
    channel    VARCHAR(20) NOT NULL,
    message    TEXT NOT NULL,
    send_at    TIMESTAMPTZ NOT NULL,
    status     VARCHAR(20) NOT NULL DEFAULT 'pending',
    retries    INTEGER NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
)";

const COLUMNS: &str =
    "id, user_id, channel, message, send_at, status, retries, created_at, updated_at";

const fn default_max_conns() -> u32 {
    10
}

const fn default_conn_max_lifetime_secs() -> u64 {
    1800
}

/// Connection settings for the Postgres backend.
#[derive(Debug, Clone, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub dbname: String,

    /// Maximum number of pooled connections.
    ///
    /// Default: 10
    #[serde(default = "default_max_conns")]
    pub max_conns: u32,

    /// Maximum lifetime of a pooled connection, in seconds.
    ///
    /// Default: 1800 (30 minutes)
    #[serde(default = "default_conn_max_lifetime_secs")]
    pub conn_max_lifetime_secs: u64,
}

impl PostgresConfig {
    fn dsn(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode=disable",
            self.user, self.pass, self.host, self.port, self.dbname
        )
    }
}

/// Record store backed by a Postgres table.
pub struct PostgresStore {
    pool: PgPool,
    retries: RetryStrategy,
}

impl PostgresStore {
    /// Connect to Postgres and ensure the notifications table exists.
    ///
    /// # Errors
    /// Returns an error if the pool cannot be established or the schema
    /// cannot be created.
    pub async fn connect(config: &PostgresConfig, retries: RetryStrategy) -> crate::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_conns)
            .max_lifetime(Duration::from_secs(config.conn_max_lifetime_secs))
            .connect(&config.dsn())
            .await?;

        let store = Self { pool, retries };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> crate::Result<()> {
        let pool = self.pool.clone();
        self.retries
            .run(|| {
                let pool = pool.clone();
                async move { sqlx::query(SCHEMA).execute(&pool).await }
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl NotificationStore for PostgresStore {
    async fn create(&self, record: &Notification) -> crate::Result<()> {
        let pool = self.pool.clone();
        let record = record.clone();
        let result = self
            .retries
            .run(|| {
                let pool = pool.clone();
                let record = record.clone();
                async move {
                    sqlx::query(
                        "INSERT INTO notifications (id, user_id, channel, message, send_at, \
                         status, retries, created_at, updated_at) \
                         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
                    )
                    .bind(record.id.to_string())
                    .bind(&record.user_id)
                    .bind(record.channel.as_str())
                    .bind(&record.message)
                    .bind(record.send_at)
                    .bind(record.status.as_str())
                    .bind(record.retries)
                    .bind(record.created_at)
                    .bind(record.updated_at)
                    .execute(&pool)
                    .await
                }
            })
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(StoreError::Conflict(record.id))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn get(&self, id: Uuid) -> crate::Result<Option<Notification>> {
        let pool = self.pool.clone();
        let row = self
            .retries
            .run(|| {
                let pool = pool.clone();
                async move {
                    sqlx::query(&format!(
                        "SELECT {COLUMNS} FROM notifications WHERE id = $1"
                    ))
                    .bind(id.to_string())
                    .fetch_optional(&pool)
                    .await
                }
            })
            .await?;

        row.as_ref().map(decode_row).transpose()
    }

    async fn update_status(&self, id: Uuid, status: Status) -> crate::Result<bool> {
        let pool = self.pool.clone();
        let result = self
            .retries
            .run(|| {
                let pool = pool.clone();
                async move {
                    sqlx::query(
                        "UPDATE notifications SET status = $1, updated_at = $2 \
                         WHERE id = $3 AND status = 'pending'",
                    )
                    .bind(status.as_str())
                    .bind(Utc::now())
                    .bind(id.to_string())
                    .execute(&pool)
                    .await
                }
            })
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn increment_retry(&self, id: Uuid) -> crate::Result<bool> {
        let pool = self.pool.clone();
        let result = self
            .retries
            .run(|| {
                let pool = pool.clone();
                async move {
                    sqlx::query(
                        "UPDATE notifications SET retries = retries + 1, updated_at = $1 \
                         WHERE id = $2 AND status = 'pending'",
                    )
                    .bind(Utc::now())
                    .bind(id.to_string())
                    .execute(&pool)
                    .await
                }
            })
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> crate::Result<()> {
        let pool = self.pool.clone();
        self.retries
            .run(|| {
                let pool = pool.clone();
                async move {
                    sqlx::query("DELETE FROM notifications WHERE id = $1")
                        .bind(id.to_string())
                        .execute(&pool)
                        .await
                }
            })
            .await?;
        Ok(())
    }

    async fn list(&self) -> crate::Result<Vec<Notification>> {
        let pool = self.pool.clone();
        let rows = self
            .retries
            .run(|| {
                let pool = pool.clone();
                async move {
                    sqlx::query(&format!(
                        "SELECT {COLUMNS} FROM notifications ORDER BY created_at DESC LIMIT $1"
                    ))
                    .bind(i64::try_from(LIST_LIMIT).unwrap_or(i64::MAX))
                    .fetch_all(&pool)
                    .await
                }
            })
            .await?;

        rows.iter().map(decode_row).collect()
    }

    async fn get_pending(&self) -> crate::Result<Vec<Notification>> {
        let pool = self.pool.clone();
        let rows = self
            .retries
            .run(|| {
                let pool = pool.clone();
                async move {
                    sqlx::query(&format!(
                        "SELECT {COLUMNS} FROM notifications \
                         WHERE status = 'pending' AND send_at <= $1 \
                         ORDER BY send_at ASC LIMIT $2"
                    ))
                    .bind(Utc::now())
                    .bind(i64::try_from(PENDING_LIMIT).unwrap_or(i64::MAX))
                    .fetch_all(&pool)
                    .await
                }
            })
            .await?;

        rows.iter().map(decode_row).collect()
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn decode_row(row: &PgRow) -> crate::Result<Notification> {
    let id: String = row.try_get("id")?;
    let channel: String = row.try_get("channel")?;
    let status: String = row.try_get("status")?;

    Ok(Notification {
        id: Uuid::parse_str(&id).map_err(|err| StoreError::Corrupted {
            id: id.clone(),
            reason: err.to_string(),
        })?,
        user_id: row.try_get("user_id")?,
        channel: channel.parse().map_err(|err: herald_common::domain::UnknownChannel| {
            StoreError::Corrupted {
                id: id.clone(),
                reason: err.to_string(),
            }
        })?,
        message: row.try_get("message")?,
        send_at: row.try_get("send_at")?,
        status: status.parse().map_err(|err: herald_common::domain::InvalidStatus| {
            StoreError::Corrupted {
                id,
                reason: err.to_string(),
            }
        })?,
        retries: row.try_get("retries")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

//! The notification record and its tagged vocabulary.
//!
//! A [`Notification`] is the sole persisted entity in herald: the store keeps
//! one row per record, the cache serializes the full record, and the bus only
//! ever carries its id.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Delivery channel a notification is routed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Telegram,
}

impl Channel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Telegram => "telegram",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = UnknownChannel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(Self::Email),
            "telegram" => Ok(Self::Telegram),
            other => Err(UnknownChannel(other.to_string())),
        }
    }
}

/// A channel tag outside the recognised set.
///
/// Raised at the edges (request validation, row decoding); the scheduler
/// itself never sees an unknown channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown notification channel: {0}")]
pub struct UnknownChannel(pub String);

/// Lifecycle status of a notification record.
///
/// `Pending` is the only non-terminal status; once a record reaches `Sent`,
/// `Cancelled` or `Failed` it never transitions again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Sent,
    Cancelled,
    Failed,
}

impl Status {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    /// Whether this status is sticky.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "sent" => Ok(Self::Sent),
            "cancelled" => Ok(Self::Cancelled),
            "failed" => Ok(Self::Failed),
            other => Err(InvalidStatus(other.to_string())),
        }
    }
}

/// A status string outside the recognised set (corrupted row or cache entry).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid notification status: {0}")]
pub struct InvalidStatus(pub String);

/// A request to schedule a notification, before an id is assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateNotification {
    pub user_id: String,
    pub channel: Channel,
    pub message: String,
    pub send_at: DateTime<Utc>,
}

/// The persisted notification record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: String,
    pub channel: Channel,
    pub message: String,
    pub send_at: DateTime<Utc>,
    pub status: Status,
    /// Count of failed send attempts; only moves while the record is Pending.
    pub retries: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Notification {
    /// Build a fresh `Pending` record for a creation request.
    #[must_use]
    pub fn from_request(request: CreateNotification) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            channel: request.channel,
            message: request.message,
            send_at: request.send_at,
            status: Status::Pending,
            retries: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the record's `send_at` instant has passed.
    #[must_use]
    pub fn is_due(&self) -> bool {
        self.send_at <= Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn request(send_at: DateTime<Utc>) -> CreateNotification {
        CreateNotification {
            user_id: "user@example.com".to_string(),
            channel: Channel::Email,
            message: "hello".to_string(),
            send_at,
        }
    }

    #[test]
    fn from_request_starts_pending_with_zero_retries() {
        let send_at = Utc::now() + Duration::minutes(5);
        let record = Notification::from_request(request(send_at));

        assert_eq!(record.status, Status::Pending);
        assert_eq!(record.retries, 0);
        assert_eq!(record.send_at, send_at);
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn fresh_ids_are_unique() {
        let send_at = Utc::now() + Duration::minutes(5);
        let a = Notification::from_request(request(send_at));
        let b = Notification::from_request(request(send_at));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn due_follows_send_at() {
        let mut record = Notification::from_request(request(Utc::now() + Duration::hours(1)));
        assert!(!record.is_due());

        record.send_at = Utc::now() - Duration::seconds(1);
        assert!(record.is_due());
    }

    #[test]
    fn channel_round_trips_through_strings() {
        for channel in [Channel::Email, Channel::Telegram] {
            assert_eq!(channel.as_str().parse::<Channel>().unwrap(), channel);
        }
        assert!("sms".parse::<Channel>().is_err());
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            Status::Pending,
            Status::Sent,
            Status::Cancelled,
            Status::Failed,
        ] {
            assert_eq!(status.as_str().parse::<Status>().unwrap(), status);
        }
        assert!("expired".parse::<Status>().is_err());
    }

    #[test]
    fn only_pending_is_non_terminal() {
        assert!(!Status::Pending.is_terminal());
        assert!(Status::Sent.is_terminal());
        assert!(Status::Cancelled.is_terminal());
        assert!(Status::Failed.is_terminal());
    }

    #[test]
    fn record_serialization_round_trips() {
        let record = Notification::from_request(request(Utc::now() + Duration::minutes(1)));
        let encoded = serde_json::to_string(&record).unwrap();
        let decoded: Notification = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn serialized_tags_are_lowercase() {
        let encoded = serde_json::to_string(&Status::Cancelled).unwrap();
        assert_eq!(encoded, "\"cancelled\"");
        let encoded = serde_json::to_string(&Channel::Telegram).unwrap();
        assert_eq!(encoded, "\"telegram\"");
    }
}

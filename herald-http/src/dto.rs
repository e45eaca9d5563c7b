//! Request and response bodies.

use chrono::{DateTime, Utc};
use herald_common::{Channel, CreateNotification, Notification, Status};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ApiError;

/// Body of `POST /api/v1/notify`.
///
/// `channel` and `send_at` arrive as strings and are validated here rather
/// than at deserialization, so a bad value produces a 400 with a usable
/// message instead of a serde rejection.
#[derive(Debug, Deserialize)]
pub struct CreateNotificationRequest {
    pub user_id: String,
    pub channel: String,
    pub message: String,
    /// RFC-3339 timestamp.
    pub send_at: String,
}

impl CreateNotificationRequest {
    /// Validate the request into a domain creation request.
    pub fn into_domain(self) -> Result<CreateNotification, ApiError> {
        if self.user_id.is_empty() {
            return Err(ApiError::Validation("user_id is required".to_string()));
        }
        if self.message.is_empty() {
            return Err(ApiError::Validation("message is required".to_string()));
        }
        let channel: Channel = self
            .channel
            .parse()
            .map_err(|err: herald_common::domain::UnknownChannel| {
                ApiError::Validation(err.to_string())
            })?;
        let send_at = DateTime::parse_from_rfc3339(&self.send_at)
            .map_err(|_| {
                ApiError::Validation("send_at must be an RFC 3339 timestamp".to_string())
            })?
            .with_timezone(&Utc);

        Ok(CreateNotification {
            user_id: self.user_id,
            channel,
            message: self.message,
            send_at,
        })
    }
}

/// A full record on the wire.
#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub id: Uuid,
    pub user_id: String,
    pub channel: Channel,
    pub message: String,
    pub send_at: DateTime<Utc>,
    pub status: Status,
    pub retries: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Notification> for NotificationResponse {
    fn from(record: Notification) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            channel: record.channel,
            message: record.message,
            send_at: record.send_at,
            status: record.status,
            retries: record.retries,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Body of `GET /api/v1/notify/{id}`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub id: Uuid,
    pub status: Status,
}

/// Confirmation body for cancel.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Uniform error body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(channel: &str, send_at: &str) -> CreateNotificationRequest {
        CreateNotificationRequest {
            user_id: "42".to_string(),
            channel: channel.to_string(),
            message: "hi".to_string(),
            send_at: send_at.to_string(),
        }
    }

    #[test]
    fn valid_requests_convert() {
        let domain = request("telegram", "2040-01-02T03:04:05Z")
            .into_domain()
            .expect("valid request");
        assert_eq!(domain.channel, Channel::Telegram);
        assert_eq!(domain.send_at.to_rfc3339(), "2040-01-02T03:04:05+00:00");
    }

    #[test]
    fn offsets_are_normalized_to_utc() {
        let domain = request("email", "2040-01-02T05:04:05+02:00")
            .into_domain()
            .expect("valid request");
        assert_eq!(domain.send_at.to_rfc3339(), "2040-01-02T03:04:05+00:00");
    }

    #[test]
    fn unknown_channels_are_rejected() {
        let result = request("sms", "2040-01-02T03:04:05Z").into_domain();
        assert!(matches!(result, Err(ApiError::Validation(msg)) if msg.contains("sms")));
    }

    #[test]
    fn malformed_timestamps_are_rejected() {
        let result = request("email", "tomorrow at noon").into_domain();
        assert!(matches!(result, Err(ApiError::Validation(msg)) if msg.contains("RFC 3339")));
    }

    #[test]
    fn empty_fields_are_rejected() {
        let mut missing_user = request("email", "2040-01-02T03:04:05Z");
        missing_user.user_id = String::new();
        assert!(missing_user.into_domain().is_err());

        let mut missing_message = request("email", "2040-01-02T03:04:05Z");
        missing_message.message = String::new();
        assert!(missing_message.into_domain().is_err());
    }
}

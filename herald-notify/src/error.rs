//! Error types for the herald-notify crate.

use herald_common::Channel;
use thiserror::Error;

use crate::smtp::SmtpError;

/// A failed delivery attempt.
///
/// Every variant counts against the retry budget; none of them surface from
/// the facade directly.
#[derive(Debug, Error)]
pub enum SendError {
    /// The record's channel has no configured sender.
    #[error("no sender configured for channel: {0}")]
    NotConfigured(Channel),

    /// The record's address does not parse for its channel.
    #[error("invalid chat id: {0}")]
    BadAddress(String),

    /// The SMTP conversation failed.
    #[error("smtp error: {0}")]
    Smtp(#[from] SmtpError),

    /// The Telegram HTTP transport failed.
    #[error("telegram transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The Telegram Bot API refused the message.
    #[error("telegram api error: {0}")]
    Api(String),
}

//! Telegram sender: one Bot API `sendMessage` call per delivery attempt.

use async_trait::async_trait;
use herald_common::Notification;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{Notifier, SendError};

/// Bot API settings for the Telegram sender.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,

    /// Override of the Bot API base URL; points at the public API when unset.
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Sender for the telegram channel.
///
/// `user_id` is the numeric chat id, carried as a string on the record.
pub struct TelegramNotifier {
    config: TelegramConfig,
    client: reqwest::Client,
}

impl TelegramNotifier {
    #[must_use]
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), SendError> {
        let chat_id: i64 = notification
            .user_id
            .parse()
            .map_err(|_| SendError::BadAddress(notification.user_id.clone()))?;

        info!(
            chat_id,
            channel = "telegram",
            id = %notification.id,
            "Sending Telegram notification"
        );

        let url = format!(
            "{}/bot{}/sendMessage",
            self.config.api_base, self.config.bot_token
        );
        let response: SendMessageResponse = self
            .client
            .post(&url)
            .json(&SendMessageRequest {
                chat_id,
                text: &notification.message,
            })
            .send()
            .await?
            .json()
            .await?;

        if response.ok {
            Ok(())
        } else {
            Err(SendError::Api(
                response
                    .description
                    .unwrap_or_else(|| "sendMessage refused".to_string()),
            ))
        }
    }
}

//! Email sender: one SMTP conversation per delivery attempt.

use async_trait::async_trait;
use herald_common::Notification;
use serde::Deserialize;
use tracing::info;

use crate::{Notifier, SendError, smtp::SmtpClient};

/// Domain announced in EHLO.
const HELO_DOMAIN: &str = "localhost";

/// SMTP settings for the email sender.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,

    /// Sender mailbox, also the AUTH identity; empty skips AUTH.
    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub pass: String,
}

/// Sender for the email channel.
///
/// `user_id` is the recipient mailbox; the envelope is a plain
/// From/To/Subject header block over the record's message.
pub struct EmailNotifier {
    config: EmailConfig,
}

impl EmailNotifier {
    #[must_use]
    pub const fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn envelope(&self, notification: &Notification) -> String {
        format!(
            "From: {}\r\nTo: {}\r\nSubject: Notification\r\n\r\n{}\r\n",
            self.config.user, notification.user_id, notification.message
        )
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), SendError> {
        info!(
            to = %notification.user_id,
            channel = "email",
            id = %notification.id,
            "Sending email notification"
        );

        let addr = format!("{}:{}", self.config.smtp_host, self.config.smtp_port);
        let mut client = SmtpClient::connect(&addr).await?;
        client.ehlo(HELO_DOMAIN).await?;
        if !self.config.user.is_empty() && !self.config.pass.is_empty() {
            client.auth_plain(&self.config.user, &self.config.pass).await?;
        }
        client.mail_from(&self.config.user).await?;
        client.rcpt_to(&notification.user_id).await?;
        client.data(&self.envelope(notification)).await?;
        client.quit().await?;

        Ok(())
    }
}

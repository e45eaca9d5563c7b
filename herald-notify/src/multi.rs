//! The sender multiplexer: one sender per channel tag.

use async_trait::async_trait;
use herald_common::{Channel, Notification};

use crate::{
    EmailConfig, EmailNotifier, Notifier, SendError, TelegramConfig, TelegramNotifier,
};

/// Dispatches a record to the sender bound to its channel.
///
/// A channel whose section is missing from the configuration simply has no
/// sender; sends on it fail with [`SendError::NotConfigured`] and follow the
/// normal retry path.
#[derive(Default)]
pub struct MultiNotifier {
    email: Option<EmailNotifier>,
    telegram: Option<TelegramNotifier>,
}

impl MultiNotifier {
    #[must_use]
    pub fn new(email: Option<EmailConfig>, telegram: Option<TelegramConfig>) -> Self {
        Self {
            email: email.map(EmailNotifier::new),
            telegram: telegram.map(TelegramNotifier::new),
        }
    }
}

#[async_trait]
impl Notifier for MultiNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), SendError> {
        match notification.channel {
            Channel::Email => match &self.email {
                Some(sender) => sender.send(notification).await,
                None => Err(SendError::NotConfigured(Channel::Email)),
            },
            Channel::Telegram => match &self.telegram {
                Some(sender) => sender.send(notification).await,
                None => Err(SendError::NotConfigured(Channel::Telegram)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use herald_common::CreateNotification;

    use super::*;

    fn notification(channel: Channel) -> Notification {
        Notification::from_request(CreateNotification {
            user_id: "42".to_string(),
            channel,
            message: "ping".to_string(),
            send_at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn unconfigured_channels_are_refused() {
        let multiplexer = MultiNotifier::new(None, None);

        let result = multiplexer.send(&notification(Channel::Email)).await;
        assert!(matches!(result, Err(SendError::NotConfigured(Channel::Email))));

        let result = multiplexer.send(&notification(Channel::Telegram)).await;
        assert!(matches!(
            result,
            Err(SendError::NotConfigured(Channel::Telegram))
        ));
    }
}

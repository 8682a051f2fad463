//! Fallback channel that writes the notification to the log

use async_trait::async_trait;
use queuewatch_core::Notification;
use tracing::info;

use crate::channel::{ChannelError, NotifyChannel};

/// Always available. Used when no desktop notifier can be found, so the
/// alert at least shows up in the log file.
#[derive(Debug, Default)]
pub struct LogChannel;

impl LogChannel {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotifyChannel for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, notification: &Notification) -> Result<(), ChannelError> {
        match &notification.board_url {
            Some(url) => info!(
                "NOTIFICATION {}: {} ({})",
                notification.title, notification.message, url
            ),
            None => info!(
                "NOTIFICATION {}: {}",
                notification.title, notification.message
            ),
        }
        Ok(())
    }
}

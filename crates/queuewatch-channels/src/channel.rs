//! The trait every notification channel implements

use async_trait::async_trait;
use queuewatch_core::Notification;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    /// The channel cannot run here; the notifier moves on without complaint
    #[error("{0} is not available")]
    Unavailable(String),

    /// The channel ran and failed
    #[error("{channel} failed: {reason}")]
    Failed { channel: String, reason: String },
}

/// A single way of showing a notification
#[async_trait]
pub trait NotifyChannel: Send + Sync {
    /// Name used in log lines
    fn name(&self) -> &str;

    /// Deliver `notification`, returning once delivery finished or failed
    async fn send(&self, notification: &Notification) -> Result<(), ChannelError>;
}

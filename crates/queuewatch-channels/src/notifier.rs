//! Ordered fallback chain of notification channels

use async_trait::async_trait;
use queuewatch_core::{AppPaths, Dispatcher, Notification, WatchConfig, WatchError};
use tracing::{debug, info, warn};

use crate::channel::{ChannelError, NotifyChannel};
use crate::log::LogChannel;
use crate::toast::{ToastChannel, ToastResolver};

/// Tries each registered channel in order until one delivers
pub struct Notifier {
    channels: Vec<Box<dyn NotifyChannel>>,
    board_url: Option<String>,
}

impl Notifier {
    pub fn new(board_url: Option<String>) -> Self {
        Self {
            channels: Vec::new(),
            board_url,
        }
    }

    /// Desktop notifier first, log as the last resort
    pub fn from_config(config: &WatchConfig, paths: &AppPaths) -> Self {
        let mut notifier = Self::new(config.board_url().map(str::to_string));
        notifier.register(Box::new(ToastChannel::new(ToastResolver::for_config(
            config, paths,
        ))));
        notifier.register(Box::new(LogChannel::new()));
        notifier
    }

    /// Append a channel to the end of the chain
    pub fn register(&mut self, channel: Box<dyn NotifyChannel>) {
        debug!("Registering notification channel: {}", channel.name());
        self.channels.push(channel);
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Deliver through the first channel that succeeds, returning its name
    pub async fn dispatch(&self, notification: &Notification) -> Result<&str, WatchError> {
        let mut failures = Vec::new();

        for channel in &self.channels {
            match channel.send(notification).await {
                Ok(()) => {
                    info!("Notification delivered via {}", channel.name());
                    return Ok(channel.name());
                }
                Err(ChannelError::Unavailable(what)) => {
                    debug!("{} unavailable, trying next channel", what);
                }
                Err(e) => {
                    warn!("Notification channel {} failed: {}", channel.name(), e);
                    failures.push(e.to_string());
                }
            }
        }

        let reason = if failures.is_empty() {
            "no notification channel available".to_string()
        } else {
            failures.join("; ")
        };
        Err(WatchError::NotifyFailure(reason))
    }
}

#[async_trait]
impl Dispatcher for Notifier {
    async fn notify_threshold(
        &self,
        count: u64,
        section_name: &str,
        threshold: u32,
    ) -> Result<(), WatchError> {
        let notification =
            Notification::threshold(count, section_name, threshold, self.board_url.as_deref());
        self.dispatch(&notification).await.map(|_| ())
    }

    async fn notify_test(&self) -> Result<(), WatchError> {
        let notification = Notification::test(self.board_url.as_deref());
        self.dispatch(&notification).await.map(|_| ())
    }
}

//! Notification dispatch contract
//!
//! The watch engine only decides *that* an alert should go out. Rendering
//! and delivery belong to a [`Dispatcher`] implementation.

use async_trait::async_trait;

use crate::error::WatchError;

pub const APP_TITLE: &str = "queuewatch";

/// A rendered alert ready for a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    /// Board link passed through from config; channels may ignore it
    pub board_url: Option<String>,
}

impl Notification {
    /// Alert for a section that reached the threshold
    pub fn threshold(count: u64, section_name: &str, threshold: u32, board_url: Option<&str>) -> Self {
        Self {
            title: format!("{} has {}+ tasks", section_name, threshold),
            message: format!("Currently {} tasks", count),
            board_url: board_url.map(str::to_string),
        }
    }

    /// Sample alert used to verify delivery end to end
    pub fn test(board_url: Option<&str>) -> Self {
        Self {
            title: format!("{} test", APP_TITLE),
            message: "This is a test notification".to_string(),
            board_url: board_url.map(str::to_string),
        }
    }
}

/// Best-effort delivery of alerts.
///
/// Both calls finish (or fail) before returning. An unavailable preferred
/// channel is not an error: implementations fall back to the next one and
/// only return [`WatchError::NotifyFailure`] when every channel failed.
/// Callers log that failure and carry on; nothing retries.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn notify_threshold(
        &self,
        count: u64,
        section_name: &str,
        threshold: u32,
    ) -> Result<(), WatchError>;

    async fn notify_test(&self) -> Result<(), WatchError>;
}

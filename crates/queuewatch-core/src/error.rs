//! Error types for the watch engine

use std::path::PathBuf;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures talking to the remote task API
#[derive(Debug, Error)]
pub enum RemoteApiError {
    /// The server answered with a non-2xx status
    #[error("remote API error: {status} - {body}")]
    Status { status: u16, body: String },

    /// Connection failure, TLS failure or timeout
    #[error("request to remote API failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The body was not the JSON shape we expect
    #[error("malformed response from remote API: {0}")]
    Decode(String),

    /// A configured or server-supplied URL could not be used
    #[error("invalid remote API URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Everything that can end a check early.
///
/// All variants are caught at the check boundary; none of them stop the
/// scheduler.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error(transparent)]
    RemoteApi(#[from] RemoteApiError),

    /// Missing or blank credential, or an unusable config value
    #[error("configuration unavailable: {0}")]
    ConfigUnavailable(String),

    /// The configured section name did not match any section of the project
    #[error("section '{0}' not found in project")]
    SectionNotFound(String),

    /// Reading or writing the config or state file failed
    #[error("failed to {action} {path:?}: {source}")]
    Persistence {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    /// Every notification channel failed
    #[error("notification failed: {0}")]
    NotifyFailure(String),
}

impl WatchError {
    pub(crate) fn persistence(
        action: &'static str,
        path: impl Into<PathBuf>,
        source: impl Into<BoxError>,
    ) -> Self {
        WatchError::Persistence {
            action,
            path: path.into(),
            source: source.into(),
        }
    }

    /// Conditions that skip a cycle rather than indicate a fault
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            WatchError::ConfigUnavailable(_) | WatchError::SectionNotFound(_)
        )
    }
}

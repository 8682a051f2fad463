//! Location of the config, state and log files

use std::path::{Path, PathBuf};

use crate::error::WatchError;

const APP_DIR_NAME: &str = "queuewatch";
const HOME_ENV: &str = "QUEUEWATCH_HOME";

/// Files owned by one watcher process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub base_dir: PathBuf,
    pub config: PathBuf,
    pub state: PathBuf,
    pub log: PathBuf,
}

impl AppPaths {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        Self {
            config: base_dir.join("config.toml"),
            state: base_dir.join("state.json"),
            log: base_dir.join("queuewatch.log"),
            base_dir,
        }
    }

    /// Pick the base directory: explicit override, then `QUEUEWATCH_HOME`,
    /// then the platform default
    pub fn resolve(base_dir: Option<&Path>) -> Result<Self, WatchError> {
        if let Some(dir) = base_dir {
            return Ok(Self::new(dir));
        }
        if let Some(dir) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::new(PathBuf::from(dir)));
        }
        default_base_dir().map(Self::new).ok_or_else(|| {
            WatchError::ConfigUnavailable("could not determine a home directory".to_string())
        })
    }

    /// Directory searched for a bundled notifier binary
    pub fn bin_dir(&self) -> PathBuf {
        self.base_dir.join("bin")
    }
}

/// `%APPDATA%\queuewatch` on Windows, `~/.queuewatch` elsewhere
pub fn default_base_dir() -> Option<PathBuf> {
    if cfg!(windows) {
        if let Some(dir) = dirs::config_dir() {
            return Some(dir.join(APP_DIR_NAME));
        }
    }
    dirs::home_dir().map(|home| home.join(format!(".{}", APP_DIR_NAME)))
}

//! Durable watch state (`state.json`)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::WatchError;

/// What the previous check observed.
///
/// Read at the start of a check and written back at its end; never held
/// across checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchState {
    /// Incomplete count seen by the last completed check
    pub last_count: u64,
    /// Whether that count was strictly below the threshold
    pub was_below_threshold: bool,
    /// `None` until the first notification attempt
    pub last_notified_at: Option<DateTime<Utc>>,
    /// Threshold in effect when the state was last written
    pub last_threshold: Option<u32>,
}

impl Default for WatchState {
    fn default() -> Self {
        // Start "below" so a first observation at/above the threshold can alert
        Self {
            last_count: 0,
            was_below_threshold: true,
            last_notified_at: None,
            last_threshold: None,
        }
    }
}

/// JSON file holding a single [`WatchState`]
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the state, creating and persisting the defaults on first access
    pub fn load(&self) -> Result<WatchState, WatchError> {
        if !self.path.exists() {
            info!("No watch state at {:?}, starting fresh", self.path);
            let state = WatchState::default();
            self.save(&state)?;
            return Ok(state);
        }

        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| WatchError::persistence("read state", &self.path, e))?;
        let state = serde_json::from_str(&content)
            .map_err(|e| WatchError::persistence("parse state", &self.path, e))?;

        debug!("Loaded watch state from {:?}", self.path);
        Ok(state)
    }

    /// Like [`StateStore::load`], substituting defaults when the file is unreadable
    pub fn load_or_default(&self) -> WatchState {
        match self.load() {
            Ok(state) => state,
            Err(e) => {
                warn!("{}. Using default watch state.", e);
                WatchState::default()
            }
        }
    }

    pub fn save(&self, state: &WatchState) -> Result<(), WatchError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| WatchError::persistence("create directory for", parent, e))?;
        }
        let json = serde_json::to_string_pretty(state)
            .map_err(|e| WatchError::persistence("serialize state", &self.path, e))?;
        std::fs::write(&self.path, json)
            .map_err(|e| WatchError::persistence("write state", &self.path, e))?;

        debug!("Saved watch state to {:?}", self.path);
        Ok(())
    }
}

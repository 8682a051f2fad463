//! Watcher configuration (`config.toml`)
//!
//! The file is re-read at the start of every check, so edits take effect on
//! the next cycle without a restart.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::WatchError;

pub const DEFAULT_API_BASE_URL: &str = "https://app.asana.com/api/1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Bearer token; `${VAR}` references are expanded from the environment
    pub access_token: String,
    pub project_id: String,
    /// Exact, case-sensitive name of the watched section
    pub section_name: String,
    /// Alert when the incomplete count is at or above this value
    pub threshold: u32,
    pub polling_minutes: u32,
    pub cooldown_minutes: u32,
    /// Handed to the notifier untouched
    pub board_url: String,
    pub api_base_url: String,
    /// Explicit notifier binary; relative paths are tried next to the executable first
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notifier_path: Option<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            project_id: String::new(),
            section_name: String::new(),
            threshold: 5,
            polling_minutes: 3,
            cooldown_minutes: 30,
            board_url: String::new(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            notifier_path: None,
        }
    }
}

impl WatchConfig {
    /// Load the config, writing the defaults first if the file does not exist
    pub fn load(path: &Path) -> Result<Self, WatchError> {
        if !path.exists() {
            info!("No config at {:?}, writing defaults", path);
            let config = Self::default();
            config.save(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| WatchError::persistence("read config", path, e))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| WatchError::persistence("parse config", path, e))?;

        debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), WatchError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| WatchError::persistence("create directory for", parent, e))?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| WatchError::persistence("serialize config", path, e))?;
        std::fs::write(path, content)
            .map_err(|e| WatchError::persistence("write config", path, e))?;

        debug!("Saved config to {:?}", path);
        Ok(())
    }

    /// The credential after env expansion, or `None` when blank
    pub fn token(&self) -> Option<String> {
        let token = expand_env_vars(&self.access_token, |name| std::env::var(name).ok());
        let token = token.trim();
        if token.is_empty() {
            None
        } else {
            Some(token.to_string())
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold.max(1)
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.polling_minutes.max(1)) * 60)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(u64::from(self.cooldown_minutes) * 60)
    }

    /// Board URL if one is configured
    pub fn board_url(&self) -> Option<&str> {
        let url = self.board_url.trim();
        (!url.is_empty()).then_some(url)
    }

    /// Problems worth telling the user about; none of them are fatal
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.token().is_none() {
            warnings.push("access_token is not set".to_string());
        }
        if self.project_id.trim().is_empty() {
            warnings.push("project_id is not set".to_string());
        }
        if self.section_name.is_empty() {
            warnings.push("section_name is not set".to_string());
        }
        if self.threshold == 0 {
            warnings.push("threshold must be at least 1, using 1".to_string());
        }
        if self.polling_minutes == 0 {
            warnings.push("polling_minutes must be at least 1, using 1".to_string());
        }
        warnings
    }

    /// Log each validation warning
    pub fn log_warnings(&self) {
        for warning in self.validate() {
            warn!("Config: {}", warning);
        }
    }
}

/// Replace `${NAME}` with `lookup(NAME)`; unknown names expand to nothing.
/// Text without a closing brace is kept as-is.
pub fn expand_env_vars(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                if let Some(value) = lookup(name) {
                    out.push_str(&value);
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

//! One watch check: config -> state -> count -> decide -> notify -> persist

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use queuewatch_scheduler::Job;

use crate::config::WatchConfig;
use crate::edge;
use crate::error::WatchError;
use crate::notify::Dispatcher;
use crate::paths::AppPaths;
use crate::remote::TaskSource;
use crate::state::StateStore;

/// Builds the per-check collaborators from the freshly loaded config
pub trait WatchBackend: Send + Sync {
    fn task_source(
        &self,
        config: &WatchConfig,
        token: &str,
    ) -> Result<Box<dyn TaskSource>, WatchError>;

    fn dispatcher(&self, config: &WatchConfig) -> Box<dyn Dispatcher>;
}

/// Summary of a check that ran to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub count: u64,
    pub threshold: u32,
    /// A notification was attempted (whether or not it was delivered)
    pub notified: bool,
    pub notify_error: Option<String>,
}

/// Runs checks against one project section
pub struct Watcher {
    paths: AppPaths,
    backend: Arc<dyn WatchBackend>,
}

impl Watcher {
    pub fn new(paths: AppPaths, backend: Arc<dyn WatchBackend>) -> Self {
        Self { paths, backend }
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    /// Perform one read-modify-write cycle.
    ///
    /// The state file is written only when the count was obtained, or when a
    /// threshold change re-armed the detector before an early exit for a
    /// missing token. Remote errors and a missing section leave it untouched.
    pub async fn check(&self) -> Result<CheckReport, WatchError> {
        let config = WatchConfig::load(&self.paths.config)?;
        let store = StateStore::new(&self.paths.state);
        let mut state = store.load_or_default();
        let threshold = config.threshold();

        let previous_threshold = state.last_threshold;
        if edge::rearm_on_threshold_change(&mut state, threshold) {
            info!(
                "Threshold changed: {:?} -> {} (alert re-armed)",
                previous_threshold, threshold
            );
        }

        let Some(token) = config.token() else {
            if previous_threshold != state.last_threshold {
                store.save(&state)?;
            }
            return Err(WatchError::ConfigUnavailable(
                "access_token is not set".to_string(),
            ));
        };

        let source = self.backend.task_source(&config, &token)?;
        let section_id = source
            .resolve_section_id(&config.project_id, &config.section_name)
            .await?
            .ok_or_else(|| WatchError::SectionNotFound(config.section_name.clone()))?;

        let count = source.count_incomplete(&section_id).await?;
        info!("Incomplete tasks in '{}': {}", config.section_name, count);

        let decision = edge::evaluate(count, threshold, config.cooldown(), &state, Utc::now());

        let mut notify_error = None;
        if decision.should_notify {
            info!(
                "'{}' reached {} (threshold {}), notifying",
                config.section_name, count, threshold
            );
            let dispatcher = self.backend.dispatcher(&config);
            if let Err(e) = dispatcher
                .notify_threshold(count, &config.section_name, threshold)
                .await
            {
                warn!("{}", e);
                notify_error = Some(e.to_string());
            }
        } else {
            debug!(
                "No alert: below={} was_below={} last_notified={:?}",
                decision.next.was_below_threshold,
                state.was_below_threshold,
                state.last_notified_at
            );
        }

        store.save(&decision.next)?;

        Ok(CheckReport {
            count,
            threshold,
            notified: decision.should_notify,
            notify_error,
        })
    }

    /// Send the test notification through the configured channels
    pub async fn notify_test(&self) -> Result<(), WatchError> {
        let config = WatchConfig::load(&self.paths.config)?;
        self.backend.dispatcher(&config).notify_test().await
    }
}

#[async_trait]
impl Job for Watcher {
    fn name(&self) -> &str {
        "queue-watch"
    }

    async fn run(&self) -> anyhow::Result<()> {
        match self.check().await {
            Ok(_) => Ok(()),
            Err(e) if e.is_skip() => {
                warn!("Skipping check: {}", e);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

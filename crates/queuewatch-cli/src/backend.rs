//! Production wiring: Asana client and the desktop/log notifier chain

use queuewatch_channels::Notifier;
use queuewatch_core::{
    AppPaths, AsanaClient, Dispatcher, TaskSource, WatchBackend, WatchConfig, WatchError,
};

pub struct LiveBackend {
    paths: AppPaths,
}

impl LiveBackend {
    pub fn new(paths: AppPaths) -> Self {
        Self { paths }
    }
}

impl WatchBackend for LiveBackend {
    fn task_source(
        &self,
        config: &WatchConfig,
        token: &str,
    ) -> Result<Box<dyn TaskSource>, WatchError> {
        Ok(Box::new(AsanaClient::new(token, &config.api_base_url)?))
    }

    fn dispatcher(&self, config: &WatchConfig) -> Box<dyn Dispatcher> {
        Box::new(Notifier::from_config(config, &self.paths))
    }
}

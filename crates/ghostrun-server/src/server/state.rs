use std::sync::Arc;

use ghostrun_core::{CommandWhitelist, Config};

use crate::executor::Executor;

/// Shared, read-only state for every request.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub whitelist: Arc<CommandWhitelist>,
    pub executor: Executor,
}

impl AppState {
    pub fn new(config: Config, executor: Executor) -> Self {
        let whitelist = CommandWhitelist::from_config(&config.commands);
        Self {
            config: Arc::new(config),
            whitelist: Arc::new(whitelist),
            executor,
        }
    }
}

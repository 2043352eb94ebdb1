use std::sync::Arc;

use bedrock_chat_config::AppConfig;

use crate::dispatch::ChatDispatcher;

/// Shared state for all request handlers.
pub struct AppState {
    pub config: AppConfig,
    pub dispatcher: ChatDispatcher,
}

impl AppState {
    pub fn new(config: AppConfig, dispatcher: ChatDispatcher) -> Self {
        Self { config, dispatcher }
    }
}

pub type SharedState = Arc<AppState>;

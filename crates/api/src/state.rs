//! Application state shared by every route

use std::sync::Arc;

use crate::config::Config;
use crate::presence_store::PresenceStore;
use crate::websocket::WebSocketState;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub ws_state: WebSocketState,
}

impl AppState {
    /// Build state from configuration
    pub fn new(config: Config) -> Self {
        let presence_store = PresenceStore::from_config(&config);
        Self {
            config: Arc::new(config),
            ws_state: WebSocketState::with_presence_store(presence_store),
        }
    }
}

//! Chatline API Library
//!
//! Real-time relay server: identity registry, presence broadcasts, chat and
//! typing relay, and WebRTC call signaling over WebSocket.

pub mod config;
pub mod error;
pub mod presence_store;
pub mod routes;
pub mod state;
pub mod websocket;

pub use config::{Config, ConfigError, LogFormat};
pub use error::{ApiError, ApiResult};
pub use presence_store::PresenceStore;
pub use routes::create_router;
pub use state::AppState;

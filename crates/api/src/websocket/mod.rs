//! WebSocket relay for chat, presence, and call signaling
//!
//! # Architecture
//!
//! - **Connection**: One accepted socket and the identity it logged in as
//! - **Registry**: Identity -> connection directory, last login wins
//! - **State**: Global WebSocket state shared across all connections
//! - **Presence**: Online/offline broadcasts driven by registry changes
//! - **Relay**: Chat messages and typing indicators
//! - **Signaling**: WebRTC offer/answer/ICE/hang-up forwarding
//! - **Handler**: Axum WebSocket route handler
//! - **Events**: Type-safe event definitions for client/server communication

pub mod connection;
pub mod events;
pub mod handler;
pub mod presence;
pub mod registry;
pub mod relay;
pub mod signaling;
pub mod state;

pub use handler::ws_handler;
pub use state::WebSocketState;

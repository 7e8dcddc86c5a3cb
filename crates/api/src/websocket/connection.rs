//! WebSocket connection management
//!
//! Represents an active WebSocket connection and the identity it logged in as.

use chatline_shared::{ConnectionId, UserIdentity};
use tokio::sync::{mpsc, RwLock};

use super::events::ServerEvent;

/// Represents an active WebSocket connection
#[derive(Debug)]
pub struct Connection {
    /// Unique session ID for this connection
    pub session_id: ConnectionId,

    /// Channel to send events to this connection
    pub sender: mpsc::UnboundedSender<ServerEvent>,

    /// Identity bound by the last `login` on this connection
    user_id: RwLock<Option<UserIdentity>>,
}

impl Connection {
    /// Create a new, not yet logged in connection
    pub fn new(sender: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self {
            session_id: ConnectionId::new(),
            sender,
            user_id: RwLock::new(None),
        }
    }

    /// Send an event to this connection
    ///
    /// Returns Ok(()) if queued successfully, Err if connection is closed
    #[allow(clippy::result_large_err)] // Error type is from tokio mpsc, containing the failed event
    pub fn send(&self, event: ServerEvent) -> Result<(), mpsc::error::SendError<ServerEvent>> {
        self.sender.send(event)
    }

    /// Identity this connection is logged in as, if any
    ///
    /// This is the only trusted source of "who is sending"; identities carried
    /// inside client payloads are never used for attribution.
    pub async fn user_id(&self) -> Option<UserIdentity> {
        self.user_id.read().await.clone()
    }

    /// Bind this connection to an identity, returning the previous one
    pub async fn set_user_id(&self, user_id: UserIdentity) -> Option<UserIdentity> {
        let mut current = self.user_id.write().await;
        let previous = current.replace(user_id);
        tracing::debug!(
            session_id = %self.session_id,
            user_id = ?current.as_ref().map(UserIdentity::as_str),
            previous = ?previous.as_ref().map(UserIdentity::as_str),
            "Connection identity bound"
        );
        previous
    }

    /// Check whether the connection has logged in
    pub async fn is_logged_in(&self) -> bool {
        self.user_id.read().await.is_some()
    }
}

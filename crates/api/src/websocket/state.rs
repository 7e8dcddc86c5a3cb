//! Global WebSocket state management
//!
//! Owns every live connection, the identity registry, and the presence store
//! handle. Constructed once at startup and cloned into each connection task.

use chatline_shared::{ConnectionId, UserIdentity};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, RwLock};

use super::connection::Connection;
use super::events::ServerEvent;
use super::registry::ConnectionRegistry;
use crate::presence_store::PresenceStore;

/// Global WebSocket state shared across all connections
#[derive(Clone)]
pub struct WebSocketState {
    /// All active connections indexed by session_id
    pub connections: Arc<RwLock<HashMap<ConnectionId, Arc<Connection>>>>,

    /// Identity -> connection directory
    pub registry: Arc<ConnectionRegistry>,

    /// External presence mirror (fire-and-forget)
    pub presence_store: PresenceStore,

    /// Serializes presence changes with their broadcasts
    presence_lock: Arc<Mutex<()>>,
}

impl WebSocketState {
    /// Create new WebSocket state with no external presence store
    pub fn new() -> Self {
        Self::with_presence_store(PresenceStore::disabled())
    }

    /// Create new WebSocket state mirroring presence to `presence_store`
    pub fn with_presence_store(presence_store: PresenceStore) -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            registry: Arc::new(ConnectionRegistry::new()),
            presence_store,
            presence_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Hold while changing the registry and announcing the change
    ///
    /// Every observer then sees presence events in the same order the
    /// registry changed, and a new connection's snapshot cannot interleave
    /// with a half-applied change.
    pub async fn lock_presence(&self) -> MutexGuard<'_, ()> {
        self.presence_lock.lock().await
    }

    /// Add a connection
    pub async fn add_connection(&self, conn: Connection) -> Arc<Connection> {
        let conn = Arc::new(conn);
        let mut connections = self.connections.write().await;
        connections.insert(conn.session_id, Arc::clone(&conn));

        tracing::info!(
            session_id = %conn.session_id,
            total_connections = connections.len(),
            "WebSocket connection added"
        );

        conn
    }

    /// Remove a connection
    ///
    /// Registry cleanup is separate (see `presence::disconnect`), since it
    /// must be guarded by ownership.
    pub async fn remove_connection(&self, session_id: &ConnectionId) -> Option<Arc<Connection>> {
        let mut connections = self.connections.write().await;
        let removed = connections.remove(session_id);
        if removed.is_some() {
            tracing::info!(
                session_id = %session_id,
                remaining_connections = connections.len(),
                "WebSocket connection removed"
            );
        }
        removed
    }

    /// Get a connection by session ID
    pub async fn get_connection(&self, session_id: &ConnectionId) -> Option<Arc<Connection>> {
        let connections = self.connections.read().await;
        connections.get(session_id).cloned()
    }

    /// Get total number of active connections
    pub async fn connection_count(&self) -> usize {
        let connections = self.connections.read().await;
        connections.len()
    }

    /// Broadcast an event to every live connection, logged in or not
    ///
    /// Silently ignores send errors (closed connections will be cleaned up).
    /// Returns the number of connections the event was queued for.
    pub async fn broadcast(&self, event: ServerEvent) -> usize {
        let connections = self.connections.read().await;
        let mut success_count = 0;
        let mut failed_count = 0;

        for conn in connections.values() {
            match conn.send(event.clone()) {
                Ok(()) => success_count += 1,
                Err(_) => {
                    failed_count += 1;
                    tracing::warn!(
                        session_id = %conn.session_id,
                        "Failed to send event to connection (likely closed)"
                    );
                }
            }
        }

        tracing::debug!(
            event_type = event.event_type(),
            recipients = success_count,
            failed = failed_count,
            "Broadcast event to all connections"
        );

        success_count
    }

    /// Deliver an event to whichever connection currently owns `user_id`
    ///
    /// Returns false when the identity is offline; the event is dropped.
    pub async fn send_to_user(&self, user_id: &UserIdentity, event: ServerEvent) -> bool {
        let Some(session_id) = self.registry.resolve(user_id).await else {
            return false;
        };

        let Some(conn) = self.get_connection(&session_id).await else {
            tracing::debug!(
                user_id = %user_id,
                session_id = %session_id,
                "Registered connection already gone"
            );
            return false;
        };

        match conn.send(event) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    session_id = %session_id,
                    user_id = %user_id,
                    event_type = e.0.event_type(),
                    "Failed to send event to connection (likely closed)"
                );
                false
            }
        }
    }

    /// Get statistics about the WebSocket state
    pub async fn get_stats(&self) -> WebSocketStats {
        WebSocketStats {
            active_connections: self.connection_count().await,
            online_users: self.registry.len().await,
        }
    }
}

impl Default for WebSocketState {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about WebSocket connections
#[derive(Debug, Clone)]
pub struct WebSocketStats {
    /// Number of active connections
    pub active_connections: usize,
    /// Number of identities currently reachable
    pub online_users: usize,
}

//! Connection registry
//!
//! Maps each logged-in user identity to the one connection that currently
//! receives its events. The last login for an identity wins; removal is
//! tied to the connection that owns the mapping so a late disconnect from a
//! superseded connection cannot evict a newer login.

use chatline_shared::{ConnectionId, UserIdentity};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Identity -> delivery connection directory
pub struct ConnectionRegistry {
    entries: RwLock<HashMap<UserIdentity, ConnectionId>>,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or overwrite the mapping for `user_id`
    ///
    /// Returns the connection that was displaced when another connection held
    /// the mapping. The displaced connection stays open but is no longer
    /// addressable by identity, and it is not told so.
    pub async fn record_login(
        &self,
        user_id: UserIdentity,
        session_id: ConnectionId,
    ) -> Option<ConnectionId> {
        let mut entries = self.entries.write().await;
        let previous = entries.insert(user_id.clone(), session_id);
        let displaced = previous.filter(|prev| *prev != session_id);

        if let Some(displaced) = displaced {
            tracing::info!(
                user_id = %user_id,
                session_id = %session_id,
                displaced_session_id = %displaced,
                "Login superseded an existing connection"
            );
        } else {
            tracing::debug!(
                user_id = %user_id,
                session_id = %session_id,
                online_users = entries.len(),
                "Login recorded"
            );
        }

        displaced
    }

    /// Look up the connection currently registered for `user_id`
    pub async fn resolve(&self, user_id: &UserIdentity) -> Option<ConnectionId> {
        let entries = self.entries.read().await;
        entries.get(user_id).copied()
    }

    /// Remove the mapping for `user_id` only if `session_id` still owns it
    ///
    /// Returns true when an entry was removed. Compare and delete happen under
    /// one write lock.
    pub async fn remove_if_owner(&self, user_id: &UserIdentity, session_id: &ConnectionId) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get(user_id) {
            Some(owner) if owner == session_id => {
                entries.remove(user_id);
                tracing::debug!(
                    user_id = %user_id,
                    session_id = %session_id,
                    online_users = entries.len(),
                    "Registry entry removed"
                );
                true
            }
            Some(owner) => {
                tracing::debug!(
                    user_id = %user_id,
                    session_id = %session_id,
                    owner_session_id = %owner,
                    "Skipping removal, identity owned by a newer connection"
                );
                false
            }
            None => false,
        }
    }

    /// Snapshot of all online identities, sorted
    pub async fn online_users(&self) -> Vec<UserIdentity> {
        let entries = self.entries.read().await;
        let mut users: Vec<UserIdentity> = entries.keys().cloned().collect();
        users.sort();
        users
    }

    /// Check whether an identity is currently reachable
    pub async fn is_online(&self, user_id: &UserIdentity) -> bool {
        let entries = self.entries.read().await;
        entries.contains_key(user_id)
    }

    /// Number of online identities
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

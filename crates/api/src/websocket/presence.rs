//! Presence tracking
//!
//! Turns registry mutations into `user_online` / `user_offline` broadcasts.
//! Online is announced on every login (no dedup). Offline is announced only
//! when a disconnect actually removed the registry entry, so closing a
//! superseded tab is silent while the identity stays reachable elsewhere.
//!
//! Each change holds the presence lock from registry update through
//! broadcast, so every connection observes the same order of events.

use chatline_shared::{ConnectionId, PresenceStatus, UserIdentity};

use super::connection::Connection;
use super::events::ServerEvent;
use super::state::WebSocketState;

/// What a login changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    /// Another connection that previously received this identity's events
    pub displaced: Option<ConnectionId>,
    /// Identity this connection was logged in as before, now released
    pub released: Option<UserIdentity>,
}

/// Bind `conn` to `user_id` and announce it
///
/// Returns None when the identity is empty; the login is ignored.
pub async fn login(
    ws_state: &WebSocketState,
    conn: &Connection,
    user_id: UserIdentity,
) -> Option<LoginOutcome> {
    if user_id.is_empty() {
        tracing::debug!(session_id = %conn.session_id, "Ignoring login with empty user id");
        return None;
    }

    let _presence = ws_state.lock_presence().await;

    let mut released = None;
    if let Some(previous) = conn.set_user_id(user_id.clone()).await {
        if previous != user_id
            && ws_state
                .registry
                .remove_if_owner(&previous, &conn.session_id)
                .await
        {
            announce(ws_state, &previous, PresenceStatus::Offline).await;
            released = Some(previous);
        }
    }

    let displaced = ws_state
        .registry
        .record_login(user_id.clone(), conn.session_id)
        .await;

    tracing::info!(
        session_id = %conn.session_id,
        user_id = %user_id,
        "User logged in"
    );
    announce(ws_state, &user_id, PresenceStatus::Online).await;

    Some(LoginOutcome {
        displaced,
        released,
    })
}

/// Tear down a closed connection
///
/// Removes it from the connection set first so the offline broadcast only
/// reaches the remaining connections. Returns the identity that went offline,
/// if any.
pub async fn disconnect(ws_state: &WebSocketState, conn: &Connection) -> Option<UserIdentity> {
    let _presence = ws_state.lock_presence().await;
    ws_state.remove_connection(&conn.session_id).await;

    let user_id = conn.user_id().await?;
    if !ws_state
        .registry
        .remove_if_owner(&user_id, &conn.session_id)
        .await
    {
        tracing::debug!(
            session_id = %conn.session_id,
            user_id = %user_id,
            "Superseded connection closed, identity stays online"
        );
        return None;
    }

    announce(ws_state, &user_id, PresenceStatus::Offline).await;
    Some(user_id)
}

/// Snapshot sent to a freshly accepted connection
///
/// Callers hold the presence lock so the snapshot and the connection's
/// registration happen between two presence changes.
pub async fn presence_batch(ws_state: &WebSocketState) -> ServerEvent {
    ServerEvent::PresenceBatch {
        users: ws_state.registry.online_users().await,
    }
}

async fn announce(ws_state: &WebSocketState, user_id: &UserIdentity, status: PresenceStatus) {
    let event = match status {
        PresenceStatus::Online => ServerEvent::UserOnline {
            user_id: user_id.clone(),
        },
        PresenceStatus::Offline => ServerEvent::UserOffline {
            user_id: user_id.clone(),
        },
    };

    let recipients = ws_state.broadcast(event).await;
    tracing::debug!(user_id = %user_id, status = %status, recipients, "Presence announced");

    ws_state.presence_store.record(user_id, status);
}

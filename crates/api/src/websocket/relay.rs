//! Message and typing relay
//!
//! Pure in-memory forwarding: resolve the recipient through the registry and
//! queue the event on its connection. An offline recipient is a normal
//! outcome, not an error; nothing is reported back to the sender.

use chatline_shared::UserIdentity;

use super::connection::Connection;
use super::events::{MessageEnvelope, ServerEvent};
use super::state::WebSocketState;

/// Result of a relay attempt, used for logging and tests only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Queued on the recipient's connection
    Delivered,
    /// Recipient not in the registry; event dropped
    RecipientOffline,
    /// Sending connection has not logged in; event dropped
    NotLoggedIn,
    /// Sent to every connection
    Broadcast { recipients: usize },
}

/// Relay a chat message
///
/// Private messages go to the recipient's connection (if online) and are
/// always echoed back to the sending connection. Messages without a
/// recipient are broadcast to every connection, sender included.
pub async fn relay_message(
    ws_state: &WebSocketState,
    conn: &Connection,
    envelope: MessageEnvelope,
) -> RelayOutcome {
    let Some(recipient_id) = envelope.private_recipient().cloned() else {
        let recipients = ws_state
            .broadcast(ServerEvent::ReceiveMessage(envelope))
            .await;
        tracing::debug!(session_id = %conn.session_id, recipients, "Broadcast message relayed");
        return RelayOutcome::Broadcast { recipients };
    };

    let outcome = forward(
        ws_state,
        &recipient_id,
        ServerEvent::ReceiveMessage(envelope.clone()),
    )
    .await;

    // Echo so the sender can render without waiting on storage
    if conn.send(ServerEvent::ReceiveMessage(envelope)).is_err() {
        tracing::warn!(session_id = %conn.session_id, "Failed to echo message to sender (likely closed)");
    }

    tracing::debug!(
        session_id = %conn.session_id,
        recipient_id = %recipient_id,
        outcome = ?outcome,
        "Private message relayed"
    );
    outcome
}

/// Tell `recipient_id` that this connection's user started typing
pub async fn relay_typing_start(
    ws_state: &WebSocketState,
    conn: &Connection,
    recipient_id: &UserIdentity,
    display_name: String,
) -> RelayOutcome {
    let Some(user_id) = conn.user_id().await else {
        return RelayOutcome::NotLoggedIn;
    };

    forward(
        ws_state,
        recipient_id,
        ServerEvent::UserTyping {
            user_id,
            display_name,
        },
    )
    .await
}

/// Tell `recipient_id` that this connection's user stopped typing
pub async fn relay_typing_stop(
    ws_state: &WebSocketState,
    conn: &Connection,
    recipient_id: &UserIdentity,
) -> RelayOutcome {
    let Some(user_id) = conn.user_id().await else {
        return RelayOutcome::NotLoggedIn;
    };

    forward(
        ws_state,
        recipient_id,
        ServerEvent::UserStoppedTyping { user_id },
    )
    .await
}

/// Queue `event` for the connection currently registered to `recipient_id`
pub(crate) async fn forward(
    ws_state: &WebSocketState,
    recipient_id: &UserIdentity,
    event: ServerEvent,
) -> RelayOutcome {
    let event_type = event.event_type();
    if ws_state.send_to_user(recipient_id, event).await {
        RelayOutcome::Delivered
    } else {
        tracing::debug!(
            recipient_id = %recipient_id,
            event_type,
            "Recipient offline, event dropped"
        );
        RelayOutcome::RecipientOffline
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::websocket::presence;
    use serde_json::{json, Map};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    type Rx = mpsc::UnboundedReceiver<ServerEvent>;

    async fn connect_as(state: &WebSocketState, user: Option<&str>) -> (Arc<Connection>, Rx) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = state.add_connection(Connection::new(tx)).await;
        if let Some(user) = user {
            presence::login(state, &conn, UserIdentity::from(user)).await;
        }
        while rx.try_recv().is_ok() {}
        (conn, rx)
    }

    fn drain_all(receivers: &mut [&mut Rx]) {
        for rx in receivers.iter_mut() {
            while rx.try_recv().is_ok() {}
        }
    }

    fn envelope(sender: &str, recipient: Option<&str>, text: &str) -> MessageEnvelope {
        let mut extra = Map::new();
        extra.insert("timestamp".to_string(), json!("12:00"));
        MessageEnvelope {
            sender_id: UserIdentity::from(sender),
            text: text.to_string(),
            recipient_id: recipient.map(UserIdentity::from),
            image: None,
            extra,
        }
    }

    #[tokio::test]
    async fn test_private_message_delivered_and_echoed() {
        let state = WebSocketState::new();
        let (a, mut rx_a) = connect_as(&state, Some("u1")).await;
        let (_b, mut rx_b) = connect_as(&state, Some("u2")).await;
        let (_c, mut rx_c) = connect_as(&state, Some("u3")).await;
        drain_all(&mut [&mut rx_a, &mut rx_b, &mut rx_c]);

        let msg = envelope("u1", Some("u2"), "hi");
        let outcome = relay_message(&state, &a, msg.clone()).await;

        assert_eq!(outcome, RelayOutcome::Delivered);
        assert_eq!(rx_b.try_recv().unwrap(), ServerEvent::ReceiveMessage(msg.clone()));
        assert_eq!(rx_a.try_recv().unwrap(), ServerEvent::ReceiveMessage(msg));
        assert!(rx_c.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_private_message_to_offline_user_still_echoes() {
        let state = WebSocketState::new();
        let (a, mut rx_a) = connect_as(&state, Some("u1")).await;
        let (_b, mut rx_b) = connect_as(&state, None).await;
        drain_all(&mut [&mut rx_a, &mut rx_b]);

        let msg = envelope("u1", Some("u2"), "hi");
        let outcome = relay_message(&state, &a, msg.clone()).await;

        assert_eq!(outcome, RelayOutcome::RecipientOffline);
        assert_eq!(rx_a.try_recv().unwrap(), ServerEvent::ReceiveMessage(msg));
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_message_without_recipient_is_broadcast() {
        let state = WebSocketState::new();
        let (a, mut rx_a) = connect_as(&state, Some("u1")).await;
        let (_b, mut rx_b) = connect_as(&state, Some("u2")).await;
        let (_anon, mut rx_anon) = connect_as(&state, None).await;
        drain_all(&mut [&mut rx_a, &mut rx_b, &mut rx_anon]);

        let msg = envelope("u1", None, "hello all");
        let outcome = relay_message(&state, &a, msg.clone()).await;

        assert_eq!(outcome, RelayOutcome::Broadcast { recipients: 3 });
        for rx in [&mut rx_a, &mut rx_b, &mut rx_anon] {
            assert_eq!(rx.try_recv().unwrap(), ServerEvent::ReceiveMessage(msg.clone()));
            assert!(rx.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn test_message_goes_to_latest_login_only() {
        let state = WebSocketState::new();
        let (a, mut rx_a) = connect_as(&state, Some("u1")).await;
        let (_old_tab, mut rx_old) = connect_as(&state, Some("u2")).await;
        let (_new_tab, mut rx_new) = connect_as(&state, Some("u2")).await;
        drain_all(&mut [&mut rx_a, &mut rx_old, &mut rx_new]);

        let msg = envelope("u1", Some("u2"), "which tab?");
        relay_message(&state, &a, msg.clone()).await;

        assert_eq!(rx_new.try_recv().unwrap(), ServerEvent::ReceiveMessage(msg));
        assert!(rx_old.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_typing_uses_connection_identity() {
        let state = WebSocketState::new();
        let (a, mut rx_a) = connect_as(&state, Some("u1")).await;
        let (_b, mut rx_b) = connect_as(&state, Some("u2")).await;
        drain_all(&mut [&mut rx_a, &mut rx_b]);

        let outcome =
            relay_typing_start(&state, &a, &UserIdentity::from("u2"), "Alice".to_string()).await;
        assert_eq!(outcome, RelayOutcome::Delivered);
        assert_eq!(
            rx_b.try_recv().unwrap(),
            ServerEvent::UserTyping {
                user_id: UserIdentity::from("u1"),
                display_name: "Alice".to_string(),
            }
        );

        let outcome = relay_typing_stop(&state, &a, &UserIdentity::from("u2")).await;
        assert_eq!(outcome, RelayOutcome::Delivered);
        assert_eq!(
            rx_b.try_recv().unwrap(),
            ServerEvent::UserStoppedTyping {
                user_id: UserIdentity::from("u1"),
            }
        );
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_typing_to_offline_user_is_dropped() {
        let state = WebSocketState::new();
        let (a, mut rx_a) = connect_as(&state, Some("u1")).await;
        let (_b, mut rx_b) = connect_as(&state, Some("u2")).await;
        drain_all(&mut [&mut rx_a, &mut rx_b]);

        let outcome =
            relay_typing_start(&state, &a, &UserIdentity::from("ghost"), "Alice".to_string()).await;

        assert_eq!(outcome, RelayOutcome::RecipientOffline);
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_typing_requires_login() {
        let state = WebSocketState::new();
        let (anon, _rx_anon) = connect_as(&state, None).await;
        let (_b, mut rx_b) = connect_as(&state, Some("u2")).await;
        drain_all(&mut [&mut rx_b]);

        let outcome = relay_typing_stop(&state, &anon, &UserIdentity::from("u2")).await;
        assert_eq!(outcome, RelayOutcome::NotLoggedIn);
        assert!(rx_b.try_recv().is_err());
    }
}

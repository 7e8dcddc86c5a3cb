//! WebRTC call signaling relay
//!
//! Routes offer/answer/ICE/hang-up payloads between two users by identity.
//! The server keeps no call state: every signal is resolved against the
//! registry at the moment it arrives, and SDP/ICE payloads are passed through
//! untouched.
//!
//! Not handled:
//! - calling an offline user produces nothing; the caller's client must time out
//! - a connection dropping mid-call does not synthesize `callEnded` for the peer

use chatline_shared::UserIdentity;
use serde_json::Value;

use super::connection::Connection;
use super::events::ServerEvent;
use super::relay::{forward, RelayOutcome};
use super::state::WebSocketState;

/// Ring `callee_id` with the caller's offer
///
/// `from` is always the sending connection's identity.
pub async fn call_user(
    ws_state: &WebSocketState,
    conn: &Connection,
    callee_id: &UserIdentity,
    offer: Value,
    caller_name: String,
    is_video: bool,
) -> RelayOutcome {
    let Some(caller_id) = conn.user_id().await else {
        tracing::debug!(session_id = %conn.session_id, "callUser from anonymous connection dropped");
        return RelayOutcome::NotLoggedIn;
    };

    let outcome = forward(
        ws_state,
        callee_id,
        ServerEvent::IncomingCall {
            signal: offer,
            from: caller_id.clone(),
            name: caller_name,
            is_video,
        },
    )
    .await;

    tracing::info!(
        caller_id = %caller_id,
        callee_id = %callee_id,
        is_video,
        outcome = ?outcome,
        "Call offer relayed"
    );
    outcome
}

/// Send the callee's answer back to `caller_id`
pub async fn answer_call(
    ws_state: &WebSocketState,
    conn: &Connection,
    caller_id: &UserIdentity,
    answer: Value,
) -> RelayOutcome {
    let Some(callee_id) = conn.user_id().await else {
        return RelayOutcome::NotLoggedIn;
    };

    let outcome = forward(ws_state, caller_id, ServerEvent::CallAccepted { signal: answer }).await;

    tracing::info!(
        caller_id = %caller_id,
        callee_id = %callee_id,
        outcome = ?outcome,
        "Call answer relayed"
    );
    outcome
}

/// Pass one ICE candidate to the peer
pub async fn ice_candidate(
    ws_state: &WebSocketState,
    conn: &Connection,
    target_id: &UserIdentity,
    candidate: Value,
) -> RelayOutcome {
    if !conn.is_logged_in().await {
        return RelayOutcome::NotLoggedIn;
    }

    forward(ws_state, target_id, ServerEvent::IceCandidate { candidate }).await
}

/// Tell the peer the call is over
pub async fn end_call(
    ws_state: &WebSocketState,
    conn: &Connection,
    target_id: &UserIdentity,
) -> RelayOutcome {
    let Some(user_id) = conn.user_id().await else {
        return RelayOutcome::NotLoggedIn;
    };

    let outcome = forward(ws_state, target_id, ServerEvent::CallEnded).await;

    tracing::info!(
        user_id = %user_id,
        target_id = %target_id,
        outcome = ?outcome,
        "Call end relayed"
    );
    outcome
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::websocket::presence;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    type Rx = mpsc::UnboundedReceiver<ServerEvent>;

    async fn connect(state: &WebSocketState) -> (Arc<Connection>, Rx) {
        let (tx, rx) = mpsc::unbounded_channel();
        (state.add_connection(Connection::new(tx)).await, rx)
    }

    fn drain(rx: &mut Rx) {
        while rx.try_recv().is_ok() {}
    }

    /// Two logged-in parties, u1 (caller) and u2 (callee), with empty queues
    async fn two_parties(state: &WebSocketState) -> ((Arc<Connection>, Rx), (Arc<Connection>, Rx)) {
        let (a, mut rx_a) = connect(state).await;
        let (b, mut rx_b) = connect(state).await;
        presence::login(state, &a, UserIdentity::from("u1")).await;
        presence::login(state, &b, UserIdentity::from("u2")).await;
        drain(&mut rx_a);
        drain(&mut rx_b);
        ((a, rx_a), (b, rx_b))
    }

    #[tokio::test]
    async fn test_call_round_trip() {
        let state = WebSocketState::new();
        let ((a, mut rx_a), (b, mut rx_b)) = two_parties(&state).await;

        let offer = json!({"type": "offer", "sdp": "v=0 offer"});
        let outcome = call_user(
            &state,
            &a,
            &UserIdentity::from("u2"),
            offer.clone(),
            "Alice".to_string(),
            true,
        )
        .await;
        assert_eq!(outcome, RelayOutcome::Delivered);
        assert_eq!(
            rx_b.try_recv().unwrap(),
            ServerEvent::IncomingCall {
                signal: offer,
                from: UserIdentity::from("u1"),
                name: "Alice".to_string(),
                is_video: true,
            }
        );
        assert!(rx_a.try_recv().is_err());

        let answer = json!({"type": "answer", "sdp": "v=0 answer"});
        let outcome = answer_call(&state, &b, &UserIdentity::from("u1"), answer.clone()).await;
        assert_eq!(outcome, RelayOutcome::Delivered);
        assert_eq!(
            rx_a.try_recv().unwrap(),
            ServerEvent::CallAccepted { signal: answer }
        );
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_call_to_offline_user_is_silent() {
        let state = WebSocketState::new();
        let ((a, mut rx_a), (_b, mut rx_b)) = two_parties(&state).await;

        let outcome = call_user(
            &state,
            &a,
            &UserIdentity::from("nobody"),
            json!({"type": "offer"}),
            "Alice".to_string(),
            false,
        )
        .await;

        assert_eq!(outcome, RelayOutcome::RecipientOffline);
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_ice_candidates_flow_both_ways() {
        let state = WebSocketState::new();
        let ((a, mut rx_a), (b, mut rx_b)) = two_parties(&state).await;

        for i in 0..3 {
            let candidate = json!({"candidate": format!("candidate:{}", i), "sdpMLineIndex": 0});
            ice_candidate(&state, &a, &UserIdentity::from("u2"), candidate.clone()).await;
            assert_eq!(
                rx_b.try_recv().unwrap(),
                ServerEvent::IceCandidate { candidate }
            );
        }

        let candidate = json!({"candidate": "candidate:back"});
        ice_candidate(&state, &b, &UserIdentity::from("u1"), candidate.clone()).await;
        assert_eq!(
            rx_a.try_recv().unwrap(),
            ServerEvent::IceCandidate { candidate }
        );
    }

    #[tokio::test]
    async fn test_either_party_can_end_call() {
        let state = WebSocketState::new();
        let ((a, mut rx_a), (b, mut rx_b)) = two_parties(&state).await;

        assert_eq!(
            end_call(&state, &b, &UserIdentity::from("u1")).await,
            RelayOutcome::Delivered
        );
        assert_eq!(rx_a.try_recv().unwrap(), ServerEvent::CallEnded);

        assert_eq!(
            end_call(&state, &a, &UserIdentity::from("u2")).await,
            RelayOutcome::Delivered
        );
        assert_eq!(rx_b.try_recv().unwrap(), ServerEvent::CallEnded);
    }

    #[tokio::test]
    async fn test_signaling_requires_login() {
        let state = WebSocketState::new();
        let ((_a, mut rx_a), _) = two_parties(&state).await;
        let (anon, _rx_anon) = connect(&state).await;
        let u1 = UserIdentity::from("u1");

        assert_eq!(
            call_user(&state, &anon, &u1, json!({}), "Mallory".to_string(), true).await,
            RelayOutcome::NotLoggedIn
        );
        assert_eq!(
            answer_call(&state, &anon, &u1, json!({})).await,
            RelayOutcome::NotLoggedIn
        );
        assert_eq!(
            ice_candidate(&state, &anon, &u1, json!({})).await,
            RelayOutcome::NotLoggedIn
        );
        assert_eq!(end_call(&state, &anon, &u1).await, RelayOutcome::NotLoggedIn);
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_disconnect_mid_call_sends_nothing_to_peer() {
        let state = WebSocketState::new();
        let ((a, _rx_a), (b, mut rx_b)) = two_parties(&state).await;

        call_user(
            &state,
            &a,
            &UserIdentity::from("u2"),
            json!({"type": "offer"}),
            "Alice".to_string(),
            true,
        )
        .await;
        answer_call(&state, &b, &UserIdentity::from("u1"), json!({"type": "answer"})).await;
        drain(&mut rx_b);

        presence::disconnect(&state, &a).await;

        // Only the presence change; no synthesized callEnded
        assert_eq!(
            rx_b.try_recv().unwrap(),
            ServerEvent::UserOffline {
                user_id: UserIdentity::from("u1")
            }
        );
        assert!(rx_b.try_recv().is_err());
    }
}

//! WebSocket handler for Axum
//!
//! Accepts connections, decodes client frames, and routes each event to the
//! presence, relay, or signaling layer.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{stream::StreamExt, SinkExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::state::AppState;

use super::{
    connection::Connection,
    events::{ClientEvent, ServerEvent},
    presence, relay, signaling,
    state::WebSocketState,
};

/// WebSocket handler - upgrades HTTP connection to WebSocket
///
/// No authentication: identity is whatever the client later claims via `login`.
pub async fn ws_handler(ws: WebSocketUpgrade, State(app_state): State<AppState>) -> Response {
    let ws_state = app_state.ws_state.clone();
    ws.max_message_size(app_state.config.ws_max_message_bytes)
        .on_upgrade(move |socket| handle_socket(socket, ws_state))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, ws_state: WebSocketState) {
    let (mut sender, mut receiver) = socket.split();

    // Create channel for sending events to this connection
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    let conn = open_connection(&ws_state, tx).await;
    let session_id = conn.session_id;

    // Spawn task to send messages to client
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break; // Connection closed
                    }
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Failed to serialize WebSocket event");
                }
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => handle_text_frame(&text, &conn, &ws_state).await,
            Ok(Message::Close(_)) => {
                tracing::info!(session_id = %session_id, "WebSocket close frame received");
                break;
            }
            // Axum answers pings itself; binary frames are not part of the protocol
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(session_id = %session_id, error = ?e, "WebSocket read error");
                break;
            }
        }
    }

    tracing::info!(session_id = %session_id, "WebSocket connection closing");
    presence::disconnect(&ws_state, &conn).await;

    send_task.abort();
}

/// Queue a new connection's greeting and register it
///
/// The client receives `connected` followed by a snapshot of who is online,
/// and only then any broadcast. The connection joins the broadcast set while
/// the presence lock is held, so the snapshot is never stale.
pub async fn open_connection(
    ws_state: &WebSocketState,
    sender: mpsc::UnboundedSender<ServerEvent>,
) -> Arc<Connection> {
    let conn = Connection::new(sender);
    let _ = conn.send(ServerEvent::Connected {
        session_id: conn.session_id,
    });

    let _presence = ws_state.lock_presence().await;
    let _ = conn.send(presence::presence_batch(ws_state).await);
    ws_state.add_connection(conn).await
}

/// Decode one text frame and dispatch it
///
/// Frames that are not a known event are logged and dropped; the client gets
/// no error reply.
pub async fn handle_text_frame(text: &str, conn: &Arc<Connection>, ws_state: &WebSocketState) {
    match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => handle_client_event(event, conn, ws_state).await,
        Err(e) => {
            tracing::warn!(
                session_id = %conn.session_id,
                error = %e,
                frame_len = text.len(),
                "Failed to parse client event"
            );
        }
    }
}

/// Handle client event
pub async fn handle_client_event(
    event: ClientEvent,
    conn: &Arc<Connection>,
    ws_state: &WebSocketState,
) {
    tracing::trace!(
        session_id = %conn.session_id,
        event_type = event.event_type(),
        "Client event received"
    );

    match event {
        ClientEvent::Login { user_id } => {
            presence::login(ws_state, conn, user_id).await;
        }

        ClientEvent::Message(envelope) => {
            relay::relay_message(ws_state, conn, envelope).await;
        }

        ClientEvent::TypingStart {
            recipient_id,
            display_name,
        } => {
            relay::relay_typing_start(ws_state, conn, &recipient_id, display_name).await;
        }

        ClientEvent::TypingStop { recipient_id } => {
            relay::relay_typing_stop(ws_state, conn, &recipient_id).await;
        }

        ClientEvent::CallUser {
            user_to_call,
            signal_data,
            name,
            is_video,
        } => {
            signaling::call_user(ws_state, conn, &user_to_call, signal_data, name, is_video).await;
        }

        ClientEvent::AnswerCall { to, signal } => {
            signaling::answer_call(ws_state, conn, &to, signal).await;
        }

        ClientEvent::IceCandidate { to, candidate } => {
            signaling::ice_candidate(ws_state, conn, &to, candidate).await;
        }

        ClientEvent::EndCall { to } => {
            signaling::end_call(ws_state, conn, &to).await;
        }

        ClientEvent::Ping => {
            let _ = conn.send(ServerEvent::Pong);
        }
    }
}

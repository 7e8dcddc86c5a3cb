//! WebSocket event types and serialization
//!
//! Defines all client-to-server and server-to-client event types
//! with type-safe serde serialization. Every frame is a JSON object whose
//! `type` field names the event; field names follow the web client.

use chatline_shared::{ConnectionId, UserIdentity};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// Client-to-Server Events
// =============================================================================

/// Events sent from client to server
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Bind this connection to a user identity
    #[serde(rename = "login", rename_all = "camelCase")]
    Login { user_id: UserIdentity },

    /// Chat message, private when `recipientId` is set, broadcast otherwise
    #[serde(rename = "message")]
    Message(MessageEnvelope),

    /// Sender started typing to a recipient
    #[serde(rename = "typing_start", rename_all = "camelCase")]
    TypingStart {
        recipient_id: UserIdentity,
        #[serde(default)]
        display_name: String,
    },

    /// Sender stopped typing to a recipient
    #[serde(rename = "typing_stop", rename_all = "camelCase")]
    TypingStop { recipient_id: UserIdentity },

    /// Start a call: carries the caller's SDP offer
    #[serde(rename = "callUser", rename_all = "camelCase")]
    CallUser {
        user_to_call: UserIdentity,
        signal_data: Value,
        #[serde(default)]
        name: String,
        #[serde(default)]
        is_video: bool,
    },

    /// Accept a call: carries the callee's SDP answer back to the caller
    #[serde(rename = "answerCall")]
    AnswerCall { to: UserIdentity, signal: Value },

    /// Trickle ICE candidate for the peer
    #[serde(rename = "iceCandidate")]
    IceCandidate { to: UserIdentity, candidate: Value },

    /// Hang up; either party may send this
    #[serde(rename = "endCall")]
    EndCall { to: UserIdentity },

    /// Heartbeat ping to keep connection alive
    #[serde(rename = "ping")]
    Ping,
}

impl ClientEvent {
    /// Wire name of the event, for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            ClientEvent::Login { .. } => "login",
            ClientEvent::Message(_) => "message",
            ClientEvent::TypingStart { .. } => "typing_start",
            ClientEvent::TypingStop { .. } => "typing_stop",
            ClientEvent::CallUser { .. } => "callUser",
            ClientEvent::AnswerCall { .. } => "answerCall",
            ClientEvent::IceCandidate { .. } => "iceCandidate",
            ClientEvent::EndCall { .. } => "endCall",
            ClientEvent::Ping => "ping",
        }
    }
}

// =============================================================================
// Server-to-Client Events
// =============================================================================

/// Events sent from server to client
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Connection acknowledged
    #[serde(rename = "connected", rename_all = "camelCase")]
    Connected { session_id: ConnectionId },

    /// Identities online at the time this connection was accepted
    #[serde(rename = "presence_batch")]
    PresenceBatch { users: Vec<UserIdentity> },

    /// A user identity became reachable
    #[serde(rename = "user_online", rename_all = "camelCase")]
    UserOnline { user_id: UserIdentity },

    /// A user identity is no longer reachable
    #[serde(rename = "user_offline", rename_all = "camelCase")]
    UserOffline { user_id: UserIdentity },

    /// Relayed chat message, exactly as the sender submitted it
    #[serde(rename = "receive_message")]
    ReceiveMessage(MessageEnvelope),

    /// Someone is typing to this user
    #[serde(rename = "user_typing", rename_all = "camelCase")]
    UserTyping {
        user_id: UserIdentity,
        display_name: String,
    },

    /// Someone stopped typing to this user
    #[serde(rename = "user_stopped_typing", rename_all = "camelCase")]
    UserStoppedTyping { user_id: UserIdentity },

    /// Incoming call with the caller's offer
    #[serde(rename = "callUser", rename_all = "camelCase")]
    IncomingCall {
        signal: Value,
        from: UserIdentity,
        name: String,
        is_video: bool,
    },

    /// The callee answered
    #[serde(rename = "callAccepted")]
    CallAccepted { signal: Value },

    /// ICE candidate from the peer
    #[serde(rename = "iceCandidate")]
    IceCandidate { candidate: Value },

    /// The peer hung up
    #[serde(rename = "callEnded")]
    CallEnded,

    /// Heartbeat response
    #[serde(rename = "pong")]
    Pong,
}

impl ServerEvent {
    /// Wire name of the event, for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            ServerEvent::Connected { .. } => "connected",
            ServerEvent::PresenceBatch { .. } => "presence_batch",
            ServerEvent::UserOnline { .. } => "user_online",
            ServerEvent::UserOffline { .. } => "user_offline",
            ServerEvent::ReceiveMessage(_) => "receive_message",
            ServerEvent::UserTyping { .. } => "user_typing",
            ServerEvent::UserStoppedTyping { .. } => "user_stopped_typing",
            ServerEvent::IncomingCall { .. } => "callUser",
            ServerEvent::CallAccepted { .. } => "callAccepted",
            ServerEvent::IceCandidate { .. } => "iceCandidate",
            ServerEvent::CallEnded => "callEnded",
            ServerEvent::Pong => "pong",
        }
    }
}

// =============================================================================
// Event Data Structures
// =============================================================================

/// Chat message envelope
///
/// Forwarded verbatim: keys the server does not know about (timestamps,
/// reply metadata, client message ids) are kept in `extra` and written back
/// out unchanged.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageEnvelope {
    pub sender_id: UserIdentity,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<UserIdentity>,
    /// Media reference (URL or data URI)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MessageEnvelope {
    /// Recipient for a private message; an empty id means broadcast
    pub fn private_recipient(&self) -> Option<&UserIdentity> {
        self.recipient_id.as_ref().filter(|id| !id.is_empty())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_login_deserialization() {
        let json = r#"{"type":"login","userId":"uid-1"}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        match event {
            ClientEvent::Login { user_id } => assert_eq!(user_id.as_str(), "uid-1"),
            _ => panic!("Expected Login event"),
        }
    }

    #[test]
    fn test_message_keeps_unknown_fields() {
        let json = r#"{
            "type": "message",
            "senderId": "u1",
            "recipientId": "u2",
            "text": "hi",
            "timestamp": "10:42",
            "replyTo": {"id": "m1"}
        }"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        let envelope = match event {
            ClientEvent::Message(envelope) => envelope,
            _ => panic!("Expected Message event"),
        };
        assert_eq!(envelope.sender_id.as_str(), "u1");
        assert_eq!(envelope.private_recipient().map(|r| r.as_str()), Some("u2"));
        assert_eq!(envelope.extra.get("timestamp"), Some(&json!("10:42")));
        assert!(!envelope.extra.contains_key("type"));

        let out = serde_json::to_value(ServerEvent::ReceiveMessage(envelope)).unwrap();
        assert_eq!(
            out,
            json!({
                "type": "receive_message",
                "senderId": "u1",
                "recipientId": "u2",
                "text": "hi",
                "timestamp": "10:42",
                "replyTo": {"id": "m1"}
            })
        );
    }

    #[test]
    fn test_empty_recipient_means_broadcast() {
        let json = r#"{"type":"message","senderId":"u1","recipientId":"","text":"all"}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        match event {
            ClientEvent::Message(envelope) => assert!(envelope.private_recipient().is_none()),
            _ => panic!("Expected Message event"),
        }
    }

    #[test]
    fn test_call_user_deserialization() {
        let json = r#"{
            "type": "callUser",
            "userToCall": "u2",
            "signalData": {"type": "offer", "sdp": "v=0"},
            "name": "Alice",
            "isVideo": true,
            "from": "spoofed"
        }"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        match event {
            ClientEvent::CallUser {
                user_to_call,
                signal_data,
                name,
                is_video,
            } => {
                assert_eq!(user_to_call.as_str(), "u2");
                assert_eq!(signal_data["sdp"], "v=0");
                assert_eq!(name, "Alice");
                assert!(is_video);
            }
            _ => panic!("Expected CallUser event"),
        }
    }

    #[test]
    fn test_unknown_event_rejected() {
        assert!(serde_json::from_str::<ClientEvent>(r#"{"type":"shutdown"}"#).is_err());
        assert!(serde_json::from_str::<ClientEvent>(r#"{"type":"typing_stop"}"#).is_err());
    }

    #[test]
    fn test_server_event_serialization() {
        let event = ServerEvent::Pong;
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"pong"}"#);

        let event = ServerEvent::CallEnded;
        assert_eq!(serde_json::to_string(&event).unwrap(), r#"{"type":"callEnded"}"#);
    }

    #[test]
    fn test_incoming_call_serialization() {
        let event = ServerEvent::IncomingCall {
            signal: json!({"type": "offer"}),
            from: UserIdentity::from("u1"),
            name: "Alice".to_string(),
            is_video: false,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "callUser",
                "signal": {"type": "offer"},
                "from": "u1",
                "name": "Alice",
                "isVideo": false
            })
        );
        assert_eq!(event.event_type(), "callUser");
    }

    #[test]
    fn test_presence_serialization() {
        let event = ServerEvent::UserOffline {
            user_id: UserIdentity::from("u9"),
        };
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"type":"user_offline","userId":"u9"}"#
        );
    }
}

//! Inbound and outbound message envelopes
//!
//! Inbound parsing distinguishes two failure shapes deliberately: a frame
//! that is not valid JSON (or has no string `type`) is a protocol violation,
//! while a well-formed envelope with an unrecognized `type` is merely
//! unknown and left to the caller's ignore policy.

use super::payloads::{DeliveredPayload, TypingPayload, UserStatusPayload};
use relay_core::{MessageRecord, RoomId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Errors raised while decoding an inbound frame
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] serde_json::Error),

    #[error("frame has no message type")]
    MissingType,

    #[error("binary frames are not supported")]
    UnsupportedFrame,
}

/// A client-sendable message
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Handshake credential; only meaningful while awaiting auth
    Auth { token: String },
    /// Typing indicator, relayed to the room and never persisted
    Typing {
        chat_room_id: RoomId,
        #[serde(default)]
        is_typing: bool,
    },
    /// Liveness probe; answered with `heartbeat_ack`
    Heartbeat,
}

/// Decoded inbound frame: a known message or an unrecognized kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Known(ClientMessage),
    /// Well-formed envelope with a `type` this server does not handle
    Unknown(String),
}

impl Inbound {
    /// Decode one inbound text frame
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text)?;

        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingType)?;

        match kind {
            "auth" | "typing" | "heartbeat" => {
                let message = serde_json::from_value(value)?;
                Ok(Self::Known(message))
            }
            other => Ok(Self::Unknown(other.to_string())),
        }
    }
}

/// A server-sendable message
///
/// Serializes to the wire envelope directly: `{type, data}` for events,
/// top-level `message` for handshake replies, bare `{type}` for
/// `heartbeat_ack`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    AuthSuccess { message: String },
    AuthError { message: String },
    NewMessage { data: MessageRecord },
    Typing { data: TypingPayload },
    UserStatus { data: UserStatusPayload },
    MessageDelivered { data: DeliveredPayload },
    HeartbeatAck,
}

impl ServerMessage {
    /// Successful handshake reply
    #[must_use]
    pub fn auth_success() -> Self {
        Self::AuthSuccess {
            message: "Connected successfully".to_string(),
        }
    }

    /// Failed handshake reply
    #[must_use]
    pub fn auth_error(message: impl Into<String>) -> Self {
        Self::AuthError {
            message: message.into(),
        }
    }

    /// `new_message` event carrying the full stored representation
    #[must_use]
    pub fn new_message(record: MessageRecord) -> Self {
        Self::NewMessage { data: record }
    }

    /// `typing` indicator event
    #[must_use]
    pub fn typing(payload: TypingPayload) -> Self {
        Self::Typing { data: payload }
    }

    /// `user_status` presence event
    #[must_use]
    pub fn user_status(payload: UserStatusPayload) -> Self {
        Self::UserStatus { data: payload }
    }

    /// `message_delivered` ack for the original sender
    #[must_use]
    pub fn message_delivered(payload: DeliveredPayload) -> Self {
        Self::MessageDelivered { data: payload }
    }

    /// Reply to a liveness probe
    #[must_use]
    pub fn heartbeat_ack() -> Self {
        Self::HeartbeatAck
    }

    /// Serialize to a JSON text frame
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PresenceStatus;
    use relay_core::UserId;

    #[test]
    fn test_parse_auth() {
        let inbound = Inbound::parse(r#"{"type":"auth","token":"abc"}"#).unwrap();
        assert_eq!(
            inbound,
            Inbound::Known(ClientMessage::Auth {
                token: "abc".to_string()
            })
        );
    }

    #[test]
    fn test_parse_typing_defaults_is_typing() {
        let inbound = Inbound::parse(r#"{"type":"typing","chat_room_id":7}"#).unwrap();
        assert_eq!(
            inbound,
            Inbound::Known(ClientMessage::Typing {
                chat_room_id: RoomId::new(7),
                is_typing: false,
            })
        );
    }

    #[test]
    fn test_parse_heartbeat() {
        let inbound = Inbound::parse(r#"{"type":"heartbeat"}"#).unwrap();
        assert_eq!(inbound, Inbound::Known(ClientMessage::Heartbeat));
    }

    #[test]
    fn test_unknown_kind_is_not_an_error() {
        let inbound = Inbound::parse(r#"{"type":"presence_query","room":1}"#).unwrap();
        assert_eq!(inbound, Inbound::Unknown("presence_query".to_string()));
    }

    #[test]
    fn test_malformed_frames_are_violations() {
        assert!(matches!(
            Inbound::parse("not json"),
            Err(ProtocolError::MalformedFrame(_))
        ));
        assert!(matches!(
            Inbound::parse(r#"{"token":"abc"}"#),
            Err(ProtocolError::MissingType)
        ));
        assert!(matches!(
            Inbound::parse(r#"{"type":42}"#),
            Err(ProtocolError::MissingType)
        ));
        // Known kind with missing fields is malformed, not unknown
        assert!(matches!(
            Inbound::parse(r#"{"type":"auth"}"#),
            Err(ProtocolError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_auth_replies_use_top_level_message() {
        let json = ServerMessage::auth_success().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "auth_success");
        assert_eq!(value["message"], "Connected successfully");
        assert!(value.get("data").is_none());
    }

    #[test]
    fn test_heartbeat_ack_has_no_data() {
        let json = ServerMessage::heartbeat_ack().to_json().unwrap();
        assert_eq!(json, r#"{"type":"heartbeat_ack"}"#);
    }

    #[test]
    fn test_event_envelope_shape() {
        let msg = ServerMessage::user_status(UserStatusPayload {
            user_id: UserId::new(3),
            status: PresenceStatus::Offline,
            display_name: Some("Alice".to_string()),
            last_seen: None,
        });

        let value: serde_json::Value =
            serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "user_status");
        assert_eq!(value["data"]["user_id"], 3);
        assert_eq!(value["data"]["status"], "offline");
    }
}

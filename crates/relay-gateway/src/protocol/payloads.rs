//! Typed payloads for outbound events

use chrono::{DateTime, Utc};
use relay_core::{MessageId, RoomId, UserId};
use serde::{Deserialize, Serialize};

/// Presence state carried by `user_status` events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

impl PresenceStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

/// `typing` event data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingPayload {
    pub user_id: UserId,
    pub chat_room_id: RoomId,
    pub is_typing: bool,
}

/// `user_status` event data
///
/// Display fields are best-effort: a profile lookup failure degrades them to
/// null rather than suppressing the presence change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStatusPayload {
    pub user_id: UserId,
    pub status: PresenceStatus,
    pub display_name: Option<String>,
    pub last_seen: Option<DateTime<Utc>>,
}

/// `message_delivered` event data, sent to the original sender
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveredPayload {
    pub message_id: MessageId,
    pub chat_room_id: RoomId,
    pub timestamp: DateTime<Utc>,
}

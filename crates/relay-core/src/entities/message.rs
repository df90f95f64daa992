//! Persisted-message representation
//!
//! The shape the request layer hands to the gateway once a message has been
//! durably stored. It travels as the `data` of a `new_message` event, so the
//! serialized form is part of the wire contract.

use crate::value_objects::{MessageId, RoomId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A durably stored chat message, as broadcast to live recipients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: MessageId,
    pub chat_room_id: RoomId,
    pub sender_id: UserId,
    pub content: String,
    pub message_type: String,
    pub created_at: DateTime<Utc>,
    pub sender: MessageSender,
}

/// Display info about the sender, embedded in `new_message` payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSender {
    pub id: UserId,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
}

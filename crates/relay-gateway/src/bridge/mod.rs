//! Notification bridge
//!
//! Entry point for the request layer: once a message has been durably
//! stored, `message_created` hands it to the real-time side. Two independent
//! delivery paths run from the same durable participant set: live fan-out to
//! connected recipients and push notifications for everyone else's devices.
//! A failure on one path never suppresses the other.

use crate::broadcast::Dispatcher;
use crate::connection::ConnectionRegistry;
use crate::protocol::{DeliveredPayload, ServerMessage};
use relay_core::{MembershipRepository, MessageRecord, PushNotifier, UserId};
use serde_json::json;
use std::sync::Arc;

/// Longest push body before truncation
const PUSH_BODY_LIMIT: usize = 100;

/// Bridges durable message creation into live fan-out and push delivery
pub struct NotificationBridge {
    registry: Arc<ConnectionRegistry>,
    dispatcher: Arc<Dispatcher>,
    membership: Arc<dyn MembershipRepository>,
    push: Arc<dyn PushNotifier>,
}

impl NotificationBridge {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        dispatcher: Arc<Dispatcher>,
        membership: Arc<dyn MembershipRepository>,
        push: Arc<dyn PushNotifier>,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            membership,
            push,
        }
    }

    /// Announce a freshly stored message to its room
    ///
    /// The recipient set comes from the durable membership store, not the
    /// live index, so participants who connected after the message was
    /// stored still resolve correctly. If the store cannot be read the
    /// announcement is abandoned: guessing recipients from the live index
    /// alone could leak the message to a just-removed member.
    pub async fn message_created(&self, record: MessageRecord, room_name: &str) {
        let room_id = record.chat_room_id;
        let sender_id = record.sender_id;

        let participants = match self.membership.room_participants(room_id).await {
            Ok(participants) => participants,
            Err(e) => {
                tracing::warn!(
                    room_id = %room_id,
                    message_id = %record.id,
                    error = %e,
                    "Participant lookup failed, dropping announcement"
                );
                return;
            }
        };

        let recipients: Vec<UserId> = participants
            .into_iter()
            .filter(|user_id| *user_id != sender_id)
            .collect();

        self.deliver_live(&record, &recipients).await;
        self.deliver_push(&record, room_name, &recipients).await;
    }

    /// Live path: `new_message` to connected recipients, delivery ack to the
    /// sender
    async fn deliver_live(&self, record: &MessageRecord, recipients: &[UserId]) {
        let event = ServerMessage::new_message(record.clone());
        let mut delivered = 0;

        for user_id in recipients {
            if self.dispatcher.send_to_user(*user_id, event.clone()).await {
                delivered += 1;
            }
        }

        tracing::debug!(
            message_id = %record.id,
            room_id = %record.chat_room_id,
            delivered = delivered,
            recipients = recipients.len(),
            "Message fanned out"
        );

        if self.registry.is_online(record.sender_id) {
            let ack = ServerMessage::message_delivered(DeliveredPayload {
                message_id: record.id,
                chat_room_id: record.chat_room_id,
                timestamp: record.created_at,
            });
            self.dispatcher.send_to_user(record.sender_id, ack).await;
        }
    }

    /// Push path: one notification per recipient, failures logged per user
    async fn deliver_push(&self, record: &MessageRecord, room_name: &str, recipients: &[UserId]) {
        let title = format!("{} • {}", record.sender.display_name, room_name);
        let body = truncate_body(&record.content);
        let metadata = json!({
            "type": "message",
            "chat_room_id": record.chat_room_id,
            "sender_name": record.sender.display_name,
            "action": "open_chat",
        });

        for user_id in recipients {
            if let Err(e) = self
                .push
                .notify(*user_id, &title, &body, metadata.clone())
                .await
            {
                tracing::warn!(
                    user_id = %user_id,
                    message_id = %record.id,
                    error = %e,
                    "Push notification failed"
                );
            }
        }
    }
}

/// Cap the push body at 100 characters, marking the cut with an ellipsis
fn truncate_body(content: &str) -> String {
    if content.chars().count() <= PUSH_BODY_LIMIT {
        return content.to_string();
    }
    let head: String = content.chars().take(PUSH_BODY_LIMIT - 3).collect();
    format!("{head}...")
}

impl std::fmt::Debug for NotificationBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationBridge")
            .field("registry", &self.registry)
            .finish()
    }
}

//! Broadcast dispatcher
//!
//! Resolves the live recipient set for an event and delivers it to each,
//! tolerating per-recipient failure. Recipient sets are snapshotted under the
//! registry lock; delivery happens outside it, so a recipient that
//! disconnects in that window simply fails the write and is cleaned up
//! through the same path as any other disconnect.

use crate::connection::ConnectionRegistry;
use crate::protocol::{PresenceStatus, ServerMessage, UserStatusPayload};
use chrono::Utc;
use relay_core::{ConnectionId, PresenceRepository, RoomId, UserId};
use std::collections::VecDeque;
use std::sync::Arc;

/// Fans events out to live connections
pub struct Dispatcher {
    registry: Arc<ConnectionRegistry>,
    presence: Arc<dyn PresenceRepository>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ConnectionRegistry>, presence: Arc<dyn PresenceRepository>) -> Self {
        Self { registry, presence }
    }

    /// Deliver an event to every live member of a room, minus the excluded user
    ///
    /// Offline members are silently skipped (they are simply not in the
    /// resolved set). Returns the number of sessions written to.
    pub async fn broadcast_to_room(
        &self,
        room_id: RoomId,
        message: ServerMessage,
        exclude_user_id: Option<UserId>,
    ) -> usize {
        let recipients = self.registry.room_recipients(room_id, exclude_user_id);

        let mut sent = 0;
        let mut failed = Vec::new();

        for session in recipients {
            if session.send(message.clone()).await.is_ok() {
                sent += 1;
            } else {
                failed.push((session.user_id(), session.connection_id()));
            }
        }

        tracing::trace!(
            room_id = %room_id,
            sent = sent,
            failed = failed.len(),
            "Event dispatched to room"
        );

        for (user_id, connection_id) in failed {
            self.drop_session(user_id, connection_id).await;
        }

        sent
    }

    /// Deliver an event to a single user's live session, if any
    ///
    /// Returns false when the user is offline. A failed write is treated as
    /// that user having disconnected and triggers the full cleanup path.
    pub async fn send_to_user(&self, user_id: UserId, message: ServerMessage) -> bool {
        let Some(session) = self.registry.lookup(user_id) else {
            return false;
        };

        if session.send(message).await.is_ok() {
            return true;
        }

        tracing::debug!(user_id = %user_id, "Write failed, treating as disconnect");
        self.drop_session(user_id, session.connection_id()).await;
        false
    }

    /// Broadcast a presence change to every room the user belongs to
    ///
    /// `rooms` is passed in because on the offline path the membership index
    /// has already been cleared by the time this runs. An empty room set (or
    /// a room with no other live member) is a no-op, not an error.
    pub async fn broadcast_user_status<I>(&self, user_id: UserId, rooms: I, status: PresenceStatus)
    where
        I: IntoIterator<Item = RoomId>,
    {
        let message = ServerMessage::user_status(self.status_payload(user_id, status).await);

        for room_id in rooms {
            self.broadcast_to_room(room_id, message.clone(), Some(user_id)).await;
        }
    }

    /// Tear down a session: registry + index removal, durable offline mark,
    /// and the offline presence broadcast to formerly shared rooms
    ///
    /// This is the single close path for graceful disconnects, supersedes
    /// detected too late, and failed writes. Idempotent through the registry's
    /// connection-id guard. Runs as a worklist so that recipients whose own
    /// writes fail during the offline broadcast are torn down in turn without
    /// recursing.
    pub async fn drop_session(&self, user_id: UserId, connection_id: ConnectionId) {
        let mut queue = VecDeque::from([(user_id, connection_id)]);

        while let Some((user_id, connection_id)) = queue.pop_front() {
            let Some(removed) = self.registry.remove(user_id, connection_id) else {
                continue;
            };
            removed.session.request_close();

            tracing::info!(
                user_id = %user_id,
                rooms = removed.rooms.len(),
                "Session torn down"
            );

            if let Err(e) = self.presence.set_offline(user_id, Utc::now()).await {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to mark user offline");
            }

            let message = ServerMessage::user_status(
                self.status_payload(user_id, PresenceStatus::Offline).await,
            );

            for room_id in &removed.rooms {
                let recipients = self.registry.room_recipients(*room_id, Some(user_id));
                for session in recipients {
                    if session.send(message.clone()).await.is_err() {
                        queue.push_back((session.user_id(), session.connection_id()));
                    }
                }
            }
        }
    }

    /// Build a `user_status` payload, degrading gracefully if the profile
    /// lookup fails
    async fn status_payload(&self, user_id: UserId, status: PresenceStatus) -> UserStatusPayload {
        let profile = match self.presence.profile(user_id).await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Profile lookup failed");
                None
            }
        };

        UserStatusPayload {
            user_id,
            status,
            display_name: profile.as_ref().map(|p| p.display_name.clone()),
            last_seen: profile.and_then(|p| p.last_seen),
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .finish()
    }
}

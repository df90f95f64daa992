//! A single live, authenticated connection

use crate::protocol::ServerMessage;
use chrono::{DateTime, Utc};
use relay_core::{ConnectionId, UserId};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

/// One user's live connection
///
/// Owns the outbound queue for its socket: every event for this connection
/// goes through the `mpsc` sender, so a single writer task drains it and
/// per-recipient ordering falls out of the queue. The registry holds the only
/// long-lived clone of the sender; removing the session from the registry
/// therefore closes the queue once the handler's own copy is gone.
pub struct Session {
    user_id: UserId,
    connection_id: ConnectionId,
    connected_at: DateTime<Utc>,
    sender: mpsc::Sender<ServerMessage>,
    close_signal: Notify,
}

impl Session {
    /// Create a new session for an authenticated user
    pub fn new(user_id: UserId, sender: mpsc::Sender<ServerMessage>) -> Arc<Self> {
        Arc::new(Self {
            user_id,
            connection_id: ConnectionId::generate(),
            connected_at: Utc::now(),
            sender,
            close_signal: Notify::new(),
        })
    }

    /// The authenticated user behind this connection
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Process-local id distinguishing this connection from a successor
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// When the connection authenticated
    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Queue a message for this connection
    ///
    /// Fails once the writer task has gone away, which the dispatcher treats
    /// as an implicit disconnect.
    pub async fn send(&self, message: ServerMessage) -> Result<(), SendError> {
        self.sender.send(message).await.map_err(|_| SendError)
    }

    /// Whether the outbound queue has been closed
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Request closure of this connection's transport
    ///
    /// Used when a newer connection from the same user supersedes this one.
    pub fn request_close(&self) {
        self.close_signal.notify_one();
    }

    /// Resolves when closure has been requested
    pub async fn closed(&self) {
        self.close_signal.notified().await;
    }
}

/// The connection's writer task is gone; the transport is effectively dead
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("session outbound queue closed")]
pub struct SendError;

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("connection_id", &self.connection_id)
            .field("connected_at", &self.connected_at)
            .finish()
    }
}

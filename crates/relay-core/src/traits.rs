//! Collaborator ports
//!
//! The realtime core talks to everything outside the process through these
//! narrow interfaces. The gateway defines what it needs; the embedding server
//! provides the implementations (SQL store, web push, ...). Keeping the ports
//! this small is what lets every test run against in-memory fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;

use crate::entities::UserProfile;
use crate::error::DomainResult;
use crate::value_objects::{RoomId, UserId};

/// Validates a bearer credential presented during the handshake
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Resolve a token to a user identity, or fail with `Unauthorized`
    async fn verify(&self, token: &str) -> DomainResult<UserId>;
}

/// Durable room-membership queries
///
/// Live dispatch works off a connection-scoped cache of this data; the
/// notification bridge goes back to the store because a participant need not
/// be connected.
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// All rooms the user participates in (queried once, at registration)
    async fn room_memberships(&self, user_id: UserId) -> DomainResult<HashSet<RoomId>>;

    /// All participants of a room, connected or not
    async fn room_participants(&self, room_id: RoomId) -> DomainResult<HashSet<UserId>>;
}

/// Durable presence marks and display profiles
#[async_trait]
pub trait PresenceRepository: Send + Sync {
    /// Mark the user online in the durable store
    async fn set_online(&self, user_id: UserId) -> DomainResult<()>;

    /// Mark the user offline with a last-seen timestamp
    async fn set_offline(&self, user_id: UserId, last_seen: DateTime<Utc>) -> DomainResult<()>;

    /// Display profile for presence events; `None` for unknown users
    async fn profile(&self, user_id: UserId) -> DomainResult<Option<UserProfile>>;
}

/// Best-effort push delivery to a user's registered devices
///
/// Fire-and-forget from the core's perspective: failures are logged by the
/// caller and never retried here.
#[async_trait]
pub trait PushNotifier: Send + Sync {
    async fn notify(
        &self,
        user_id: UserId,
        title: &str,
        body: &str,
        metadata: Value,
    ) -> DomainResult<()>;
}

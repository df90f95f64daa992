//! Connection registry
//!
//! The single source of truth for which users are live. One `RwLock` guards
//! the active-session map and the room index together, so a connect can never
//! race a broadcast resolving membership for the same room. The lock is never
//! held across an `.await`: recipient sets are resolved under it and the
//! (potentially blocking) writes happen outside.

use super::membership::RoomIndex;
use super::session::Session;
use parking_lot::RwLock;
use relay_core::{ConnectionId, RoomId, UserId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

struct Inner {
    active: HashMap<UserId, Arc<Session>>,
    rooms: RoomIndex,
}

/// Registry of active sessions plus the live membership index
pub struct ConnectionRegistry {
    inner: RwLock<Inner>,
}

/// What `remove` tears out of the registry for one session
pub struct RemovedSession {
    pub session: Arc<Session>,
    /// Rooms the user belonged to, for the offline presence broadcast
    pub rooms: HashSet<RoomId>,
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                active: HashMap::new(),
                rooms: RoomIndex::new(),
            }),
        }
    }

    /// Create a new registry wrapped in Arc
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a session as the user's active connection (last-connect-wins)
    ///
    /// The user's memberships are installed in the same critical section. If
    /// the user already had a session, it is returned after being asked to
    /// close, so no two live transports reference one logical user.
    pub fn register(
        &self,
        session: Arc<Session>,
        rooms: HashSet<RoomId>,
    ) -> Option<Arc<Session>> {
        let user_id = session.user_id();

        let superseded = {
            let mut inner = self.inner.write();
            let old = inner.active.insert(user_id, session);
            inner.rooms.replace_user(user_id, rooms);
            old
        };

        if let Some(old) = &superseded {
            tracing::info!(
                user_id = %user_id,
                old_connection = %old.connection_id(),
                "Session superseded by newer connection"
            );
            old.request_close();
        }

        tracing::debug!(user_id = %user_id, "Session registered");

        superseded
    }

    /// Remove the user's session if it is still the given connection
    ///
    /// Idempotent: a second call for the same connection, or a call for a
    /// connection that has already been superseded, is a no-op. Membership
    /// entries are cleared in the same critical section.
    pub fn remove(&self, user_id: UserId, connection_id: ConnectionId) -> Option<RemovedSession> {
        let mut inner = self.inner.write();

        let is_current = inner
            .active
            .get(&user_id)
            .is_some_and(|s| s.connection_id() == connection_id);
        if !is_current {
            return None;
        }

        let session = inner.active.remove(&user_id)?;
        let rooms = inner.rooms.remove_user(user_id);
        drop(inner);

        tracing::debug!(user_id = %user_id, "Session removed");
        Some(RemovedSession { session, rooms })
    }

    /// The user's active session, if any
    pub fn lookup(&self, user_id: UserId) -> Option<Arc<Session>> {
        self.inner.read().active.get(&user_id).cloned()
    }

    /// Whether the user currently has an active session
    pub fn is_online(&self, user_id: UserId) -> bool {
        self.inner.read().active.contains_key(&user_id)
    }

    /// Live members of a room
    pub fn members_of(&self, room_id: RoomId) -> HashSet<UserId> {
        self.inner.read().rooms.members_of(room_id)
    }

    /// Rooms the user's live session belongs to
    pub fn rooms_of(&self, user_id: UserId) -> HashSet<RoomId> {
        self.inner.read().rooms.rooms_of(user_id)
    }

    /// Resolve the live recipient sessions for a room, minus the excluded user
    ///
    /// Snapshot taken under the lock; callers deliver outside it and treat a
    /// failed write as that recipient having disconnected in the window.
    pub fn room_recipients(
        &self,
        room_id: RoomId,
        exclude_user_id: Option<UserId>,
    ) -> Vec<Arc<Session>> {
        let inner = self.inner.read();

        inner
            .rooms
            .members_of(room_id)
            .into_iter()
            .filter(|user_id| Some(*user_id) != exclude_user_id)
            .filter_map(|user_id| inner.active.get(&user_id).cloned())
            .collect()
    }

    /// Number of active sessions
    pub fn session_count(&self) -> usize {
        self.inner.read().active.len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("ConnectionRegistry")
            .field("sessions", &inner.active.len())
            .field("rooms", &inner.rooms.room_count())
            .finish()
    }
}

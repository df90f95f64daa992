//! Room membership index
//!
//! Bidirectional user↔room map, populated once per connection from the
//! durable store and torn down at disconnect. The two directions are only
//! ever mutated together, so they stay mutual inverses by construction.

use relay_core::{RoomId, UserId};
use std::collections::{HashMap, HashSet};

/// Connection-scoped bidirectional membership map
#[derive(Debug, Default)]
pub struct RoomIndex {
    rooms_by_user: HashMap<UserId, HashSet<RoomId>>,
    members_by_room: HashMap<RoomId, HashSet<UserId>>,
}

impl RoomIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the user's memberships, replacing any previous entry
    ///
    /// Replacement covers the supersede case: a reconnecting user's fresh
    /// room set simply overwrites the stale one.
    pub fn replace_user(&mut self, user_id: UserId, rooms: HashSet<RoomId>) {
        self.remove_user(user_id);

        for room_id in &rooms {
            self.members_by_room.entry(*room_id).or_default().insert(user_id);
        }

        if !rooms.is_empty() {
            self.rooms_by_user.insert(user_id, rooms);
        }
    }

    /// Remove the user from every room, returning the rooms they were in
    pub fn remove_user(&mut self, user_id: UserId) -> HashSet<RoomId> {
        let rooms = self.rooms_by_user.remove(&user_id).unwrap_or_default();

        for room_id in &rooms {
            if let Some(members) = self.members_by_room.get_mut(room_id) {
                members.remove(&user_id);
                if members.is_empty() {
                    self.members_by_room.remove(room_id);
                }
            }
        }

        rooms
    }

    /// Current members of a room (empty for unknown rooms)
    pub fn members_of(&self, room_id: RoomId) -> HashSet<UserId> {
        self.members_by_room.get(&room_id).cloned().unwrap_or_default()
    }

    /// Rooms the user currently belongs to (empty if not indexed)
    pub fn rooms_of(&self, user_id: UserId) -> HashSet<RoomId> {
        self.rooms_by_user.get(&user_id).cloned().unwrap_or_default()
    }

    /// Whether the user has any indexed membership
    pub fn contains_user(&self, user_id: UserId) -> bool {
        self.rooms_by_user.contains_key(&user_id)
    }

    /// Number of rooms with at least one live member
    pub fn room_count(&self) -> usize {
        self.members_by_room.len()
    }
}

//! Session/presence tracker — who is in which room.
//!
//! DESIGN
//! ======
//! Membership is a set per room: joining twice is idempotent and leaving a
//! never-joined session is a no-op that always succeeds (the disconnect path
//! relies on this). Sessions without a room assignment sit in the lobby and
//! contribute to no room's membership. The fixed room keys are pre-seeded so
//! `counts_by_room` always reports every room, zeros included.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use protocol::ROOM_KEYS;
use tracing::debug;
use uuid::Uuid;

pub struct PresenceTracker {
    /// Room key -> member set. Seeded with every fixed room.
    members: BTreeMap<String, BTreeSet<Uuid>>,
    /// Reverse index: session -> room, for O(1) leave.
    assignments: HashMap<Uuid, String>,
}

impl PresenceTracker {
    #[must_use]
    pub fn new() -> Self {
        let members = ROOM_KEYS
            .iter()
            .map(|key| ((*key).to_owned(), BTreeSet::new()))
            .collect();
        Self { members, assignments: HashMap::new() }
    }

    /// Add a session to a room. Idempotent: rejoining the same room changes
    /// nothing. Unknown room keys are ignored — the room set is fixed, and a
    /// join must never grow it.
    pub fn join(&mut self, session_id: Uuid, room: &str) {
        let Some(set) = self.members.get_mut(room) else {
            debug!(%session_id, room, "ignoring join to unknown room");
            return;
        };
        set.insert(session_id);
        self.assignments.insert(session_id, room.to_owned());
    }

    /// Remove a session, returning the room it left. No-op (returns `None`)
    /// for sessions that never joined a room.
    pub fn leave(&mut self, session_id: Uuid) -> Option<String> {
        let room = self.assignments.remove(&session_id)?;
        if let Some(set) = self.members.get_mut(&room) {
            set.remove(&session_id);
        }
        Some(room)
    }

    /// Current members of a room, in stable order. Empty for unknown keys.
    #[must_use]
    pub fn members_of(&self, room: &str) -> Vec<Uuid> {
        self.members
            .get(room)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Member count for one room. Zero for unknown keys.
    #[must_use]
    pub fn member_count(&self, room: &str) -> usize {
        self.members.get(room).map_or(0, BTreeSet::len)
    }

    /// Member count per room, every fixed room included.
    #[must_use]
    pub fn counts_by_room(&self) -> BTreeMap<String, usize> {
        self.members
            .iter()
            .map(|(room, set)| (room.clone(), set.len()))
            .collect()
    }
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "presence_test.rs"]
mod tests;

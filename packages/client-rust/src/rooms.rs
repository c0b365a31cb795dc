//! Per-room poll state for the rooms this session currently follows.
//!
//! Tracks which rooms are still polled, how far each has been fetched, a
//! rolling window of recently deleted message ids, and the newest canonical
//! snapshot seen for each message (so the optimistic view can be rebuilt
//! between polls). Snapshots are bounded per room; the messages first seen
//! longest ago are evicted first. A deleted message drops its snapshot and
//! its cached mutations. Leaving a room drops all of this together with the
//! room's cached mutations.

use std::collections::{HashMap, VecDeque};

use dashmap::DashMap;
use tracing::{debug, info};

use opengroup_core::{MessageSnapshot, RoomKey};

use crate::shared::SharedMutationCache;

#[derive(Debug, Default)]
struct RoomState {
    max_fetched_seqno: Option<u64>,
    /// Oldest first, bounded by the registry's deletion window.
    deleted: VecDeque<u64>,
    canonical: HashMap<u64, MessageSnapshot>,
    /// Keys of `canonical`, oldest first.
    canonical_order: VecDeque<u64>,
}

impl RoomState {
    fn drop_canonical(&mut self, message_id: u64) {
        if self.canonical.remove(&message_id).is_some() {
            self.canonical_order.retain(|&id| id != message_id);
        }
    }
}

/// Default per-room bound on held canonical snapshots.
pub const DEFAULT_SNAPSHOT_CAPACITY: usize = 500;

/// Registry of followed rooms, keyed by server and room token.
pub struct RoomRegistry {
    rooms: DashMap<RoomKey, RoomState>,
    cache: SharedMutationCache,
    deletion_window: usize,
    snapshot_capacity: usize,
}

impl RoomRegistry {
    #[must_use]
    pub fn new(cache: SharedMutationCache, deletion_window: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            cache,
            deletion_window,
            snapshot_capacity: DEFAULT_SNAPSHOT_CAPACITY,
        }
    }

    /// Overrides how many canonical snapshots are held per room.
    #[must_use]
    pub fn with_snapshot_capacity(mut self, capacity: usize) -> Self {
        self.snapshot_capacity = capacity.max(1);
        self
    }

    /// Starts following a room. Returns false if it was already followed.
    pub fn join_room(&self, server: &str, room: &str) -> bool {
        let key = RoomKey::new(server, room);
        if self.rooms.contains_key(&key) {
            return false;
        }
        self.rooms.insert(key, RoomState::default());
        info!(server, room, "following room");
        true
    }

    /// Stops following a room and purges its cached mutations.
    ///
    /// Returns false if the room was not followed; the purge runs regardless
    /// so no mutation outlives its room.
    pub fn leave_room(&self, server: &str, room: &str) -> bool {
        let was_followed = self.rooms.remove(&RoomKey::new(server, room)).is_some();
        let purged = self.cache.purge_room(server, room);
        info!(server, room, purged, "left room");
        was_followed
    }

    #[must_use]
    pub fn is_polled(&self, server: &str, room: &str) -> bool {
        self.rooms.contains_key(&RoomKey::new(server, room))
    }

    /// Rooms currently followed, in no particular order.
    #[must_use]
    pub fn polled_rooms(&self) -> Vec<RoomKey> {
        self.rooms.iter().map(|r| r.key().clone()).collect()
    }

    /// Raises the room's fetched seqno to `seqno` if it is higher.
    pub fn advance_seqno(&self, server: &str, room: &str, seqno: u64) {
        if let Some(mut state) = self.rooms.get_mut(&RoomKey::new(server, room)) {
            let current = state.max_fetched_seqno.get_or_insert(seqno);
            *current = (*current).max(seqno);
        }
    }

    #[must_use]
    pub fn max_fetched_seqno(&self, server: &str, room: &str) -> Option<u64> {
        self.rooms
            .get(&RoomKey::new(server, room))
            .and_then(|state| state.max_fetched_seqno)
    }

    /// Remembers a deleted message, evicting the oldest id past the window.
    ///
    /// The message's held snapshot and every cached mutation targeting it are
    /// dropped: no later snapshot will ever prune them.
    pub fn record_deleted(&self, server: &str, room: &str, message_id: u64) {
        {
            let Some(mut state) = self.rooms.get_mut(&RoomKey::new(server, room)) else {
                return;
            };
            state.drop_canonical(message_id);
            if !state.deleted.contains(&message_id) {
                state.deleted.push_back(message_id);
                while state.deleted.len() > self.deletion_window {
                    state.deleted.pop_front();
                }
                debug!(server, room, message_id, "recorded deleted message");
            }
        }
        self.cache.purge_message(server, room, message_id);
    }

    #[must_use]
    pub fn was_deleted(&self, server: &str, room: &str, message_id: u64) -> bool {
        self.rooms
            .get(&RoomKey::new(server, room))
            .is_some_and(|state| state.deleted.contains(&message_id))
    }

    /// Keeps `snapshot` as the message's canonical state unless a newer one
    /// is already held. Returns whether it was stored.
    pub fn store_canonical(&self, server: &str, room: &str, snapshot: &MessageSnapshot) -> bool {
        let Some(mut state) = self.rooms.get_mut(&RoomKey::new(server, room)) else {
            return false;
        };
        let held = state.canonical.get(&snapshot.id).map(|held| held.seqno);
        if let Some(held) = held.filter(|&held| held > snapshot.seqno) {
            debug!(
                server,
                room,
                message_id = snapshot.id,
                held,
                incoming = snapshot.seqno,
                "ignoring stale snapshot"
            );
            return false;
        }
        if state.canonical.insert(snapshot.id, snapshot.clone()).is_none() {
            state.canonical_order.push_back(snapshot.id);
            while state.canonical_order.len() > self.snapshot_capacity {
                if let Some(evicted) = state.canonical_order.pop_front() {
                    state.canonical.remove(&evicted);
                    debug!(server, room, message_id = evicted, "evicted canonical snapshot");
                }
            }
        }
        true
    }

    /// Newest canonical snapshot held for a message.
    #[must_use]
    pub fn canonical(&self, server: &str, room: &str, message_id: u64) -> Option<MessageSnapshot> {
        self.rooms
            .get(&RoomKey::new(server, room))
            .and_then(|state| state.canonical.get(&message_id).cloned())
    }
}

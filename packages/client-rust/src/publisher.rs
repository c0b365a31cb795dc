//! Builds effective reaction views and hands them to the UI sink.

use std::sync::Arc;

use tracing::debug;

use opengroup_core::MessageSnapshot;

use crate::rooms::RoomRegistry;
use crate::shared::SharedMutationCache;
use crate::sink::{ReactionSink, ReactionUpdate};

/// Reconciles canonical state with pending mutations and emits the result.
///
/// Used by the poll glue when a snapshot arrives and by the submission glue
/// when a mutation is added or abandoned between polls.
pub struct ReactionPublisher {
    cache: SharedMutationCache,
    rooms: Arc<RoomRegistry>,
    sink: Arc<dyn ReactionSink>,
    our_pubkey: String,
}

impl ReactionPublisher {
    #[must_use]
    pub fn new(
        cache: SharedMutationCache,
        rooms: Arc<RoomRegistry>,
        sink: Arc<dyn ReactionSink>,
        our_pubkey: String,
    ) -> Self {
        Self {
            cache,
            rooms,
            sink,
            our_pubkey,
        }
    }

    /// Records a freshly polled snapshot and emits the message's effective view.
    ///
    /// If a newer snapshot of the same message is already held, that one is
    /// used as the basis so an out-of-order poll cannot roll the view back.
    pub fn publish_snapshot(&self, server: &str, room: &str, snapshot: &MessageSnapshot) {
        self.rooms.store_canonical(server, room, snapshot);
        let basis = self
            .rooms
            .canonical(server, room, snapshot.id)
            .unwrap_or_else(|| snapshot.clone());
        self.emit(server, room, &basis);
    }

    /// Re-emits a message's view from the last snapshot held for it, or from
    /// empty server state if it has not been polled yet.
    ///
    /// Emits nothing for a room that is no longer followed.
    pub fn republish(&self, server: &str, room: &str, message_id: u64) {
        if !self.rooms.is_polled(server, room) {
            debug!(server, room, message_id, "room not followed, not republishing");
            return;
        }
        let basis = self
            .rooms
            .canonical(server, room, message_id)
            .unwrap_or_else(|| MessageSnapshot {
                id: message_id,
                ..MessageSnapshot::default()
            });
        self.emit(server, room, &basis);
    }

    fn emit(&self, server: &str, room: &str, basis: &MessageSnapshot) {
        let outcome = self.cache.reconcile(server, room, basis, &self.our_pubkey);
        self.sink.on_reactions(ReactionUpdate {
            server: server.to_string(),
            room: room.to_string(),
            message_id: basis.id,
            reactions: outcome.effective,
        });
    }
}

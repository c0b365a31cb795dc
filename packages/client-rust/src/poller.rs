//! Poll glue: turns one room's batch of polled messages into reaction updates.
//!
//! For each batch the handler skips rooms that are no longer followed,
//! decodes messages (dropping undecodable ones), orders them by seqno,
//! records deletions (dropping the deleted messages' cached mutations),
//! advances the room's fetched seqno, and reconciles every
//! message that carries reaction data. Reaction-only updates (`id`, `seqno`,
//! `reactions` and nothing else) go through the same path.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use opengroup_core::MessageSnapshot;

use crate::publisher::ReactionPublisher;
use crate::rooms::RoomRegistry;

/// Handles message batches delivered by the (external) room poller.
pub struct PollHandler {
    rooms: Arc<RoomRegistry>,
    publisher: Arc<ReactionPublisher>,
}

impl PollHandler {
    #[must_use]
    pub fn new(rooms: Arc<RoomRegistry>, publisher: Arc<ReactionPublisher>) -> Self {
        Self { rooms, publisher }
    }

    /// Processes one room's poll batch of raw SOGS message objects.
    ///
    /// Returns the number of reaction updates emitted.
    pub fn handle_messages(&self, server: &str, room: &str, messages: Vec<JsonValue>) -> usize {
        self.handle_snapshots(server, room, decode_batch(messages))
    }

    /// Same as [`handle_messages`](Self::handle_messages) for already decoded snapshots.
    pub fn handle_snapshots(
        &self,
        server: &str,
        room: &str,
        mut snapshots: Vec<MessageSnapshot>,
    ) -> usize {
        if !self.rooms.is_polled(server, room) {
            info!(server, room, "no longer polling room, skipping batch");
            return 0;
        }

        snapshots.sort_by_key(|s| s.seqno);

        for snapshot in snapshots.iter().filter(|s| s.is_deleted()) {
            self.rooms.record_deleted(server, room, snapshot.id);
        }
        if let Some(max) = snapshots.iter().map(|s| s.seqno).max() {
            self.rooms.advance_seqno(server, room, max);
        }

        let mut emitted = 0;
        for snapshot in &snapshots {
            let Some(reactions) = &snapshot.reactions else {
                continue;
            };
            if reactions.is_empty() && self.rooms.was_deleted(server, room, snapshot.id) {
                debug!(
                    server,
                    room,
                    message_id = snapshot.id,
                    "skipping reactions of deleted message"
                );
                continue;
            }
            self.publisher.publish_snapshot(server, room, snapshot);
            emitted += 1;
        }
        emitted
    }
}

/// Decodes raw message objects, logging and dropping the ones that do not parse.
fn decode_batch(messages: Vec<JsonValue>) -> Vec<MessageSnapshot> {
    messages
        .into_iter()
        .filter_map(|raw| match serde_json::from_value::<MessageSnapshot>(raw) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                warn!(error = %err, "dropping undecodable message from poll");
                None
            }
        })
        .collect()
}

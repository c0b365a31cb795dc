//! In-process store of optimistic mutations awaiting server confirmation.
//!
//! [`MutationCache`] is an append-ordered list: entries are kept oldest first
//! and every entry carries an [`EntryHandle`] assigned at insertion. Handles
//! are the only reliable way to address an entry, because a user can queue
//! two structurally identical mutations (add, remove, add on the same emoji)
//! before the server acknowledges any of them.
//!
//! # Lifecycle
//!
//! ```text
//! add ──> Created(seqno = None) ──ack(n)──> Acked(seqno = Some(n)) ──reconcile──> Pruned
//!                 │                                   │
//!                 └───────────── remove ──────────────┴──> Removed
//! ```
//!
//! Pruning is driven by [`reconcile`](crate::reconcile::reconcile); `remove`
//! is for the submission layer's failure and timeout paths. Leaving a room
//! calls [`MutationCache::purge_room`]; a server-side message deletion calls
//! [`MutationCache::purge_message`].

use tracing::{debug, info, warn};

use crate::error::CacheError;
use crate::mutation::{check, EntryHandle, MutationEntry};

/// A cached mutation together with its handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMutation {
    pub handle: EntryHandle,
    pub entry: MutationEntry,
}

/// Ordered store of pending optimistic mutations.
///
/// Owned by one application session. Not thread-safe on its own: hosts that
/// touch it from several threads wrap it in a single mutex so that a whole
/// reconcile pass observes one consistent set of entries.
#[derive(Debug, Default)]
pub struct MutationCache {
    /// Sorted by handle, which is also creation order.
    entries: Vec<PendingMutation>,
    next_ordinal: u64,
}

impl MutationCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends a validated entry and returns its handle.
    ///
    /// The stored copy always starts unacknowledged, whatever `seqno` the
    /// caller passed in.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Validation`] if the entry fails [`verify`](crate::mutation::verify).
    /// The cache is left untouched.
    pub fn add(&mut self, mut entry: MutationEntry) -> Result<EntryHandle, CacheError> {
        if let Err(err) = check(&entry) {
            warn!(
                server = %entry.server,
                room = %entry.room,
                error = %err,
                "rejecting invalid mutation entry"
            );
            return Err(err.into());
        }

        entry.seqno = None;
        let handle = EntryHandle(self.next_ordinal);
        self.next_ordinal += 1;
        debug!(%handle, server = %entry.server, room = %entry.room, "cached optimistic mutation");
        self.entries.push(PendingMutation { handle, entry });
        Ok(handle)
    }

    /// Records the server-assigned seqno for the entry behind `handle`.
    ///
    /// A seqno, once set, is never replaced: a second ack for the same entry
    /// is logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::NotFound`] if no entry has this handle, e.g. it
    /// was already pruned, removed, or rejected at `add`. The cache is left
    /// unchanged and the next poll shows plain server state.
    pub fn ack(&mut self, handle: EntryHandle, seqno: u64) -> Result<(), CacheError> {
        let Some(pending) = self.find_mut(handle) else {
            warn!(%handle, seqno, "ack for unknown mutation, leaving cache unchanged");
            return Err(CacheError::NotFound { handle });
        };

        match pending.entry.seqno {
            Some(existing) => {
                debug!(%handle, existing, seqno, "mutation already acknowledged");
            }
            None => pending.entry.seqno = Some(seqno),
        }
        Ok(())
    }

    /// Acknowledges the oldest unacknowledged entry structurally equal to
    /// `template` (ignoring `seqno`). For callers that no longer hold the
    /// handle returned by [`add`](Self::add).
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::NoMatch`] when nothing unacknowledged matches.
    pub fn ack_matching(
        &mut self,
        template: &MutationEntry,
        seqno: u64,
    ) -> Result<EntryHandle, CacheError> {
        let found = self
            .entries
            .iter_mut()
            .find(|p| p.entry.seqno.is_none() && p.entry.same_mutation(template));

        if let Some(pending) = found {
            pending.entry.seqno = Some(seqno);
            return Ok(pending.handle);
        }

        warn!(
            server = %template.server,
            room = %template.room,
            message_id = template.message_id(),
            seqno,
            "ack matched no pending mutation"
        );
        Err(CacheError::NoMatch {
            server: template.server.clone(),
            room: template.room.clone(),
            message_id: template.message_id(),
        })
    }

    /// Deletes the entry behind `handle`, returning it if it was present.
    pub fn remove(&mut self, handle: EntryHandle) -> Option<MutationEntry> {
        let idx = self.position(handle)?;
        Some(self.entries.remove(idx).entry)
    }

    /// Returns the entry behind `handle`.
    #[must_use]
    pub fn get(&self, handle: EntryHandle) -> Option<&MutationEntry> {
        self.position(handle).map(|idx| &self.entries[idx].entry)
    }

    /// All entries targeting one message, oldest first.
    #[must_use]
    pub fn pending_for(&self, server: &str, room: &str, message_id: u64) -> Vec<PendingMutation> {
        self.entries
            .iter()
            .filter(|p| p.entry.targets(server, room, message_id))
            .cloned()
            .collect()
    }

    /// Drops every entry belonging to a room. Returns how many were dropped.
    pub fn purge_room(&mut self, server: &str, room: &str) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|p| !(p.entry.server == server && p.entry.room == room));
        let purged = before - self.entries.len();
        if purged > 0 {
            info!(server, room, purged, "purged cached mutations for room");
        }
        purged
    }

    /// Drops every entry targeting one message, acked or not. Used when the
    /// server reports the message deleted. Returns how many were dropped.
    pub fn purge_message(&mut self, server: &str, room: &str, message_id: u64) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|p| !p.entry.targets(server, room, message_id));
        let purged = before - self.entries.len();
        if purged > 0 {
            debug!(server, room, message_id, purged, "purged cached mutations for message");
        }
        purged
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterates over all entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = (EntryHandle, &MutationEntry)> {
        self.entries.iter().map(|p| (p.handle, &p.entry))
    }

    fn position(&self, handle: EntryHandle) -> Option<usize> {
        self.entries
            .binary_search_by_key(&handle, |p| p.handle)
            .ok()
    }

    fn find_mut(&mut self, handle: EntryHandle) -> Option<&mut PendingMutation> {
        let idx = self.position(handle)?;
        self.entries.get_mut(idx)
    }
}

//! Thread-safe handle to a session's [`MutationCache`].
//!
//! Every operation takes the lock exactly once and releases it before
//! returning, so a reconcile pass (query, prune, overlay) for one message is
//! atomic with respect to concurrent acks and adds. The lock is never held
//! across an `.await`.

use std::sync::Arc;

use parking_lot::Mutex;

use opengroup_core::{
    reconcile_reactions, CacheError, EntryHandle, MessageSnapshot, MutationCache, MutationEntry,
    ReactionMap, ReconcileOutcome,
};

/// Cloneable, shared handle to one [`MutationCache`].
#[derive(Debug, Clone, Default)]
pub struct SharedMutationCache {
    inner: Arc<Mutex<MutationCache>>,
}

impl SharedMutationCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// See [`MutationCache::add`].
    ///
    /// # Errors
    ///
    /// Propagates the validation failure from the cache.
    pub fn add(&self, entry: MutationEntry) -> Result<EntryHandle, CacheError> {
        self.inner.lock().add(entry)
    }

    /// See [`MutationCache::ack`].
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::NotFound`] if the entry is gone.
    pub fn ack(&self, handle: EntryHandle, seqno: u64) -> Result<(), CacheError> {
        self.inner.lock().ack(handle, seqno)
    }

    pub fn remove(&self, handle: EntryHandle) -> Option<MutationEntry> {
        self.inner.lock().remove(handle)
    }

    pub fn purge_room(&self, server: &str, room: &str) -> usize {
        self.inner.lock().purge_room(server, room)
    }

    pub fn purge_message(&self, server: &str, room: &str, message_id: u64) -> usize {
        self.inner.lock().purge_message(server, room, message_id)
    }

    /// Runs one full reconcile pass for a message under a single lock.
    #[must_use]
    pub fn reconcile(
        &self,
        server: &str,
        room: &str,
        snapshot: &MessageSnapshot,
        we_are: &str,
    ) -> ReconcileOutcome<ReactionMap> {
        let mut cache = self.inner.lock();
        reconcile_reactions(&mut cache, server, room, snapshot, we_are)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Copy of the entry behind `handle`, if still cached.
    #[must_use]
    pub fn get(&self, handle: EntryHandle) -> Option<MutationEntry> {
        self.inner.lock().get(handle).cloned()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use opengroup_core::Action;

    use super::*;

    const SERVER: &str = "https://chat.example.org";
    const ROOM: &str = "main";

    #[test]
    fn clones_share_state() {
        let cache = SharedMutationCache::new();
        let other = cache.clone();
        let handle = cache
            .add(MutationEntry::reaction(SERVER, ROOM, 1, "👍", Action::Add))
            .unwrap();
        other.ack(handle, 3).unwrap();
        assert_eq!(cache.get(handle).and_then(|e| e.seqno), Some(3));
    }

    #[test]
    fn concurrent_adds_all_land() {
        let cache = SharedMutationCache::new();
        let workers: Vec<_> = (1..=8u64)
            .map(|id| {
                let cache = cache.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        cache
                            .add(MutationEntry::reaction(SERVER, ROOM, id, "👍", Action::Add))
                            .unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(cache.len(), 200);
    }

    #[test]
    fn reconcile_prunes_through_handle() {
        let cache = SharedMutationCache::new();
        let handle = cache
            .add(MutationEntry::reaction(SERVER, ROOM, 111, "😄", Action::Add))
            .unwrap();
        cache.ack(handle, 10).unwrap();

        let snapshot = MessageSnapshot::with_reactions(111, 10, ReactionMap::new());
        let outcome = cache.reconcile(SERVER, ROOM, &snapshot, "05me");
        assert_eq!(outcome.pruned, 1);
        assert!(cache.is_empty());
    }
}

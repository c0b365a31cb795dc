//! Reaction submission: optimistic add, network call, ack or rollback.
//!
//! ```text
//! submit ──add──> cache (seqno None) ──republish──> UI shows reaction
//!    │
//!    └──transport.send_reaction (bounded by timeout)
//!          ├─ Ok(seqno) ──> ack(handle, seqno)   (pruned later by a poll)
//!          └─ Err / timeout ──> remove(handle) ──republish──> UI rolls back
//! ```
//!
//! Republishing is skipped for rooms left while the request was in flight.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use opengroup_core::{Action, CacheError, EntryHandle, MutationEntry};

use crate::publisher::ReactionPublisher;
use crate::shared::SharedMutationCache;

/// A reaction the user asked to add or remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionRequest {
    pub server: String,
    pub room: String,
    pub message_id: u64,
    pub emoji: String,
    pub action: Action,
}

impl ReactionRequest {
    #[must_use]
    pub fn new(
        server: impl Into<String>,
        room: impl Into<String>,
        message_id: u64,
        emoji: impl Into<String>,
        action: Action,
    ) -> Self {
        Self {
            server: server.into(),
            room: room.into(),
            message_id,
            emoji: emoji.into(),
            action,
        }
    }

    fn to_entry(&self) -> MutationEntry {
        MutationEntry::reaction(
            self.server.clone(),
            self.room.clone(),
            self.message_id,
            self.emoji.clone(),
            self.action,
        )
    }
}

/// Network side of a reaction request. Implemented by the HTTP layer.
#[async_trait]
pub trait ReactionTransport: Send + Sync {
    /// Performs the request and returns the room seqno the server assigned
    /// to the mutation.
    async fn send_reaction(&self, request: &ReactionRequest) -> anyhow::Result<u64>;
}

/// Errors returned by [`ReactionSubmitter::submit`].
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("reaction not submitted: {0}")]
    Rejected(#[from] CacheError),
    #[error("reaction request failed: {0}")]
    Transport(#[from] anyhow::Error),
    #[error("reaction request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Drives the optimistic lifecycle of each reaction request.
pub struct ReactionSubmitter {
    cache: SharedMutationCache,
    publisher: Arc<ReactionPublisher>,
    transport: Arc<dyn ReactionTransport>,
    timeout: Duration,
}

impl ReactionSubmitter {
    #[must_use]
    pub fn new(
        cache: SharedMutationCache,
        publisher: Arc<ReactionPublisher>,
        transport: Arc<dyn ReactionTransport>,
        timeout: Duration,
    ) -> Self {
        Self {
            cache,
            publisher,
            transport,
            timeout,
        }
    }

    /// Applies the reaction optimistically, sends it, and settles the cache
    /// entry according to the outcome. Returns the assigned seqno.
    ///
    /// # Errors
    ///
    /// - [`SubmitError::Rejected`] if the request fails validation; nothing
    ///   is sent.
    /// - [`SubmitError::Transport`] or [`SubmitError::Timeout`] if the request
    ///   did not succeed; the optimistic entry has been removed again.
    pub async fn submit(&self, request: ReactionRequest) -> Result<u64, SubmitError> {
        let handle = self.cache.add(request.to_entry())?;
        self.publisher
            .republish(&request.server, &request.room, request.message_id);

        let sent = tokio::time::timeout(self.timeout, self.transport.send_reaction(&request)).await;
        match sent {
            Ok(Ok(seqno)) => {
                if self.cache.ack(handle, seqno).is_err() {
                    debug!(%handle, seqno, "mutation gone before ack, room likely left");
                }
                Ok(seqno)
            }
            Ok(Err(err)) => {
                warn!(
                    server = %request.server,
                    room = %request.room,
                    message_id = request.message_id,
                    error = %err,
                    "reaction request failed, rolling back"
                );
                self.abandon(&request, handle);
                Err(SubmitError::Transport(err))
            }
            Err(_) => {
                let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(
                    server = %request.server,
                    room = %request.room,
                    message_id = request.message_id,
                    timeout_ms,
                    "reaction request timed out, rolling back"
                );
                self.abandon(&request, handle);
                Err(SubmitError::Timeout { timeout_ms })
            }
        }
    }

    fn abandon(&self, request: &ReactionRequest, handle: EntryHandle) {
        self.cache.remove(handle);
        self.publisher
            .republish(&request.server, &request.room, request.message_id);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::rooms::RoomRegistry;
    use crate::sink::{ChannelSink, ReactionUpdate};

    const SERVER: &str = "https://chat.example.org";
    const ROOM: &str = "main";
    const ME: &str = "05me";

    /// Transport that answers with increasing seqnos.
    struct CountingTransport {
        next: AtomicU64,
    }

    #[async_trait]
    impl ReactionTransport for CountingTransport {
        async fn send_reaction(&self, _request: &ReactionRequest) -> anyhow::Result<u64> {
            Ok(self.next.fetch_add(1, Ordering::Relaxed))
        }
    }

    struct FailingTransport;

    #[async_trait]
    impl ReactionTransport for FailingTransport {
        async fn send_reaction(&self, _request: &ReactionRequest) -> anyhow::Result<u64> {
            anyhow::bail!("onion path failed")
        }
    }

    struct StalledTransport;

    #[async_trait]
    impl ReactionTransport for StalledTransport {
        async fn send_reaction(&self, _request: &ReactionRequest) -> anyhow::Result<u64> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(1)
        }
    }

    /// Transport whose user leaves the room while the request is in flight.
    struct LeaveThenFailTransport {
        rooms: Arc<RoomRegistry>,
    }

    #[async_trait]
    impl ReactionTransport for LeaveThenFailTransport {
        async fn send_reaction(&self, request: &ReactionRequest) -> anyhow::Result<u64> {
            self.rooms.leave_room(&request.server, &request.room);
            anyhow::bail!("request aborted")
        }
    }

    fn submitter(
        transport: Arc<dyn ReactionTransport>,
    ) -> (ReactionSubmitter, SharedMutationCache, UnboundedReceiver<ReactionUpdate>) {
        let cache = SharedMutationCache::new();
        let rooms = Arc::new(RoomRegistry::new(cache.clone(), 16));
        rooms.join_room(SERVER, ROOM);
        let (sink, rx) = ChannelSink::channel();
        let publisher = Arc::new(ReactionPublisher::new(
            cache.clone(),
            rooms,
            Arc::new(sink),
            ME.to_string(),
        ));
        let submitter =
            ReactionSubmitter::new(cache.clone(), publisher, transport, Duration::from_secs(5));
        (submitter, cache, rx)
    }

    fn smile(action: Action) -> ReactionRequest {
        ReactionRequest::new(SERVER, ROOM, 111, "😄", action)
    }

    #[tokio::test]
    async fn success_acks_entry() {
        let transport = Arc::new(CountingTransport {
            next: AtomicU64::new(200),
        });
        let (submitter, cache, mut rx) = submitter(transport);

        let seqno = submitter.submit(smile(Action::Add)).await.unwrap();

        assert_eq!(seqno, 200);
        assert_eq!(cache.len(), 1);
        let optimistic = rx.try_recv().expect("optimistic view emitted");
        assert_eq!(optimistic.reactions["😄"].count, 1);
    }

    #[tokio::test]
    async fn transport_failure_rolls_back() {
        let (submitter, cache, mut rx) = submitter(Arc::new(FailingTransport));

        let err = submitter.submit(smile(Action::Add)).await.unwrap_err();

        assert!(matches!(err, SubmitError::Transport(_)));
        assert!(cache.is_empty());
        let optimistic = rx.try_recv().unwrap();
        let rolled_back = rx.try_recv().unwrap();
        assert!(optimistic.reactions.contains_key("😄"));
        assert!(rolled_back.reactions.is_empty());
    }

    #[tokio::test]
    async fn failure_after_leaving_room_sends_no_rollback() {
        let cache = SharedMutationCache::new();
        let rooms = Arc::new(RoomRegistry::new(cache.clone(), 16));
        rooms.join_room(SERVER, ROOM);
        let (sink, mut rx) = ChannelSink::channel();
        let publisher = Arc::new(ReactionPublisher::new(
            cache.clone(),
            rooms.clone(),
            Arc::new(sink),
            ME.to_string(),
        ));
        let transport = Arc::new(LeaveThenFailTransport { rooms });
        let submitter =
            ReactionSubmitter::new(cache.clone(), publisher, transport, Duration::from_secs(5));

        let err = submitter.submit(smile(Action::Add)).await.unwrap_err();

        assert!(matches!(err, SubmitError::Transport(_)));
        assert!(cache.is_empty());
        let optimistic = rx.try_recv().expect("optimistic view emitted");
        assert_eq!(optimistic.reactions["😄"].count, 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_rolls_back() {
        let (submitter, cache, _rx) = submitter(Arc::new(StalledTransport));

        let err = submitter.submit(smile(Action::Add)).await.unwrap_err();

        assert!(matches!(err, SubmitError::Timeout { timeout_ms: 5000 }));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn invalid_request_never_sent() {
        let transport = Arc::new(CountingTransport {
            next: AtomicU64::new(1),
        });
        let (submitter, cache, mut rx) = submitter(transport.clone());

        let err = submitter
            .submit(ReactionRequest::new(SERVER, ROOM, 111, "", Action::Add))
            .await
            .unwrap_err();

        assert!(matches!(err, SubmitError::Rejected(_)));
        assert!(cache.is_empty());
        assert!(rx.try_recv().is_err());
        assert_eq!(transport.next.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn toggle_keeps_both_entries_until_polled() {
        let transport = Arc::new(CountingTransport {
            next: AtomicU64::new(10),
        });
        let (submitter, cache, _rx) = submitter(transport);

        submitter.submit(smile(Action::Add)).await.unwrap();
        submitter.submit(smile(Action::Remove)).await.unwrap();

        assert_eq!(cache.len(), 2);
    }
}

//! One application session's reaction state, wired together.

use std::sync::Arc;

use serde_json::Value as JsonValue;

use opengroup_core::Action;

use crate::config::{ClientConfig, ConfigError};
use crate::poller::PollHandler;
use crate::publisher::ReactionPublisher;
use crate::rooms::RoomRegistry;
use crate::shared::SharedMutationCache;
use crate::sink::ReactionSink;
use crate::submission::{ReactionRequest, ReactionSubmitter, ReactionTransport, SubmitError};

/// Owns the mutation cache for a session and exposes the entry points the
/// submission and poll collaborators call.
pub struct OpenGroupSession {
    config: ClientConfig,
    cache: SharedMutationCache,
    rooms: Arc<RoomRegistry>,
    submitter: ReactionSubmitter,
    poller: PollHandler,
}

impl OpenGroupSession {
    /// Builds a fresh session with an empty cache.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `config` does not validate.
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn ReactionTransport>,
        sink: Arc<dyn ReactionSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let cache = SharedMutationCache::new();
        let rooms = Arc::new(
            RoomRegistry::new(cache.clone(), config.deletion_window)
                .with_snapshot_capacity(config.snapshot_capacity),
        );
        let publisher = Arc::new(ReactionPublisher::new(
            cache.clone(),
            rooms.clone(),
            sink,
            config.our_pubkey.clone(),
        ));
        let submitter = ReactionSubmitter::new(
            cache.clone(),
            publisher.clone(),
            transport,
            config.submission_timeout,
        );
        let poller = PollHandler::new(rooms.clone(), publisher);

        Ok(Self {
            config,
            cache,
            rooms,
            submitter,
            poller,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn cache(&self) -> &SharedMutationCache {
        &self.cache
    }

    #[must_use]
    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    pub fn join_room(&self, server: &str, room: &str) -> bool {
        self.rooms.join_room(server, room)
    }

    /// Stops polling a room and drops every pending mutation for it.
    pub fn leave_room(&self, server: &str, room: &str) -> bool {
        self.rooms.leave_room(server, room)
    }

    /// Adds or removes our reaction on a message.
    ///
    /// # Errors
    ///
    /// See [`ReactionSubmitter::submit`].
    pub async fn react(
        &self,
        server: &str,
        room: &str,
        message_id: u64,
        emoji: &str,
        action: Action,
    ) -> Result<u64, SubmitError> {
        self.submitter
            .submit(ReactionRequest::new(server, room, message_id, emoji, action))
            .await
    }

    /// Feeds one room's poll batch. Returns the number of updates emitted.
    pub fn handle_poll(&self, server: &str, room: &str, messages: Vec<JsonValue>) -> usize {
        self.poller.handle_messages(server, room, messages)
    }
}

//! Error types returned by the mutation cache.
//!
//! None of these are fatal: callers log them and carry on, and the next poll
//! cycle repairs whatever view was affected.

use crate::mutation::EntryHandle;

/// Reason a mutation entry failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("server is empty")]
    EmptyServer,
    #[error("room is empty")]
    EmptyRoom,
    #[error("message id must be greater than zero")]
    ZeroMessageId,
    #[error("emoji is empty")]
    EmptyEmoji,
}

/// Errors from [`MutationCache`](crate::cache::MutationCache) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("invalid mutation entry: {0}")]
    Validation(#[from] ValidationError),
    #[error("no cached mutation for handle {handle}")]
    NotFound { handle: EntryHandle },
    #[error("no unacknowledged mutation for message {message_id} in {server}/{room}")]
    NoMatch {
        server: String,
        room: String,
        message_id: u64,
    },
}

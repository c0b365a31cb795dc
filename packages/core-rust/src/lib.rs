//! Open-group core — optimistic mutation cache, seqno reconciler, and SOGS message shapes.

pub mod cache;
pub mod error;
pub mod mutation;
pub mod reconcile;
pub mod snapshot;
pub mod types;

pub use cache::{MutationCache, PendingMutation};
pub use error::{CacheError, ValidationError};
pub use mutation::{check, verify, EntryHandle, MutationEntry, MutationMetadata, ReactionMetadata};
pub use reconcile::{reconcile, reconcile_reactions, reconcile_with, Overlay, ReconcileOutcome};
pub use snapshot::{MessageSnapshot, ReactionMap, ReactionSummary};
pub use types::{Action, ChangeType, RoomKey};

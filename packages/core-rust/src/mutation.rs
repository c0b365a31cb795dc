//! Optimistic mutation entries and their validity contract.
//!
//! A [`MutationEntry`] records one user-initiated change (today: adding or
//! removing an emoji reaction) that has been applied locally before the
//! community server confirmed it. The entry carries the server-assigned
//! `seqno` once the request is acknowledged; until then it is `None`.
//!
//! # Validity
//!
//! [`verify`] is the single gate for entering the cache. An entry is valid
//! when every identifying field is present: non-empty server and room, a
//! positive message id and a non-empty emoji. The `seqno` plays no part in
//! validity, both `None` and `Some(_)` are legitimate states.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::{Action, ChangeType};

/// Stable per-entry handle assigned by [`MutationCache::add`](crate::cache::MutationCache::add).
///
/// Handles grow strictly with creation order and are never reused within one
/// cache, so two structurally identical mutations can still be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryHandle(pub(crate) u64);

impl EntryHandle {
    /// Returns the raw creation ordinal.
    #[must_use]
    pub fn ordinal(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Payload of a reaction mutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionMetadata {
    /// Server-side id of the message being reacted to.
    pub message_id: u64,
    /// The emoji, as the server keys it.
    pub emoji: String,
    pub action: Action,
}

/// Type-specific payload of a mutation, tagged by [`ChangeType`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "changeType", content = "metadata", rename_all = "camelCase")]
pub enum MutationMetadata {
    Reactions(ReactionMetadata),
}

impl MutationMetadata {
    #[must_use]
    pub fn change_type(&self) -> ChangeType {
        match self {
            Self::Reactions(_) => ChangeType::Reactions,
        }
    }

    /// Id of the message this mutation targets.
    #[must_use]
    pub fn message_id(&self) -> u64 {
        match self {
            Self::Reactions(meta) => meta.message_id,
        }
    }
}

/// A pending local mutation against a room on a community server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationEntry {
    /// Room sequence number assigned by the server on acknowledgment.
    pub seqno: Option<u64>,
    /// Base URL of the community server.
    pub server: String,
    /// Room token.
    pub room: String,
    pub metadata: MutationMetadata,
}

impl MutationEntry {
    /// Builds an unacknowledged reaction mutation.
    #[must_use]
    pub fn reaction(
        server: impl Into<String>,
        room: impl Into<String>,
        message_id: u64,
        emoji: impl Into<String>,
        action: Action,
    ) -> Self {
        Self {
            seqno: None,
            server: server.into(),
            room: room.into(),
            metadata: MutationMetadata::Reactions(ReactionMetadata {
                message_id,
                emoji: emoji.into(),
                action,
            }),
        }
    }

    #[must_use]
    pub fn change_type(&self) -> ChangeType {
        self.metadata.change_type()
    }

    #[must_use]
    pub fn message_id(&self) -> u64 {
        self.metadata.message_id()
    }

    /// Returns true once the server has acknowledged the mutation.
    #[must_use]
    pub fn is_acked(&self) -> bool {
        self.seqno.is_some()
    }

    /// Returns true if `self` targets the given room and message.
    #[must_use]
    pub fn targets(&self, server: &str, room: &str, message_id: u64) -> bool {
        self.server == server && self.room == room && self.message_id() == message_id
    }

    /// Structural equality ignoring `seqno`.
    #[must_use]
    pub fn same_mutation(&self, other: &MutationEntry) -> bool {
        self.server == other.server && self.room == other.room && self.metadata == other.metadata
    }
}

/// Checks an entry against the validity contract, naming the first failing field.
///
/// # Errors
///
/// Returns the [`ValidationError`] for the first missing or out-of-range field.
pub fn check(entry: &MutationEntry) -> Result<(), ValidationError> {
    if entry.server.is_empty() {
        return Err(ValidationError::EmptyServer);
    }
    if entry.room.is_empty() {
        return Err(ValidationError::EmptyRoom);
    }
    match &entry.metadata {
        MutationMetadata::Reactions(meta) => {
            if meta.message_id == 0 {
                return Err(ValidationError::ZeroMessageId);
            }
            if meta.emoji.is_empty() {
                return Err(ValidationError::EmptyEmoji);
            }
        }
    }
    Ok(())
}

/// Returns true iff every identifying field of the entry is present.
///
/// Pure and total: depends on nothing but `entry`.
#[must_use]
pub fn verify(entry: &MutationEntry) -> bool {
    check(entry).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVER: &str = "https://chat.example.org";
    const ROOM: &str = "main";

    fn valid() -> MutationEntry {
        MutationEntry::reaction(SERVER, ROOM, 111, "😄", Action::Add)
    }

    #[test]
    fn valid_entry_passes() {
        assert!(verify(&valid()));
        assert_eq!(check(&valid()), Ok(()));
    }

    #[test]
    fn seqno_does_not_affect_validity() {
        let mut entry = valid();
        entry.seqno = Some(0);
        assert!(verify(&entry));
        entry.seqno = Some(u64::MAX);
        assert!(verify(&entry));
    }

    #[test]
    fn empty_server_rejected() {
        let mut entry = valid();
        entry.server.clear();
        assert_eq!(check(&entry), Err(ValidationError::EmptyServer));
        assert!(!verify(&entry));
    }

    #[test]
    fn empty_room_rejected() {
        let mut entry = valid();
        entry.room.clear();
        assert_eq!(check(&entry), Err(ValidationError::EmptyRoom));
    }

    #[test]
    fn zero_message_id_rejected() {
        let entry = MutationEntry::reaction(SERVER, ROOM, 0, "😄", Action::Remove);
        assert_eq!(check(&entry), Err(ValidationError::ZeroMessageId));
    }

    #[test]
    fn empty_emoji_rejected() {
        let entry = MutationEntry::reaction(SERVER, ROOM, 111, "", Action::Add);
        assert_eq!(check(&entry), Err(ValidationError::EmptyEmoji));
    }

    #[test]
    fn reaction_metadata_accessors() {
        let entry = valid();
        assert_eq!(entry.change_type(), ChangeType::Reactions);
        assert_eq!(entry.message_id(), 111);
        assert!(!entry.is_acked());
        assert!(entry.targets(SERVER, ROOM, 111));
        assert!(!entry.targets(SERVER, ROOM, 112));
    }

    #[test]
    fn same_mutation_ignores_seqno() {
        let a = valid();
        let mut b = valid();
        b.seqno = Some(42);
        assert!(a.same_mutation(&b));

        let c = MutationEntry::reaction(SERVER, ROOM, 111, "😄", Action::Remove);
        assert!(!a.same_mutation(&c));
    }

    #[test]
    fn entry_serializes_with_change_type_tag() {
        let json = serde_json::to_value(valid()).expect("serialize");
        assert_eq!(json["metadata"]["changeType"], "reactions");
        assert_eq!(json["metadata"]["metadata"]["messageId"], 111);
        assert_eq!(json["metadata"]["metadata"]["action"], "add");
        assert!(json["seqno"].is_null());
    }
}

//! Canonical message snapshots as delivered by a SOGS room poll.
//!
//! These mirror the message objects returned by the community server's
//! `/room/{token}/messages` endpoints. Only the fields the reconciler and
//! poll glue care about are modelled; everything else is ignored on
//! deserialization. Every modelled field is optional on the wire so that a
//! partial object still decodes to "no reactions" instead of failing.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Deserializer, Serialize};

/// Reaction state for one emoji on one message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactionSummary {
    /// Total number of users who reacted with this emoji.
    pub count: u64,
    /// Display order of the emoji on the message (first reaction first).
    pub index: u64,
    /// Whether the requesting user is among the reactors.
    pub you: bool,
    /// Reacting users. The server may truncate this list, so it can be
    /// shorter than `count`.
    pub reactors: BTreeSet<String>,
}

/// Emoji -> reaction state for one message.
pub type ReactionMap = BTreeMap<String, ReactionSummary>;

/// Deserializes a field that is both optional (can be absent) and nullable.
///
/// - Absent field -> `None`
/// - Present field with null -> `Some(None)`
/// - Present field with value -> `Some(Some(value))`
#[allow(clippy::option_option)]
fn deserialize_double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Ok(Some(Option::deserialize(deserializer)?))
}

/// A message as seen by one room poll.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageSnapshot {
    /// Server-side message id.
    #[serde(default)]
    pub id: u64,
    /// Room seqno at the time this snapshot was taken.
    #[serde(default)]
    pub seqno: u64,
    /// Reactions on the message. `None` when the server sent no reaction
    /// information for it in this poll.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reactions: Option<ReactionMap>,
    /// Message body. An explicit `null` means the message was deleted.
    #[allow(clippy::option_option)]
    #[serde(
        default,
        deserialize_with = "deserialize_double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
}

impl MessageSnapshot {
    /// Builds a reactions-only snapshot.
    #[must_use]
    pub fn with_reactions(id: u64, seqno: u64, reactions: ReactionMap) -> Self {
        Self {
            id,
            seqno,
            reactions: Some(reactions),
            ..Self::default()
        }
    }

    /// Returns true if the server reports this message as deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted == Some(true) || matches!(self.data, Some(None))
    }

    /// Reactions carried by the snapshot, or an empty map if none were sent.
    #[must_use]
    pub fn reactions_or_empty(&self) -> ReactionMap {
        self.reactions.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_full_sogs_message() {
        let raw = json!({
            "id": 111,
            "seqno": 200,
            "session_id": "15abc",
            "posted": 1_700_000_000.25,
            "data": "aGVsbG8=",
            "reactions": {
                "😄": { "index": 0, "count": 3, "you": true, "reactors": ["05aa", "05bb"] }
            }
        });
        let snap: MessageSnapshot = serde_json::from_value(raw).expect("decode");
        assert_eq!(snap.id, 111);
        assert_eq!(snap.seqno, 200);
        assert_eq!(snap.data, Some(Some("aGVsbG8=".to_string())));
        assert!(!snap.is_deleted());

        let reactions = snap.reactions.expect("reactions present");
        let smile = &reactions["😄"];
        assert_eq!(smile.count, 3);
        assert!(smile.you);
        assert_eq!(smile.reactors.len(), 2);
    }

    #[test]
    fn decodes_reaction_only_update() {
        let raw = json!({ "id": 7, "seqno": 9, "reactions": {} });
        let snap: MessageSnapshot = serde_json::from_value(raw).expect("decode");
        assert_eq!(snap.reactions, Some(ReactionMap::new()));
        assert_eq!(snap.data, None);
        assert!(!snap.is_deleted());
    }

    #[test]
    fn missing_reaction_fields_default() {
        let raw = json!({ "id": 7, "seqno": 9, "reactions": { "👍": {} } });
        let snap: MessageSnapshot = serde_json::from_value(raw).expect("decode");
        let thumbs = &snap.reactions_or_empty()["👍"];
        assert_eq!(thumbs, &ReactionSummary::default());
    }

    #[test]
    fn absent_reactions_is_none() {
        let raw = json!({ "id": 7, "seqno": 9 });
        let snap: MessageSnapshot = serde_json::from_value(raw).expect("decode");
        assert!(snap.reactions.is_none());
        assert!(snap.reactions_or_empty().is_empty());
    }

    #[test]
    fn null_data_marks_deleted() {
        let raw = json!({ "id": 7, "seqno": 9, "data": null, "reactions": {} });
        let snap: MessageSnapshot = serde_json::from_value(raw).expect("decode");
        assert_eq!(snap.data, Some(None));
        assert!(snap.is_deleted());
    }

    #[test]
    fn deleted_flag_marks_deleted() {
        let raw = json!({ "id": 7, "seqno": 9, "deleted": true });
        let snap: MessageSnapshot = serde_json::from_value(raw).expect("decode");
        assert!(snap.is_deleted());
    }
}

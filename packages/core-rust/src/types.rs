use std::fmt;

use serde::{Deserialize, Serialize};

/// Category of mutation tracked by the cache.
///
/// Closed set. Adding a variant forces every merge site to handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeType {
    /// Emoji reactions on a room message.
    Reactions,
}

/// Direction of a reaction mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// React with the emoji.
    Add,
    /// Withdraw our reaction with the emoji.
    Remove,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => f.write_str("add"),
            Self::Remove => f.write_str("remove"),
        }
    }
}

/// A room on a specific community server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomKey {
    /// Base URL of the community server.
    pub server: String,
    /// Room token on that server.
    pub room: String,
}

impl RoomKey {
    #[must_use]
    pub fn new(server: impl Into<String>, room: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            room: room.into(),
        }
    }

    /// Returns true if this key names the given server/room pair.
    #[must_use]
    pub fn matches(&self, server: &str, room: &str) -> bool {
        self.server == server && self.room == room
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.server, self.room)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_serializes_lowercase() {
        let json = serde_json::to_string(&Action::Remove).expect("serialize");
        assert_eq!(json, "\"remove\"");
    }

    #[test]
    fn change_type_serializes_camel_case() {
        let json = serde_json::to_string(&ChangeType::Reactions).expect("serialize");
        assert_eq!(json, "\"reactions\"");
    }

    #[test]
    fn room_key_display_and_match() {
        let key = RoomKey::new("https://open.example.org", "lokinet");
        assert_eq!(key.to_string(), "https://open.example.org/lokinet");
        assert!(key.matches("https://open.example.org", "lokinet"));
        assert!(!key.matches("https://open.example.org", "session"));
    }
}

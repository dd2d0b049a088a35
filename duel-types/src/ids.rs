//! Identity types for duelsync rooms and players.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a game room, as assigned by the room service.
///
/// One pub/sub topic exists per room; both participants share it.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Room id used for games against the local bot (never published).
    pub const LOCAL_BOT: &'static str = "local-bot";

    /// Wrap a room id handed out by the room service.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create a new random RoomId (UUID v4, the room service's format).
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// The room id for a local bot game.
    pub fn local_bot() -> Self {
        Self(Self::LOCAL_BOT.to_string())
    }

    /// Whether this is the local bot room.
    pub fn is_local_bot(&self) -> bool {
        self.0 == Self::LOCAL_BOT
    }

    /// Topic carrying this room's traffic, e.g. `/topic/room/{id}`.
    pub fn topic(&self, prefix: &str) -> String {
        format!("{prefix}{}", self.0)
    }

    /// The id as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RoomId({})", self.0)
    }
}

/// Identifier the room service assigned to this participant.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Wrap a player id handed out by the room service.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown: String = self.0.chars().take(8).collect();
        write!(f, "PlayerId({shown})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_topic_uses_prefix() {
        let room = RoomId::new("abc-123");
        assert_eq!(room.topic("/topic/room/"), "/topic/room/abc-123");
    }

    #[test]
    fn random_rooms_differ() {
        assert_ne!(RoomId::random(), RoomId::random());
    }

    #[test]
    fn local_bot_room() {
        assert!(RoomId::local_bot().is_local_bot());
        assert!(!RoomId::random().is_local_bot());
    }

    #[test]
    fn room_id_serializes_transparently() {
        let json = serde_json::to_string(&RoomId::new("r1")).unwrap();
        assert_eq!(json, "\"r1\"");
    }

    #[test]
    fn player_id_debug_is_truncated() {
        let id = PlayerId::new("0123456789abcdef");
        assert_eq!(format!("{:?}", id), "PlayerId(01234567)");
    }
}

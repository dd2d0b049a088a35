//! The room message exchanged over the pub/sub channel.
//!
//! Every message on a room topic is one JSON object with optional fields:
//!
//! ```text
//! { "roomId"?, "from"?, "to"?, "promotion"?, "fen"?, "whiteTime"?, "blackTime"? }
//! ```
//!
//! A real move carries `from`/`to` and usually the FEN snapshot after the
//! move. Three reserved values in `fen` turn the message into a protocol
//! signal instead: [`PLAYER_JOINED`], [`RESIGN`] and [`DRAW`]. For the last
//! two, `from` names the color that resigned or offered the draw.

use serde::{Deserialize, Serialize};

use crate::{Color, Move, PieceKind, RoomId, Square, WireError};

/// Sentinel sent by the room service when the second player joins.
pub const PLAYER_JOINED: &str = "PLAYER_JOINED";
/// Sentinel sent by a player who resigns.
pub const RESIGN: &str = "RESIGN";
/// Sentinel sent by a player who ends the game as a draw.
pub const DRAW: &str = "DRAW";

/// Wire payload for everything published on a room topic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveMessage {
    /// Room the message belongs to; the relay routes on it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    /// Origin square, or the acting color for resign/draw signals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Destination square.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Promotion piece letter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<String>,
    /// Position snapshot after the move, or a sentinel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fen: Option<String>,
    /// White's remaining seconds as seen by the sender.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub white_time: Option<i64>,
    /// Black's remaining seconds as seen by the sender.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub black_time: Option<i64>,
}

impl MoveMessage {
    /// A move announcement with the snapshot after the move.
    pub fn for_move(room: &RoomId, mv: &Move, fen: impl Into<String>) -> Self {
        Self {
            room_id: Some(room.clone()),
            from: Some(mv.from.to_string()),
            to: Some(mv.to.to_string()),
            promotion: mv.promotion.map(|kind| kind.letter().to_string()),
            fen: Some(fen.into()),
            ..Self::default()
        }
    }

    /// Attach the sender's clock readings.
    pub fn with_clocks(mut self, white: u32, black: u32) -> Self {
        self.white_time = Some(i64::from(white));
        self.black_time = Some(i64::from(black));
        self
    }

    /// The "second player joined" signal.
    pub fn player_joined(room: &RoomId) -> Self {
        Self {
            room_id: Some(room.clone()),
            fen: Some(PLAYER_JOINED.to_string()),
            ..Self::default()
        }
    }

    /// A resignation by `by`.
    pub fn resign(room: &RoomId, by: Color) -> Self {
        Self {
            room_id: Some(room.clone()),
            from: Some(by.to_string()),
            fen: Some(RESIGN.to_string()),
            ..Self::default()
        }
    }

    /// A draw declared by `by`.
    pub fn draw(room: &RoomId, by: Color) -> Self {
        Self {
            room_id: Some(room.clone()),
            from: Some(by.to_string()),
            fen: Some(DRAW.to_string()),
            ..Self::default()
        }
    }

    /// Serialize to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        serde_json::to_vec(self).map_err(WireError::Serialization)
    }

    /// Deserialize from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        serde_json::from_slice(bytes).map_err(WireError::Deserialization)
    }

    /// Interpret the message.
    ///
    /// Sentinels win over move fields. Anything else is a move; if its
    /// squares cannot be decoded the move is `None` but the snapshot and
    /// clocks are still carried so the receiver can resynchronize.
    pub fn classify(&self) -> Inbound {
        let actor = || self.from.as_deref().and_then(|s| s.parse::<Color>().ok());
        match self.fen.as_deref() {
            Some(PLAYER_JOINED) => Inbound::PlayerJoined,
            Some(RESIGN) => Inbound::Resign { by: actor() },
            Some(DRAW) => Inbound::Draw { by: actor() },
            snapshot => Inbound::Move(RemoteMove {
                mv: self.decode_move(),
                snapshot: snapshot.filter(|s| !s.is_empty()).map(str::to_string),
                clocks: ClockReport {
                    white: seconds(self.white_time),
                    black: seconds(self.black_time),
                },
            }),
        }
    }

    fn decode_move(&self) -> Option<Move> {
        let from: Square = self.from.as_deref()?.parse().ok()?;
        let to: Square = self.to.as_deref()?.parse().ok()?;
        let promotion = self
            .promotion
            .as_deref()
            .and_then(|p| p.parse::<PieceKind>().ok())
            .filter(|kind| kind.is_promotion_choice());
        Some(Move {
            from,
            to,
            promotion,
        })
    }
}

/// The relay fills unset numeric fields with zero, so only positive values
/// count as a report.
pub(crate) fn seconds(value: Option<i64>) -> Option<u32> {
    value
        .filter(|v| *v > 0)
        .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
}

/// Clock values carried by a message; absent values leave the clock alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockReport {
    /// White's remaining seconds.
    pub white: Option<u32>,
    /// Black's remaining seconds.
    pub black: Option<u32>,
}

impl ClockReport {
    /// Whether the report carries no values.
    pub fn is_empty(&self) -> bool {
        self.white.is_none() && self.black.is_none()
    }
}

/// A move reported by the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMove {
    /// The decoded move, if the squares were readable.
    pub mv: Option<Move>,
    /// Position snapshot after the move, if the sender attached one.
    pub snapshot: Option<String>,
    /// Clock values reported alongside the move.
    pub clocks: ClockReport,
}

/// What an inbound room message means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// The second player joined the room.
    PlayerJoined,
    /// A player resigned.
    Resign {
        /// Color that resigned, if stated.
        by: Option<Color>,
    },
    /// A player ended the game as a draw.
    Draw {
        /// Color that declared the draw, if stated.
        by: Option<Color>,
    },
    /// A move (possibly undecodable) with optional snapshot and clocks.
    Move(RemoteMove),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> RoomId {
        RoomId::new("room-1")
    }

    #[test]
    fn move_message_uses_camel_case() {
        let mv: Move = "e2e4".parse().unwrap();
        let msg = MoveMessage::for_move(&room(), &mv, "fen-after").with_clocks(590, 600);
        let json: serde_json::Value = serde_json::from_slice(&msg.to_bytes().unwrap()).unwrap();

        assert_eq!(json["roomId"], "room-1");
        assert_eq!(json["from"], "e2");
        assert_eq!(json["to"], "e4");
        assert_eq!(json["whiteTime"], 590);
        assert_eq!(json["blackTime"], 600);
        assert!(json.get("promotion").is_none());
    }

    #[test]
    fn decodes_relay_payload_with_nulls_and_zeros() {
        // Shape produced by the relay for a move sent without clocks.
        let raw = br#"{"roomId":"room-1","from":"e7","to":"e5","promotion":null,
            "fen":"rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2",
            "whiteTime":0,"blackTime":0}"#;
        let msg = MoveMessage::from_bytes(raw).unwrap();

        match msg.classify() {
            Inbound::Move(remote) => {
                assert_eq!(remote.mv, Some("e7e5".parse().unwrap()));
                assert!(remote.snapshot.is_some());
                assert!(remote.clocks.is_empty());
            }
            other => panic!("expected move, got {:?}", other),
        }
    }

    #[test]
    fn classifies_sentinels() {
        assert_eq!(
            MoveMessage::player_joined(&room()).classify(),
            Inbound::PlayerJoined
        );
        assert_eq!(
            MoveMessage::resign(&room(), Color::White).classify(),
            Inbound::Resign {
                by: Some(Color::White)
            }
        );
        assert_eq!(
            MoveMessage::draw(&room(), Color::Black).classify(),
            Inbound::Draw {
                by: Some(Color::Black)
            }
        );
    }

    #[test]
    fn sentinel_ignores_move_fields() {
        let msg = MoveMessage {
            from: Some("white".into()),
            to: Some("e4".into()),
            fen: Some(RESIGN.into()),
            white_time: Some(300),
            ..MoveMessage::default()
        };
        assert_eq!(
            msg.classify(),
            Inbound::Resign {
                by: Some(Color::White)
            }
        );
    }

    #[test]
    fn clock_values_are_reported() {
        let msg = MoveMessage {
            from: Some("e2".into()),
            to: Some("e4".into()),
            white_time: Some(550),
            ..MoveMessage::default()
        };
        match msg.classify() {
            Inbound::Move(remote) => {
                assert_eq!(remote.clocks.white, Some(550));
                assert_eq!(remote.clocks.black, None);
                assert_eq!(remote.snapshot, None);
            }
            other => panic!("expected move, got {:?}", other),
        }
    }

    #[test]
    fn unreadable_squares_keep_snapshot() {
        let msg = MoveMessage {
            from: Some("zz".into()),
            to: Some("e4".into()),
            fen: Some("8/8/8/8/8/8/8/K6k w - - 0 1".into()),
            ..MoveMessage::default()
        };
        match msg.classify() {
            Inbound::Move(remote) => {
                assert_eq!(remote.mv, None);
                assert!(remote.snapshot.is_some());
            }
            other => panic!("expected move, got {:?}", other),
        }
    }

    #[test]
    fn bad_promotion_letter_is_dropped() {
        let msg = MoveMessage {
            from: Some("a7".into()),
            to: Some("a8".into()),
            promotion: Some("".into()),
            ..MoveMessage::default()
        };
        match msg.classify() {
            Inbound::Move(remote) => assert_eq!(remote.mv.unwrap().promotion, None),
            other => panic!("expected move, got {:?}", other),
        }
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            MoveMessage::from_bytes(b"{not json"),
            Err(WireError::Deserialization(_))
        ));
    }
}

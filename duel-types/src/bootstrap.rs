//! Session bootstrap payload returned by the room service.
//!
//! Creating or joining a room yields one of these. It is consumed once when
//! the session is built and is not part of the ongoing room traffic.

use serde::{Deserialize, Serialize};

use crate::messages::seconds;
use crate::{ClockReport, Color, PlayerId, RoomId, WireError};

/// Response of the create-room / join-room endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPayload {
    /// Room that was created or joined.
    pub room_id: RoomId,
    /// Seat assigned by the room service: `white`, `black` or `spectator`.
    pub color: String,
    /// Participant id assigned by the room service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<PlayerId>,
    /// Current position of the room, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fen: Option<String>,
    /// White's remaining seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub white_time: Option<i64>,
    /// Black's remaining seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub black_time: Option<i64>,
}

impl JoinPayload {
    /// Deserialize from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        serde_json::from_slice(bytes).map_err(WireError::Deserialization)
    }

    /// The color this client plays.
    ///
    /// Fails for a spectator seat.
    pub fn seat(&self) -> Result<Color, WireError> {
        self.color
            .parse()
            .map_err(|_| WireError::UnsupportedSeat(self.color.clone()))
    }

    /// The room position, if it is a real snapshot.
    ///
    /// The lobby uses `"start"` as a placeholder for the initial
    /// position, so that and the empty string mean "no snapshot".
    pub fn snapshot(&self) -> Option<&str> {
        self.fen
            .as_deref()
            .filter(|fen| !fen.is_empty() && *fen != "start")
    }

    /// Clock values per side. Missing or non-positive values are absent.
    pub fn clocks(&self) -> ClockReport {
        ClockReport {
            white: seconds(self.white_time),
            black: seconds(self.black_time),
        }
    }
}

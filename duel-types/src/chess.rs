//! Chess value types shared by the wire format and the session core.
//!
//! These are plain values with the same text forms the relay and the
//! other room clients use: lowercase color names, algebraic squares and
//! single-letter piece kinds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::WireError;

/// Side of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    /// White pieces.
    White,
    /// Black pieces.
    Black,
}

impl Color {
    /// Get the opposite color.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }

    /// Rank (0-based) on which this side's pawns promote.
    #[must_use]
    pub const fn promotion_rank(self) -> u8 {
        match self {
            Self::White => 7,
            Self::Black => 0,
        }
    }

    /// Capitalized name, as shown in status lines.
    pub fn title(self) -> &'static str {
        match self {
            Self::White => "White",
            Self::Black => "Black",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::White => write!(f, "white"),
            Self::Black => write!(f, "black"),
        }
    }
}

impl FromStr for Color {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // One-letter forms are accepted as well.
        match s {
            "white" | "w" => Ok(Self::White),
            "black" | "b" => Ok(Self::Black),
            other => Err(WireError::InvalidColor(other.to_string())),
        }
    }
}

/// Kind of chess piece.
///
/// Serialized as the single lowercase letter used on the wire (`"q"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PieceKind {
    /// Pawn.
    #[serde(rename = "p")]
    Pawn,
    /// Knight.
    #[serde(rename = "n")]
    Knight,
    /// Bishop.
    #[serde(rename = "b")]
    Bishop,
    /// Rook.
    #[serde(rename = "r")]
    Rook,
    /// Queen.
    #[serde(rename = "q")]
    Queen,
    /// King.
    #[serde(rename = "k")]
    King,
}

impl PieceKind {
    /// The pieces a pawn may promote to, in dialog order.
    pub const PROMOTIONS: [PieceKind; 4] = [Self::Queen, Self::Rook, Self::Bishop, Self::Knight];

    /// Wire letter for this piece kind.
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::Pawn => 'p',
            Self::Knight => 'n',
            Self::Bishop => 'b',
            Self::Rook => 'r',
            Self::Queen => 'q',
            Self::King => 'k',
        }
    }

    /// Whether a pawn may promote to this kind.
    #[must_use]
    pub const fn is_promotion_choice(self) -> bool {
        matches!(self, Self::Queen | Self::Rook | Self::Bishop | Self::Knight)
    }
}

impl fmt::Display for PieceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pawn => "pawn",
            Self::Knight => "knight",
            Self::Bishop => "bishop",
            Self::Rook => "rook",
            Self::Queen => "queen",
            Self::King => "king",
        };
        f.write_str(name)
    }
}

impl FromStr for PieceKind {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "p" => Ok(Self::Pawn),
            "n" => Ok(Self::Knight),
            "b" => Ok(Self::Bishop),
            "r" => Ok(Self::Rook),
            "q" => Ok(Self::Queen),
            "k" => Ok(Self::King),
            _ => Err(WireError::InvalidPiece(s.to_string())),
        }
    }
}

/// A piece with its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Piece {
    /// Owner of the piece.
    pub color: Color,
    /// What kind of piece it is.
    pub kind: PieceKind,
}

/// A square on the board (a1-h8).
///
/// Serialized as its algebraic name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Square(u8);

impl Square {
    /// Create a square from file (0-7) and rank (0-7).
    #[must_use]
    pub const fn new(file: u8, rank: u8) -> Option<Self> {
        if file < 8 && rank < 8 {
            Some(Self(rank * 8 + file))
        } else {
            None
        }
    }

    /// Create a square from its 0-63 index (a1 = 0, h8 = 63).
    #[must_use]
    pub const fn from_index(index: u8) -> Option<Self> {
        if index < 64 {
            Some(Self(index))
        } else {
            None
        }
    }

    /// Index 0-63, a1 = 0.
    #[must_use]
    pub const fn index(self) -> u8 {
        self.0
    }

    /// Get the file (0-7, a-h).
    #[must_use]
    pub const fn file(self) -> u8 {
        self.0 % 8
    }

    /// Get the rank (0-7, 1-8).
    #[must_use]
    pub const fn rank(self) -> u8 {
        self.0 / 8
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let file = (b'a' + self.file()) as char;
        let rank = (b'1' + self.rank()) as char;
        write!(f, "{file}{rank}")
    }
}

impl fmt::Debug for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Square({self})")
    }
}

impl FromStr for Square {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return Err(WireError::InvalidSquare(s.to_string()));
        }
        let file = bytes[0].to_ascii_lowercase().wrapping_sub(b'a');
        let rank = bytes[1].wrapping_sub(b'1');
        Self::new(file, rank).ok_or_else(|| WireError::InvalidSquare(s.to_string()))
    }
}

impl Serialize for Square {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Square {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// A move request: origin, destination and optional promotion piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    /// Square the piece moves from.
    pub from: Square,
    /// Square the piece moves to.
    pub to: Square,
    /// Piece a pawn promotes to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<PieceKind>,
}

impl Move {
    /// Create a move without promotion.
    #[must_use]
    pub const fn new(from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            promotion: None,
        }
    }

    /// Same move with the given promotion piece.
    #[must_use]
    pub const fn promoting(self, kind: PieceKind) -> Self {
        Self {
            promotion: Some(kind),
            ..self
        }
    }

    /// Whether this move goes between the same two squares as `other`.
    #[must_use]
    pub fn same_squares(&self, from: Square, to: Square) -> bool {
        self.from == from && self.to == to
    }

    /// UCI text form (`e2e4`, `a7a8q`).
    pub fn uci(&self) -> String {
        match self.promotion {
            Some(kind) => format!("{}{}{}", self.from, self.to, kind.letter()),
            None => format!("{}{}", self.from, self.to),
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uci())
    }
}

impl FromStr for Move {
    type Err = WireError;

    /// Parse UCI text (`e2e4`, `e7e8q`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.is_ascii() || !(s.len() == 4 || s.len() == 5) {
            return Err(WireError::InvalidSquare(s.to_string()));
        }
        let from: Square = s[0..2].parse()?;
        let to: Square = s[2..4].parse()?;
        let promotion = match s.get(4..5) {
            Some(letter) => {
                let kind: PieceKind = letter.parse()?;
                if !kind.is_promotion_choice() {
                    return Err(WireError::InvalidPromotion(kind));
                }
                Some(kind)
            }
            None => None,
        };
        Ok(Self {
            from,
            to,
            promotion,
        })
    }
}

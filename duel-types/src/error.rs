//! Error types for duelsync wire handling.

use thiserror::Error;

/// Errors that can occur while encoding, decoding or parsing wire values.
#[derive(Debug, Error)]
pub enum WireError {
    /// JSON serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// JSON deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// Square text is not in a1..h8
    #[error("invalid square: {0:?}")]
    InvalidSquare(String),

    /// Piece letter is not one of p, n, b, r, q, k
    #[error("invalid piece: {0:?}")]
    InvalidPiece(String),

    /// Piece is not a legal promotion choice
    #[error("cannot promote to {0}")]
    InvalidPromotion(crate::PieceKind),

    /// Color text is not white or black
    #[error("invalid color: {0:?}")]
    InvalidColor(String),

    /// Bootstrap assigned a role this client cannot play
    #[error("unsupported seat: {0}")]
    UnsupportedSeat(String),
}

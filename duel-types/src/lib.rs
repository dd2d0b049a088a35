//! # duel-types
//!
//! Wire format and value types for duelsync game sessions.
//!
//! This crate provides the foundational types used across all duelsync crates:
//! - [`Color`], [`Square`], [`PieceKind`], [`Move`] - Chess values in wire form
//! - [`RoomId`], [`PlayerId`] - Identity of rooms and participants
//! - [`MoveMessage`], [`Inbound`] - The room message and its interpretation
//! - [`JoinPayload`] - Session bootstrap from the room service
//! - [`WireError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod bootstrap;
mod chess;
mod error;
mod ids;
mod messages;

pub use bootstrap::JoinPayload;
pub use chess::{Color, Move, Piece, PieceKind, Square};
pub use error::WireError;
pub use ids::{PlayerId, RoomId};
pub use messages::{ClockReport, Inbound, MoveMessage, RemoteMove, DRAW, PLAYER_JOINED, RESIGN};

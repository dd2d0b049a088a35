//! Append-only move history for a session.
//!
//! Insertion order is ply order. The history is used both for display and
//! as the reconciliation anchor: the last record is what an inbound move is
//! compared against to recognise the channel echoing our own move back.

use std::time::{SystemTime, UNIX_EPOCH};

use duel_types::{Color, Move, PieceKind, Square};

use crate::oracle::{AppliedMove, OracleError, RuleOracle};

/// One committed ply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    /// Origin square.
    pub from: Square,
    /// Destination square.
    pub to: Square,
    /// Promotion piece, if the move promoted.
    pub promotion: Option<PieceKind>,
    /// Standard algebraic notation.
    pub san: String,
    /// Side that moved.
    pub mover: Color,
    /// Wall-clock time of commit, milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

impl MoveRecord {
    /// Build a record for a move the oracle just accepted.
    pub fn from_applied(applied: AppliedMove) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        Self {
            from: applied.mv.from,
            to: applied.mv.to,
            promotion: applied.mv.promotion,
            san: applied.san,
            mover: applied.mover,
            timestamp_ms,
        }
    }

    /// The move this record describes.
    pub fn as_move(&self) -> Move {
        Move {
            from: self.from,
            to: self.to,
            promotion: self.promotion,
        }
    }
}

/// Ordered, append-only sequence of committed moves.
#[derive(Debug, Clone)]
pub struct MoveHistory {
    /// Snapshot the first record was played from.
    origin: String,
    records: Vec<MoveRecord>,
}

impl MoveHistory {
    /// Start an empty history at the given position snapshot.
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            records: Vec::new(),
        }
    }

    /// Append a committed move.
    pub fn push(&mut self, record: MoveRecord) {
        self.records.push(record);
    }

    /// The most recent record.
    pub fn last(&self) -> Option<&MoveRecord> {
        self.records.last()
    }

    /// Number of committed moves.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no move has been committed.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in ply order.
    pub fn iter(&self) -> impl Iterator<Item = &MoveRecord> {
        self.records.iter()
    }

    /// Snapshot the history starts from.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Whether the last move went between these squares.
    pub fn last_matches(&self, from: Square, to: Square) -> bool {
        self.last()
            .map(|r| r.as_move().same_squares(from, to))
            .unwrap_or(false)
    }

    /// Replay every record on a fresh oracle and return the resulting snapshot.
    pub fn replay<O: RuleOracle + Default>(&self) -> Result<String, OracleError> {
        let mut oracle = O::default();
        oracle.load(&self.origin)?;
        for record in &self.records {
            oracle.apply(&record.as_move())?;
        }
        Ok(oracle.serialize())
    }
}

//! Rule oracle: the chess rules the session consults but does not implement.
//!
//! The session treats the rules as an opaque oracle behind [`RuleOracle`]:
//! it asks whose turn it is, which moves are legal, applies moves, and asks
//! whether the game has reached a terminal condition. [`ChessOracle`] is the
//! standard implementation, backed by shakmaty.
//!
//! One oracle instance is owned by exactly one session and never shared.

use std::collections::HashMap;

use shakmaty::{
    fen::Fen, san::San, uci::UciMove as ShakmatyUciMove, CastlingMode, Chess, EnPassantMode,
    Position,
};
use thiserror::Error;

use duel_types::{Color, Move, Piece, PieceKind, Square};

/// Errors reported by a rule oracle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    /// Snapshot text could not be loaded.
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// Move is not legal in the current position.
    #[error("illegal move: {0}")]
    IllegalMove(String),
}

/// Why a position is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawKind {
    /// Side to move has no legal move and is not in check.
    Stalemate,
    /// Neither side can possibly mate.
    InsufficientMaterial,
    /// 100 half-moves without capture or pawn move.
    FiftyMoves,
    /// Same position occurred three times.
    Repetition,
}

/// Result of a move the oracle accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMove {
    /// The move as played, promotion piece included.
    pub mv: Move,
    /// Standard algebraic notation, computed before the move.
    pub san: String,
    /// Side that made the move.
    pub mover: Color,
}

/// The chess rules, as consumed by a session.
pub trait RuleOracle {
    /// Side to move.
    fn current_turn(&self) -> Color;

    /// Legal moves for the side to move, optionally only those from `from`.
    ///
    /// Promotions are listed once per promotion piece.
    fn legal_moves(&self, from: Option<Square>) -> Vec<Move>;

    /// Validate and apply a move.
    fn apply(&mut self, mv: &Move) -> Result<AppliedMove, OracleError>;

    /// Whether the side to move is in check.
    fn is_check(&self) -> bool;

    /// Whether the side to move is checkmated.
    fn is_checkmate(&self) -> bool;

    /// Draw condition holding in the current position, if any.
    fn draw_condition(&self) -> Option<DrawKind>;

    /// Whether the position is drawn.
    fn is_draw(&self) -> bool {
        self.draw_condition().is_some()
    }

    /// Whether the game is over for any reason.
    fn is_game_over(&self) -> bool {
        self.is_checkmate() || self.is_draw()
    }

    /// Piece standing on `square`.
    fn piece_at(&self, square: Square) -> Option<Piece>;

    /// Full-state snapshot (FEN).
    fn serialize(&self) -> String;

    /// Replace the whole position with a snapshot.
    fn load(&mut self, snapshot: &str) -> Result<(), OracleError>;

    /// Square of `color`'s king.
    fn king_square(&self, color: Color) -> Option<Square> {
        (0..64).filter_map(Square::from_index).find(|sq| {
            self.piece_at(*sq)
                == Some(Piece {
                    color,
                    kind: PieceKind::King,
                })
        })
    }
}

/// Standard chess rules backed by shakmaty.
///
/// Tracks position repetitions itself, since a shakmaty position carries no
/// history.
#[derive(Debug, Clone)]
pub struct ChessOracle {
    position: Chess,
    seen: HashMap<String, u32>,
}

impl ChessOracle {
    /// The standard starting position.
    #[must_use]
    pub fn new() -> Self {
        Self::with_position(Chess::default())
    }

    /// Create an oracle from a FEN string.
    pub fn from_fen(fen: &str) -> Result<Self, OracleError> {
        Ok(Self::with_position(parse_fen(fen)?))
    }

    fn with_position(position: Chess) -> Self {
        let mut oracle = Self {
            position,
            seen: HashMap::new(),
        };
        oracle.remember_position();
        oracle
    }

    /// Half-move clock (for the fifty-move rule).
    #[must_use]
    pub fn halfmove_clock(&self) -> u32 {
        self.position.halfmoves()
    }

    /// Full-move number.
    #[must_use]
    pub fn fullmove_number(&self) -> u32 {
        self.position.fullmoves().get()
    }

    fn remember_position(&mut self) {
        let key = repetition_key(&self.serialize());
        *self.seen.entry(key).or_insert(0) += 1;
    }

    fn repetitions(&self) -> u32 {
        let key = repetition_key(&self.serialize());
        self.seen.get(&key).copied().unwrap_or(0)
    }

    fn parse_move(&self, mv: &Move) -> Result<shakmaty::Move, OracleError> {
        let uci: ShakmatyUciMove = mv
            .uci()
            .parse()
            .map_err(|_| OracleError::IllegalMove(mv.uci()))?;
        uci.to_move(&self.position)
            .map_err(|_| OracleError::IllegalMove(mv.uci()))
    }
}

impl Default for ChessOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleOracle for ChessOracle {
    fn current_turn(&self) -> Color {
        color_from(self.position.turn())
    }

    fn legal_moves(&self, from: Option<Square>) -> Vec<Move> {
        self.position
            .legal_moves()
            .iter()
            .filter_map(to_wire_move)
            .filter(|m| from.map_or(true, |sq| m.from == sq))
            .collect()
    }

    fn apply(&mut self, mv: &Move) -> Result<AppliedMove, OracleError> {
        let m = self.parse_move(mv)?;

        if !self.position.is_legal(&m) {
            return Err(OracleError::IllegalMove(mv.uci()));
        }

        // SAN depends on the position before the move.
        let san = San::from_move(&self.position, &m).to_string();
        let mover = self.current_turn();
        let played = to_wire_move(&m).ok_or_else(|| OracleError::IllegalMove(mv.uci()))?;

        self.position = self
            .position
            .clone()
            .play(&m)
            .map_err(|_| OracleError::IllegalMove(mv.uci()))?;
        self.remember_position();

        Ok(AppliedMove {
            mv: played,
            san,
            mover,
        })
    }

    fn is_check(&self) -> bool {
        self.position.is_check()
    }

    fn is_checkmate(&self) -> bool {
        self.position.is_checkmate()
    }

    fn draw_condition(&self) -> Option<DrawKind> {
        if self.position.is_stalemate() {
            Some(DrawKind::Stalemate)
        } else if self.position.is_insufficient_material() {
            Some(DrawKind::InsufficientMaterial)
        } else if self.halfmove_clock() >= 100 {
            Some(DrawKind::FiftyMoves)
        } else if self.repetitions() >= 3 {
            Some(DrawKind::Repetition)
        } else {
            None
        }
    }

    fn piece_at(&self, square: Square) -> Option<Piece> {
        let sq = shakmaty::Square::new(u32::from(square.index()));
        self.position.board().piece_at(sq).map(|p| Piece {
            color: color_from(p.color),
            kind: kind_from(p.role),
        })
    }

    fn serialize(&self) -> String {
        Fen::from_position(self.position.clone(), EnPassantMode::Legal).to_string()
    }

    fn load(&mut self, snapshot: &str) -> Result<(), OracleError> {
        *self = Self::with_position(parse_fen(snapshot)?);
        Ok(())
    }
}

fn parse_fen(fen: &str) -> Result<Chess, OracleError> {
    let fen: Fen = fen
        .trim()
        .parse()
        .map_err(|e| OracleError::InvalidSnapshot(format!("{e}")))?;
    fen.into_position(CastlingMode::Standard)
        .map_err(|e| OracleError::InvalidSnapshot(format!("{e}")))
}

/// Placement, side to move, castling rights and en-passant square.
fn repetition_key(fen: &str) -> String {
    fen.split_whitespace().take(4).collect::<Vec<_>>().join(" ")
}

fn to_wire_move(m: &shakmaty::Move) -> Option<Move> {
    let uci = ShakmatyUciMove::from_move(m, CastlingMode::Standard);
    uci.to_string().parse().ok()
}

fn color_from(c: shakmaty::Color) -> Color {
    match c {
        shakmaty::Color::White => Color::White,
        shakmaty::Color::Black => Color::Black,
    }
}

fn kind_from(r: shakmaty::Role) -> PieceKind {
    match r {
        shakmaty::Role::Pawn => PieceKind::Pawn,
        shakmaty::Role::Knight => PieceKind::Knight,
        shakmaty::Role::Bishop => PieceKind::Bishop,
        shakmaty::Role::Rook => PieceKind::Rook,
        shakmaty::Role::Queen => PieceKind::Queen,
        shakmaty::Role::King => PieceKind::King,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mv(uci: &str) -> Move {
        uci.parse().unwrap()
    }

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    #[test]
    fn starting_position() {
        let oracle = ChessOracle::new();
        assert_eq!(oracle.current_turn(), Color::White);
        assert!(!oracle.is_check());
        assert!(!oracle.is_game_over());
        assert_eq!(oracle.legal_moves(None).len(), 20);
        assert_eq!(oracle.fullmove_number(), 1);
    }

    #[test]
    fn apply_reports_san_and_mover() {
        let mut oracle = ChessOracle::new();
        let applied = oracle.apply(&mv("e2e4")).unwrap();
        assert_eq!(applied.san, "e4");
        assert_eq!(applied.mover, Color::White);
        assert_eq!(oracle.current_turn(), Color::Black);

        let applied = oracle.apply(&mv("e7e5")).unwrap();
        assert_eq!(applied.mover, Color::Black);
        assert_eq!(oracle.apply(&mv("g1f3")).unwrap().san, "Nf3");
    }

    #[test]
    fn illegal_move_is_rejected_without_change() {
        let mut oracle = ChessOracle::new();
        let before = oracle.serialize();
        assert!(matches!(
            oracle.apply(&mv("e2e5")),
            Err(OracleError::IllegalMove(_))
        ));
        // Black piece on White's turn.
        assert!(oracle.apply(&mv("e7e5")).is_err());
        assert_eq!(oracle.serialize(), before);
    }

    #[test]
    fn legal_moves_filtered_by_square() {
        let oracle = ChessOracle::new();
        let knight = oracle.legal_moves(Some(sq("g1")));
        assert_eq!(knight.len(), 2);
        assert!(knight.contains(&mv("g1f3")));
        assert!(oracle.legal_moves(Some(sq("e4"))).is_empty());
    }

    #[test]
    fn castling_uses_king_destination() {
        let mut oracle =
            ChessOracle::from_fen("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1").unwrap();
        assert!(oracle.legal_moves(Some(sq("e1"))).contains(&mv("e1g1")));
        assert_eq!(oracle.apply(&mv("e1g1")).unwrap().san, "O-O");
        assert_eq!(
            oracle.piece_at(sq("f1")).map(|p| p.kind),
            Some(PieceKind::Rook)
        );
    }

    #[test]
    fn promotion_requires_piece() {
        let mut oracle = ChessOracle::from_fen("8/P7/8/8/8/8/8/4K2k w - - 0 1").unwrap();
        assert!(oracle.apply(&mv("a7a8")).is_err());
        let promos = oracle.legal_moves(Some(sq("a7")));
        assert_eq!(promos.len(), 4);

        let applied = oracle.apply(&mv("a7a8n")).unwrap();
        assert_eq!(applied.san, "a8=N");
        assert_eq!(
            oracle.piece_at(sq("a8")),
            Some(Piece {
                color: Color::White,
                kind: PieceKind::Knight
            })
        );
    }

    #[test]
    fn fools_mate_is_checkmate() {
        let mut oracle = ChessOracle::new();
        for m in ["f2f3", "e7e5", "g2g4", "d8h4"] {
            oracle.apply(&mv(m)).unwrap();
        }
        assert!(oracle.is_checkmate());
        assert!(oracle.is_check());
        assert!(oracle.is_game_over());
        assert!(!oracle.is_draw());
        assert_eq!(oracle.current_turn(), Color::White);
    }

    #[test]
    fn stalemate_is_a_draw() {
        let oracle = ChessOracle::from_fen("8/8/8/8/8/6q1/5k2/7K w - - 0 1").unwrap();
        assert_eq!(oracle.draw_condition(), Some(DrawKind::Stalemate));
        assert!(oracle.legal_moves(None).is_empty());
    }

    #[test]
    fn bare_kings_are_insufficient() {
        let oracle = ChessOracle::from_fen("8/8/8/4k3/8/8/8/4K3 w - - 0 1").unwrap();
        assert_eq!(oracle.draw_condition(), Some(DrawKind::InsufficientMaterial));
    }

    #[test]
    fn fifty_move_rule() {
        let oracle = ChessOracle::from_fen("8/8/8/4k3/8/8/8/R3K3 w - - 100 80").unwrap();
        assert_eq!(oracle.draw_condition(), Some(DrawKind::FiftyMoves));
    }

    #[test]
    fn threefold_repetition() {
        let mut oracle = ChessOracle::new();
        // Knights out and back twice: start position occurs a third time.
        for m in [
            "g1f3", "g8f6", "f3g1", "f6g8", "g1f3", "g8f6", "f3g1", "f6g8",
        ] {
            assert_eq!(oracle.draw_condition(), None);
            oracle.apply(&mv(m)).unwrap();
        }
        assert_eq!(oracle.draw_condition(), Some(DrawKind::Repetition));
    }

    #[test]
    fn load_replaces_position_and_history() {
        let mut oracle = ChessOracle::new();
        oracle.apply(&mv("e2e4")).unwrap();
        let fen = "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2";
        oracle.load(fen).unwrap();
        assert_eq!(oracle.serialize(), fen);
        assert_eq!(oracle.current_turn(), Color::White);
        assert!(oracle.load("not a fen").is_err());
        // Failed load leaves the position alone.
        assert_eq!(oracle.serialize(), fen);
    }

    #[test]
    fn king_square_finds_kings() {
        let oracle = ChessOracle::new();
        assert_eq!(oracle.king_square(Color::White), Some(sq("e1")));
        assert_eq!(oracle.king_square(Color::Black), Some(sq("e8")));
    }
}

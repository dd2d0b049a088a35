//! Terminal classification: how a game ended and what that means for us.

use std::fmt;

use duel_types::Color;

use crate::oracle::{DrawKind, RuleOracle};

/// Why a session finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The side to move was mated.
    Checkmate {
        /// Side that delivered mate.
        winner: Color,
    },
    /// No legal move, not in check.
    Stalemate,
    /// Neither side can mate.
    InsufficientMaterial,
    /// Fifty moves without capture or pawn move.
    FiftyMoves,
    /// Threefold repetition.
    Repetition,
    /// A player resigned.
    Resignation {
        /// Side that resigned.
        loser: Color,
    },
    /// A player declared the game drawn.
    DrawAgreed {
        /// Side that declared it, when known.
        offered_by: Option<Color>,
    },
    /// A player's clock ran out.
    Timeout {
        /// Side that ran out of time.
        loser: Color,
    },
    /// The oracle reports game over without a more specific reason.
    Unclassified,
}

impl Termination {
    /// Classify the oracle's current position, if it is terminal.
    ///
    /// The checkmated side is the side to move, so the winner is the other one.
    pub fn classify<O: RuleOracle + ?Sized>(oracle: &O) -> Option<Self> {
        if oracle.is_checkmate() {
            return Some(Self::Checkmate {
                winner: oracle.current_turn().opposite(),
            });
        }
        if let Some(kind) = oracle.draw_condition() {
            return Some(kind.into());
        }
        oracle.is_game_over().then_some(Self::Unclassified)
    }

    /// Side that won, if the game was decisive.
    pub fn winner(&self) -> Option<Color> {
        match self {
            Self::Checkmate { winner } => Some(*winner),
            Self::Resignation { loser } | Self::Timeout { loser } => Some(loser.opposite()),
            _ => None,
        }
    }

    /// Whether the game ended without a winner.
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            Self::Stalemate
                | Self::InsufficientMaterial
                | Self::FiftyMoves
                | Self::Repetition
                | Self::DrawAgreed { .. }
        )
    }

    /// The result from `local`'s point of view.
    pub fn verdict(&self, local: Color) -> Verdict {
        match self.winner() {
            Some(winner) if winner == local => Verdict::Won,
            Some(_) => Verdict::Lost,
            None if self.is_draw() => Verdict::Drawn,
            None => Verdict::Undecided,
        }
    }

    /// Status line shown to `local` when the game ends.
    pub fn status_line(&self, local: Color) -> String {
        match self {
            Self::Checkmate { winner } if *winner == local => {
                format!("You Won! ({})", winner.title())
            }
            Self::Checkmate { winner } => format!("You Lost ({} Wins)", winner.title()),
            Self::Resignation { loser } if *loser == local => "You Resigned".to_string(),
            Self::Resignation { .. } => "You Won! (Opponent Resigned)".to_string(),
            Self::Timeout { loser } if *loser == local => "You Lost (Time Out)".to_string(),
            Self::Timeout { .. } => "You Won! (Opponent Timed Out)".to_string(),
            Self::DrawAgreed { .. } => "Game Ended (Draw)".to_string(),
            Self::Stalemate
            | Self::InsufficientMaterial
            | Self::FiftyMoves
            | Self::Repetition => "Draw".to_string(),
            Self::Unclassified => "Game Over".to_string(),
        }
    }
}

impl From<DrawKind> for Termination {
    fn from(kind: DrawKind) -> Self {
        match kind {
            DrawKind::Stalemate => Self::Stalemate,
            DrawKind::InsufficientMaterial => Self::InsufficientMaterial,
            DrawKind::FiftyMoves => Self::FiftyMoves,
            DrawKind::Repetition => Self::Repetition,
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Checkmate { winner } => write!(f, "checkmate, {winner} wins"),
            Self::Stalemate => f.write_str("stalemate"),
            Self::InsufficientMaterial => f.write_str("insufficient material"),
            Self::FiftyMoves => f.write_str("fifty-move rule"),
            Self::Repetition => f.write_str("threefold repetition"),
            Self::Resignation { loser } => write!(f, "{loser} resigned"),
            Self::DrawAgreed { .. } => f.write_str("draw agreed"),
            Self::Timeout { loser } => write!(f, "{loser} ran out of time"),
            Self::Unclassified => f.write_str("game over"),
        }
    }
}

/// Result of a finished game for one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// This side won.
    Won,
    /// This side lost.
    Lost,
    /// Nobody won.
    Drawn,
    /// Finished without a known result.
    Undecided,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::ChessOracle;

    #[test]
    fn checkmate_winner_is_side_not_to_move() {
        let oracle =
            ChessOracle::from_fen("rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3")
                .unwrap();
        let term = Termination::classify(&oracle).unwrap();
        assert_eq!(
            term,
            Termination::Checkmate {
                winner: Color::Black
            }
        );
        assert_eq!(term.verdict(Color::White), Verdict::Lost);
        assert_eq!(term.status_line(Color::White), "You Lost (Black Wins)");
        assert_eq!(term.status_line(Color::Black), "You Won! (Black)");
    }

    #[test]
    fn ongoing_position_is_not_terminal() {
        assert_eq!(Termination::classify(&ChessOracle::new()), None);
    }

    #[test]
    fn draws_map_from_oracle() {
        let oracle = ChessOracle::from_fen("8/8/8/8/8/6q1/5k2/7K w - - 0 1").unwrap();
        let term = Termination::classify(&oracle).unwrap();
        assert_eq!(term, Termination::Stalemate);
        assert_eq!(term.verdict(Color::Black), Verdict::Drawn);
        assert_eq!(term.status_line(Color::Black), "Draw");
    }

    #[test]
    fn resignation_perspectives() {
        let term = Termination::Resignation {
            loser: Color::White,
        };
        assert_eq!(term.winner(), Some(Color::Black));
        assert_eq!(term.status_line(Color::White), "You Resigned");
        assert_eq!(
            term.status_line(Color::Black),
            "You Won! (Opponent Resigned)"
        );
    }

    #[test]
    fn agreed_draw_is_symmetric() {
        let term = Termination::DrawAgreed {
            offered_by: Some(Color::White),
        };
        assert_eq!(term.verdict(Color::White), Verdict::Drawn);
        assert_eq!(term.verdict(Color::Black), Verdict::Drawn);
        assert_eq!(term.status_line(Color::Black), "Game Ended (Draw)");
    }
}

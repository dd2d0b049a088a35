//! Session state machine for one two-player game.
//!
//! A [`Session`] is the aggregate root of a game: it exclusively owns the
//! rule oracle, the move history and the clock pair, and gates every
//! mutation on the current [`SessionPhase`] and on whose turn it is.
//!
//! ```text
//! WaitingForOpponent ──join──▶ Active ◀──resolve/cancel── PromotionPending
//!                               │  └──pawn to last rank──────────▲
//!                               ▼
//!                            Finished (terminal)
//! ```
//!
//! Like the rest of this crate the session performs no I/O. Operations
//! return what happened, and the UI-facing consequences are queued as
//! [`GameEvent`]s that the caller drains with [`Session::take_events`].

use serde::Deserialize;
use thiserror::Error;

use duel_types::{ClockReport, Color, JoinPayload, Move, PieceKind, RoomId, Square, WireError};

use crate::clock::{ClockEvent, ClockPair, TimeoutPolicy, DEFAULT_CLOCK_SECS};
use crate::history::{MoveHistory, MoveRecord};
use crate::oracle::{ChessOracle, OracleError, RuleOracle};
use crate::outcome::Termination;

/// Errors building a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Bootstrap payload could not be used.
    #[error("bootstrap rejected: {0}")]
    Bootstrap(#[from] WireError),

    /// Initial snapshot could not be loaded.
    #[error("initial position rejected: {0}")]
    Oracle(#[from] OracleError),
}

/// Who plays the other side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opponent {
    /// A remote player reached through the room channel.
    Remote,
    /// The local bot.
    Bot,
}

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// The room exists but no opponent has been seen yet.
    WaitingForOpponent,
    /// Moves are accepted.
    Active,
    /// A local pawn move awaits its promotion piece.
    PromotionPending,
    /// The game is over. Terminal.
    Finished,
}

/// Tunables that shape a session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionOptions {
    /// Seconds per side when the room reports no clocks (default: 600).
    #[serde(default = "default_clock_secs")]
    pub default_clock_secs: u32,
    /// What a clock reaching zero does (default: report only).
    #[serde(default)]
    pub timeout_policy: TimeoutPolicy,
}

fn default_clock_secs() -> u32 {
    DEFAULT_CLOCK_SECS
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            default_clock_secs: default_clock_secs(),
            timeout_policy: TimeoutPolicy::default(),
        }
    }
}

/// Everything needed to start a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSetup {
    /// Room the session plays in.
    pub room: RoomId,
    /// Color this client plays.
    pub local_color: Color,
    /// Who plays the other color.
    pub opponent: Opponent,
    /// Position to start from instead of the initial position.
    pub snapshot: Option<String>,
    /// Remaining seconds to start from; a missing side gets the default.
    pub clocks: ClockReport,
}

impl SessionSetup {
    /// A game against a remote player in `room`.
    pub fn remote(room: RoomId, local_color: Color) -> Self {
        Self {
            room,
            local_color,
            opponent: Opponent::Remote,
            snapshot: None,
            clocks: ClockReport::default(),
        }
    }

    /// A game against the local bot.
    pub fn bot(local_color: Color) -> Self {
        Self {
            room: RoomId::local_bot(),
            local_color,
            opponent: Opponent::Bot,
            snapshot: None,
            clocks: ClockReport::default(),
        }
    }

    /// Setup from the room service's create/join response.
    pub fn from_join(join: &JoinPayload) -> Result<Self, SessionError> {
        Ok(Self {
            room: join.room_id.clone(),
            local_color: join.seat()?,
            opponent: Opponent::Remote,
            snapshot: join.snapshot().map(str::to_string),
            clocks: join.clocks(),
        })
    }

    /// Start from a position snapshot.
    pub fn with_snapshot(mut self, snapshot: impl Into<String>) -> Self {
        self.snapshot = Some(snapshot.into());
        self
    }

    /// Start from the given remaining seconds.
    pub fn with_clocks(mut self, white: u32, black: u32) -> Self {
        self.clocks = ClockReport {
            white: Some(white),
            black: Some(black),
        };
        self
    }
}

/// Why a local action was refused. Refusals change nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The phase does not accept this action.
    NotActive(SessionPhase),
    /// It is the other side's turn.
    NotYourTurn,
    /// The rules oracle refused the move.
    Illegal(OracleError),
    /// The bot may not move now.
    BotIdle,
    /// The player has left the room.
    Left,
}

/// Result of a local move attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalMoveOutcome {
    /// Applied and appended to history.
    Committed(MoveRecord),
    /// A promotion piece must be chosen before the move is applied.
    PromotionRequired(Move),
    /// Nothing happened.
    Rejected(RejectReason),
}

impl LocalMoveOutcome {
    /// The committed record, if any.
    pub fn committed(&self) -> Option<&MoveRecord> {
        match self {
            Self::Committed(record) => Some(record),
            _ => None,
        }
    }
}

/// Non-move protocol events that end the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalSignal {
    /// The reporting side resigned.
    Resign,
    /// The reporting side declared a draw.
    DrawAgreed,
}

/// Notifications for the UI, in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// The opponent is present; the game may start.
    OpponentJoined,
    /// A move was committed (by either side).
    MoveCommitted(MoveRecord),
    /// A local pawn move needs a promotion piece.
    PromotionRequired(Move),
    /// The pending promotion was abandoned.
    PromotionCancelled,
    /// The position was replaced by a remote snapshot.
    Resynchronized {
        /// Snapshot that was adopted.
        snapshot: String,
    },
    /// Local state diverged and could not be repaired.
    Desynchronized {
        /// What went wrong.
        reason: String,
    },
    /// A clock reached zero.
    ClockExpired(Color),
    /// The game is over.
    Finished(Termination),
}

/// One game, from room join to the end.
#[derive(Debug)]
pub struct Session<O: RuleOracle = ChessOracle> {
    room: RoomId,
    local_color: Color,
    opponent: Opponent,
    options: SessionOptions,
    oracle: O,
    history: MoveHistory,
    clocks: ClockPair,
    opponent_present: bool,
    phase: SessionPhase,
    pending_promotion: Option<Move>,
    termination: Option<Termination>,
    /// Bumped on every position change.
    revision: u64,
    bot_started: bool,
    events: Vec<GameEvent>,
}

impl Session<ChessOracle> {
    /// Start a session on standard chess rules with default options.
    pub fn new(setup: SessionSetup) -> Result<Self, SessionError> {
        Self::start(setup, ChessOracle::new(), SessionOptions::default())
    }
}

impl<O: RuleOracle> Session<O> {
    /// Start a session with the given oracle.
    ///
    /// The session starts `Active` when the opponent is known to be present:
    /// the local side is Black (White created the room), the opponent is the
    /// bot, or the clocks show the game already progressed. Otherwise it
    /// waits for the join signal.
    pub fn start(
        setup: SessionSetup,
        mut oracle: O,
        options: SessionOptions,
    ) -> Result<Self, SessionError> {
        if let Some(snapshot) = &setup.snapshot {
            oracle.load(snapshot)?;
        }

        let default = options.default_clock_secs;
        let white = setup.clocks.white.unwrap_or(default);
        let black = setup.clocks.black.unwrap_or(default);
        let progressed = white < default || black < default;
        let opponent_present =
            setup.opponent == Opponent::Bot || setup.local_color == Color::Black || progressed;

        let history = MoveHistory::new(oracle.serialize());
        let mut session = Self {
            room: setup.room,
            local_color: setup.local_color,
            opponent: setup.opponent,
            options,
            oracle,
            history,
            clocks: ClockPair::new(white, black),
            opponent_present,
            phase: if opponent_present {
                SessionPhase::Active
            } else {
                SessionPhase::WaitingForOpponent
            },
            pending_promotion: None,
            termination: None,
            revision: 0,
            bot_started: false,
            events: Vec::new(),
        };
        tracing::debug!(
            room = %session.room,
            color = %session.local_color,
            phase = ?session.phase,
            "session started"
        );
        // A snapshot may already be a finished game.
        session.classify_terminal();
        Ok(session)
    }

    // ===========================================
    // Accessors
    // ===========================================

    /// Room of this session.
    pub fn room(&self) -> &RoomId {
        &self.room
    }

    /// Color this client plays.
    pub fn local_color(&self) -> Color {
        self.local_color
    }

    /// Who plays the other side.
    pub fn opponent(&self) -> Opponent {
        self.opponent
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Whether the game is over.
    pub fn is_finished(&self) -> bool {
        self.phase == SessionPhase::Finished
    }

    /// How the game ended, once finished.
    pub fn termination(&self) -> Option<Termination> {
        self.termination
    }

    /// End-of-game status line for the local player.
    pub fn status_line(&self) -> Option<String> {
        self.termination
            .map(|term| term.status_line(self.local_color))
    }

    /// Whether the opponent has been seen.
    pub fn opponent_present(&self) -> bool {
        self.opponent_present
    }

    /// The rules oracle (read-only).
    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Committed moves.
    pub fn history(&self) -> &MoveHistory {
        &self.history
    }

    /// Clock values.
    pub fn clocks(&self) -> &ClockPair {
        &self.clocks
    }

    /// Session tunables.
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Current position snapshot.
    pub fn snapshot(&self) -> String {
        self.oracle.serialize()
    }

    /// Position revision; changes whenever the position does.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Move waiting for a promotion piece.
    pub fn pending_promotion(&self) -> Option<Move> {
        self.pending_promotion
    }

    /// Side to move.
    pub fn turn(&self) -> Color {
        self.oracle.current_turn()
    }

    /// Whether the local side is to move.
    pub fn is_local_turn(&self) -> bool {
        self.turn() == self.local_color
    }

    /// Whether a local move would currently be considered.
    pub fn can_move_locally(&self) -> bool {
        self.phase == SessionPhase::Active && self.is_local_turn()
    }

    /// Drain queued UI notifications.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    // ===========================================
    // UI helpers
    // ===========================================

    /// Destination squares for the piece on `square`, if the local side may
    /// move it now.
    pub fn legal_targets(&self, square: Square) -> Vec<Square> {
        if !self.can_move_locally() {
            return Vec::new();
        }
        let mut targets: Vec<Square> = self
            .oracle
            .legal_moves(Some(square))
            .into_iter()
            .map(|m| m.to)
            .collect();
        targets.sort();
        targets.dedup();
        targets
    }

    /// Square of the king currently in check, for highlighting.
    pub fn checked_king(&self) -> Option<Square> {
        if self.oracle.is_check() {
            self.oracle.king_square(self.turn())
        } else {
            None
        }
    }

    /// Replay the history from its origin and return the resulting snapshot.
    pub fn replay_snapshot(&self) -> Result<String, OracleError>
    where
        O: Default,
    {
        self.history.replay::<O>()
    }

    // ===========================================
    // Transitions
    // ===========================================

    /// The opponent joined. Idempotent.
    ///
    /// Returns whether this call activated the session.
    pub fn on_opponent_join_signal(&mut self) -> bool {
        if self.phase != SessionPhase::WaitingForOpponent {
            return false;
        }
        self.opponent_present = true;
        self.phase = SessionPhase::Active;
        self.events.push(GameEvent::OpponentJoined);
        tracing::info!(room = %self.room, "opponent joined");
        true
    }

    /// Try a move for the local side.
    ///
    /// A pawn reaching the last rank without a promotion piece parks the
    /// move in `PromotionPending` instead of applying it.
    pub fn attempt_local_move(&mut self, mv: Move) -> LocalMoveOutcome {
        if self.phase != SessionPhase::Active {
            return LocalMoveOutcome::Rejected(RejectReason::NotActive(self.phase));
        }
        if !self.is_local_turn() {
            return LocalMoveOutcome::Rejected(RejectReason::NotYourTurn);
        }

        if mv.promotion.is_none() && self.is_promotion_move(&mv) {
            let has_promotion = self
                .oracle
                .legal_moves(Some(mv.from))
                .iter()
                .any(|m| m.to == mv.to && m.promotion.is_some());
            if !has_promotion {
                return LocalMoveOutcome::Rejected(RejectReason::Illegal(
                    OracleError::IllegalMove(mv.uci()),
                ));
            }
            self.phase = SessionPhase::PromotionPending;
            self.pending_promotion = Some(mv);
            self.events.push(GameEvent::PromotionRequired(mv));
            return LocalMoveOutcome::PromotionRequired(mv);
        }

        match self.commit(&mv) {
            Ok(record) => LocalMoveOutcome::Committed(record),
            Err(e) => LocalMoveOutcome::Rejected(RejectReason::Illegal(e)),
        }
    }

    /// Complete the pending promotion with `kind`.
    pub fn resolve_promotion(&mut self, kind: PieceKind) -> LocalMoveOutcome {
        if self.phase != SessionPhase::PromotionPending {
            return LocalMoveOutcome::Rejected(RejectReason::NotActive(self.phase));
        }
        let Some(pending) = self.pending_promotion else {
            self.phase = SessionPhase::Active;
            return LocalMoveOutcome::Rejected(RejectReason::NotActive(self.phase));
        };
        if !kind.is_promotion_choice() {
            // Stay pending; the dialog can be answered again.
            return LocalMoveOutcome::Rejected(RejectReason::Illegal(
                OracleError::IllegalMove(pending.promoting(kind).uci()),
            ));
        }

        self.phase = SessionPhase::Active;
        self.pending_promotion = None;
        match self.commit(&pending.promoting(kind)) {
            Ok(record) => LocalMoveOutcome::Committed(record),
            Err(e) => LocalMoveOutcome::Rejected(RejectReason::Illegal(e)),
        }
    }

    /// Abandon the pending promotion. No move is applied.
    pub fn cancel_promotion(&mut self) -> bool {
        if self.phase != SessionPhase::PromotionPending {
            return false;
        }
        self.phase = SessionPhase::Active;
        self.pending_promotion = None;
        self.events.push(GameEvent::PromotionCancelled);
        true
    }

    /// A resign or draw signal reported by `reported_by`.
    ///
    /// A resignation with no stated side is taken as the opponent's.
    /// Returns whether the session finished because of it.
    pub fn apply_terminal_signal(
        &mut self,
        signal: TerminalSignal,
        reported_by: Option<Color>,
    ) -> bool {
        if self.is_finished() {
            tracing::debug!(?signal, "terminal signal after finish ignored");
            return false;
        }
        let termination = match signal {
            TerminalSignal::Resign => Termination::Resignation {
                loser: reported_by.unwrap_or(self.local_color.opposite()),
            },
            TerminalSignal::DrawAgreed => Termination::DrawAgreed {
                offered_by: reported_by,
            },
        };
        self.finish(termination);
        true
    }

    /// The local player resigns.
    pub fn resign(&mut self) -> bool {
        self.apply_terminal_signal(TerminalSignal::Resign, Some(self.local_color))
    }

    /// The local player ends the game as a draw.
    pub fn offer_draw(&mut self) -> bool {
        self.apply_terminal_signal(TerminalSignal::DrawAgreed, Some(self.local_color))
    }

    // ===========================================
    // Clocks
    // ===========================================

    /// Whether a clock should be counting down now.
    ///
    /// A pending promotion is part of the mover's turn, so the clock keeps
    /// running while the piece is chosen.
    pub fn clocks_running(&self) -> bool {
        self.opponent_present
            && matches!(
                self.phase,
                SessionPhase::Active | SessionPhase::PromotionPending
            )
    }

    /// One second of wall-clock time passed.
    pub fn tick(&mut self) -> Option<ClockEvent> {
        if !self.clocks_running() {
            return None;
        }
        let event = self.clocks.tick(self.turn())?;
        let ClockEvent::Expired(side) = event;
        tracing::info!(room = %self.room, %side, "clock expired");
        self.events.push(GameEvent::ClockExpired(side));
        if self.options.timeout_policy == TimeoutPolicy::Forfeit {
            self.finish(Termination::Timeout { loser: side });
        }
        Some(event)
    }

    /// Adopt remotely reported clock values.
    pub fn overwrite_clocks(&mut self, report: &ClockReport) -> bool {
        self.clocks.overwrite(report)
    }

    // ===========================================
    // Bot
    // ===========================================

    /// The player starts the bot phase. Only meaningful against the bot.
    pub fn start_bot(&mut self) -> bool {
        if self.opponent != Opponent::Bot || self.is_finished() {
            return false;
        }
        self.bot_started = true;
        true
    }

    /// Whether the bot is allowed to move right now.
    pub fn bot_may_move(&self) -> bool {
        self.opponent == Opponent::Bot
            && self.bot_started
            && self.phase == SessionPhase::Active
            && !self.is_local_turn()
    }

    /// Apply a move chosen by the bot for the non-local side.
    pub fn apply_bot_move(&mut self, mv: Move) -> Result<MoveRecord, RejectReason> {
        if !self.bot_may_move() {
            return Err(RejectReason::BotIdle);
        }
        self.commit(&mv).map_err(RejectReason::Illegal)
    }

    // ===========================================
    // Internals shared with the reconciler
    // ===========================================

    /// Whether `mv` is a pawn of the side to move reaching its last rank.
    pub(crate) fn is_promotion_move(&self, mv: &Move) -> bool {
        let mover = self.turn();
        self.oracle.piece_at(mv.from).map_or(false, |p| {
            p.kind == PieceKind::Pawn && p.color == mover && mv.to.rank() == mover.promotion_rank()
        })
    }

    /// Apply, record and classify. The only way a move reaches the position.
    pub(crate) fn commit(&mut self, mv: &Move) -> Result<MoveRecord, OracleError> {
        let applied = self.oracle.apply(mv)?;
        let record = MoveRecord::from_applied(applied);
        self.history.push(record.clone());
        self.revision += 1;
        tracing::debug!(
            room = %self.room,
            san = %record.san,
            mover = %record.mover,
            ply = self.history.len(),
            "move committed"
        );
        self.events.push(GameEvent::MoveCommitted(record.clone()));
        self.classify_terminal();
        Ok(record)
    }

    /// Replace the whole position with a snapshot.
    pub(crate) fn adopt_snapshot(&mut self, snapshot: &str) -> Result<(), OracleError> {
        self.oracle.load(snapshot)?;
        self.revision += 1;
        self.events.push(GameEvent::Resynchronized {
            snapshot: snapshot.to_string(),
        });
        self.classify_terminal();
        Ok(())
    }

    /// A remote change moved the position under a pending promotion.
    pub(crate) fn abandon_promotion(&mut self) {
        if self.cancel_promotion() {
            tracing::debug!(room = %self.room, "pending promotion abandoned by remote update");
        }
    }

    pub(crate) fn push_event(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    fn classify_terminal(&mut self) {
        if let Some(termination) = Termination::classify(&self.oracle) {
            self.finish(termination);
        }
    }

    fn finish(&mut self, termination: Termination) {
        if self.is_finished() {
            return;
        }
        self.phase = SessionPhase::Finished;
        self.pending_promotion = None;
        self.termination = Some(termination);
        tracing::info!(room = %self.room, %termination, "game finished");
        self.events.push(GameEvent::Finished(termination));
    }
}

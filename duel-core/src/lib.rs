//! # duelsync-core
//!
//! Pure game-session logic for duelsync (no I/O, instant tests).
//!
//! This crate implements the session state machine, inbound
//! reconciliation, clocks and the bot opponent without any network or
//! timer I/O.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. Time enters only as explicit calls
//! ([`Session::tick`], [`BotDriver::play`]), so every rule can be tested
//! instantly and deterministically.
//!
//! The actual I/O (channel, timers) is performed by `duelsync-client`, which
//! feeds inbound messages to [`Session::receive`] and interprets the
//! [`LinkAction`]s and [`BotPlan`]s produced here.
//!
//! ## Example
//!
//! ```
//! use duelsync_core::{Reconciled, Session, SessionSetup};
//! use duel_types::{Color, MoveMessage, RoomId};
//!
//! let room = RoomId::new("room-1");
//! let mut session = Session::new(SessionSetup::remote(room.clone(), Color::Black)).unwrap();
//!
//! let msg = MoveMessage::for_move(&room, &"e2e4".parse().unwrap(), "");
//! assert!(matches!(session.receive(&msg), Reconciled::Applied(_)));
//! assert!(session.is_local_turn());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bot;
pub mod clock;
pub mod history;
pub mod link;
pub mod oracle;
pub mod outcome;
pub mod reconcile;
pub mod session;

pub use bot::{
    BotDriver, BotPlan, BotTicket, FirstLegalSelector, MoveSelector, RandomSelector,
    DEFAULT_THINK_DELAY,
};
pub use clock::{format_clock, ClockEvent, ClockPair, TimeoutPolicy, DEFAULT_CLOCK_SECS};
pub use history::{MoveHistory, MoveRecord};
pub use link::{LinkAction, LinkEvent, LinkState, LinkStatus};
pub use oracle::{AppliedMove, ChessOracle, DrawKind, OracleError, RuleOracle};
pub use outcome::{Termination, Verdict};
pub use reconcile::Reconciled;
pub use session::{
    GameEvent, LocalMoveOutcome, Opponent, RejectReason, Session, SessionError, SessionOptions,
    SessionPhase, SessionSetup, TerminalSignal,
};

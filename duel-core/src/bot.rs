//! Local bot opponent.
//!
//! The bot picks one of the legal moves after a short think delay. Planning
//! and playing are split so the caller owns the timer: [`BotDriver::plan`]
//! hands out a [`BotTicket`] tied to the session revision, and
//! [`BotDriver::play`] refuses any ticket the position has moved past.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use duel_types::Move;

use crate::history::MoveRecord;
use crate::oracle::RuleOracle;
use crate::session::Session;

/// Default delay before the bot moves.
pub const DEFAULT_THINK_DELAY: Duration = Duration::from_millis(500);

/// Chooses a move from the legal ones.
pub trait MoveSelector {
    /// Pick one of `legal`, or `None` to pass.
    fn select(&mut self, legal: &[Move]) -> Option<Move>;
}

impl<F> MoveSelector for F
where
    F: FnMut(&[Move]) -> Option<Move>,
{
    fn select(&mut self, legal: &[Move]) -> Option<Move> {
        self(legal)
    }
}

/// Uniformly random legal move.
#[derive(Debug)]
pub struct RandomSelector {
    rng: StdRng,
}

impl RandomSelector {
    /// Seeded from OS entropy.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic, for tests and replays.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl MoveSelector for RandomSelector {
    fn select(&mut self, legal: &[Move]) -> Option<Move> {
        legal.choose(&mut self.rng).copied()
    }
}

/// Always the first legal move.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstLegalSelector;

impl MoveSelector for FirstLegalSelector {
    fn select(&mut self, legal: &[Move]) -> Option<Move> {
        legal.first().copied()
    }
}

/// A scheduled bot move, valid for one position revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BotTicket {
    /// Session revision the move was planned for.
    pub revision: u64,
    /// How long to wait before playing.
    pub delay: Duration,
}

/// What the caller should do with its bot timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotPlan {
    /// Arm (or re-arm) the timer with this ticket.
    Schedule(BotTicket),
    /// Disarm the timer.
    Cancel,
    /// Leave the timer as it is.
    Unchanged,
}

/// Drives the bot for one session.
#[derive(Debug)]
pub struct BotDriver<S = RandomSelector> {
    selector: S,
    think_delay: Duration,
    armed: Option<u64>,
}

impl<S: MoveSelector> BotDriver<S> {
    /// Create a driver.
    pub fn new(selector: S, think_delay: Duration) -> Self {
        Self {
            selector,
            think_delay,
            armed: None,
        }
    }

    /// Revision a move is currently scheduled for.
    pub fn armed(&self) -> Option<u64> {
        self.armed
    }

    /// Disarm any scheduled move. Returns whether one was armed.
    pub fn cancel(&mut self) -> bool {
        self.armed.take().is_some()
    }

    /// Decide whether a bot move should be scheduled for the session as it
    /// is now. Call after every session change.
    pub fn plan<O: RuleOracle>(&mut self, session: &Session<O>) -> BotPlan {
        if !session.bot_may_move() {
            return match self.armed.take() {
                Some(_) => BotPlan::Cancel,
                None => BotPlan::Unchanged,
            };
        }
        let revision = session.revision();
        if self.armed == Some(revision) {
            return BotPlan::Unchanged;
        }
        self.armed = Some(revision);
        BotPlan::Schedule(BotTicket {
            revision,
            delay: self.think_delay,
        })
    }

    /// The ticket's delay elapsed: play a move if it is still current.
    ///
    /// A ticket planned for an older revision is discarded.
    pub fn play<O: RuleOracle>(
        &mut self,
        ticket: BotTicket,
        session: &mut Session<O>,
    ) -> Option<MoveRecord> {
        if self.armed != Some(ticket.revision) || session.revision() != ticket.revision {
            tracing::debug!(
                ticket = ticket.revision,
                current = session.revision(),
                "stale bot ticket discarded"
            );
            return None;
        }
        self.armed = None;

        if !session.bot_may_move() {
            return None;
        }
        let legal = session.oracle().legal_moves(None);
        let choice = self.selector.select(&legal)?;
        match session.apply_bot_move(choice) {
            Ok(record) => {
                tracing::debug!(san = %record.san, "bot moved");
                Some(record)
            }
            Err(reason) => {
                tracing::warn!(%choice, ?reason, "bot move refused");
                None
            }
        }
    }
}

//! Inbound message reconciliation.
//!
//! Every message on the room channel ends up here, including the echo of our
//! own moves. Resolution order for a move message:
//!
//! 1. adopt any reported clock values
//! 2. drop it if it repeats our last committed move (echo)
//! 3. apply it through the oracle
//! 4. if the oracle refuses it, reload the full snapshot it carries
//!
//! A message with neither a readable move nor a snapshot changes nothing.
//!
//! Signals (join, resign, draw) never touch the position.

use duel_types::{Inbound, MoveMessage, PieceKind, RemoteMove};

use crate::history::MoveRecord;
use crate::oracle::RuleOracle;
use crate::session::{GameEvent, Session, SessionPhase, TerminalSignal};

/// What an inbound message did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled {
    /// A join, resign or draw signal was handled.
    Signal,
    /// The channel echoed our own last move; nothing changed.
    Echo,
    /// The remote move was applied and recorded.
    Applied(MoveRecord),
    /// The move was refused and the carried snapshot adopted instead.
    Resynchronized,
    /// The move was refused and no usable snapshot came with it.
    Diverged,
    /// The session is finished, or the message carried nothing to apply.
    Ignored,
}

impl<O: RuleOracle> Session<O> {
    /// Reconcile one decoded channel message.
    pub fn receive(&mut self, message: &MoveMessage) -> Reconciled {
        self.receive_inbound(message.classify())
    }

    /// Reconcile an already classified message.
    pub fn receive_inbound(&mut self, inbound: Inbound) -> Reconciled {
        if self.is_finished() {
            tracing::debug!(room = %self.room(), ?inbound, "message after finish ignored");
            return Reconciled::Ignored;
        }
        match inbound {
            Inbound::PlayerJoined => {
                self.on_opponent_join_signal();
                Reconciled::Signal
            }
            Inbound::Resign { by } => {
                self.apply_terminal_signal(TerminalSignal::Resign, by);
                Reconciled::Signal
            }
            Inbound::Draw { by } => {
                self.apply_terminal_signal(TerminalSignal::DrawAgreed, by);
                Reconciled::Signal
            }
            Inbound::Move(remote) => self.apply_remote_move(remote),
        }
    }

    /// Reconcile a remote move message.
    pub fn apply_remote_move(&mut self, remote: RemoteMove) -> Reconciled {
        if self.is_finished() {
            return Reconciled::Ignored;
        }
        if remote.mv.is_none() && remote.snapshot.is_none() {
            tracing::debug!(room = %self.room(), "message without a readable move dropped");
            return Reconciled::Ignored;
        }

        if self.overwrite_clocks(&remote.clocks) {
            tracing::trace!(room = %self.room(), clocks = ?remote.clocks, "clocks adopted");
        }

        if let Some(mv) = remote.mv {
            if self.history().last_matches(mv.from, mv.to) {
                tracing::trace!(room = %self.room(), %mv, "echo of last move");
                return Reconciled::Echo;
            }
        }

        let Some(mut mv) = remote.mv else {
            return match remote.snapshot {
                Some(snapshot) => self.resync(&snapshot, "message carried no move"),
                None => Reconciled::Ignored,
            };
        };
        if mv.promotion.is_none() && self.is_promotion_move(&mv) {
            mv = mv.promoting(PieceKind::Queen);
        }

        let revision = self.revision();
        match self.commit(&mv) {
            Ok(record) => {
                self.abandon_stale_promotion(revision);
                self.implied_join();
                tracing::debug!(room = %self.room(), san = %record.san, "remote move applied");
                Reconciled::Applied(record)
            }
            Err(e) => match remote.snapshot {
                Some(snapshot) => self.resync(&snapshot, &e.to_string()),
                None => {
                    tracing::warn!(
                        room = %self.room(),
                        %mv,
                        error = %e,
                        "remote move refused and no snapshot to resync from"
                    );
                    self.push_event(GameEvent::Desynchronized {
                        reason: e.to_string(),
                    });
                    Reconciled::Diverged
                }
            },
        }
    }

    fn resync(&mut self, snapshot: &str, cause: &str) -> Reconciled {
        let revision = self.revision();
        match self.adopt_snapshot(snapshot) {
            Ok(()) => {
                self.abandon_stale_promotion(revision);
                self.implied_join();
                tracing::warn!(room = %self.room(), %cause, "resynchronized from remote snapshot");
                Reconciled::Resynchronized
            }
            Err(e) => {
                tracing::warn!(
                    room = %self.room(),
                    %cause,
                    error = %e,
                    "remote snapshot unusable"
                );
                self.push_event(GameEvent::Desynchronized {
                    reason: e.to_string(),
                });
                Reconciled::Diverged
            }
        }
    }

    /// Anyone changing the position means the opponent is here.
    fn implied_join(&mut self) {
        if self.phase() == SessionPhase::WaitingForOpponent {
            self.on_opponent_join_signal();
        }
    }

    fn abandon_stale_promotion(&mut self, revision_before: u64) {
        if self.revision() != revision_before && self.phase() == SessionPhase::PromotionPending {
            self.abandon_promotion();
        }
    }
}

//! Clock pair: one countdown per side.
//!
//! Local ticking only smooths the display between authoritative updates.
//! Whenever the channel reports clock values they overwrite the local
//! counters outright; the remote side is the system of record for time.

use serde::Deserialize;

use duel_types::{ClockReport, Color};

/// Starting time per side when the room service reports none.
pub const DEFAULT_CLOCK_SECS: u32 = 600;

/// What happens when a counter reaches zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutPolicy {
    /// Surface the expiry as an event; the game goes on.
    #[default]
    Report,
    /// The side whose counter expired loses on time.
    Forfeit,
}

/// Something the clock pair observed while ticking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    /// This side's counter reached zero.
    Expired(Color),
}

/// Two non-negative second counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockPair {
    white: u32,
    black: u32,
    /// Expiry already reported, per side.
    white_flagged: bool,
    black_flagged: bool,
}

impl ClockPair {
    /// Create a pair with the given remaining seconds.
    pub fn new(white: u32, black: u32) -> Self {
        Self {
            white,
            black,
            white_flagged: false,
            black_flagged: false,
        }
    }

    /// Remaining seconds for `color`.
    pub fn remaining(&self, color: Color) -> u32 {
        match color {
            Color::White => self.white,
            Color::Black => self.black,
        }
    }

    /// Whether `color` has run out of time.
    pub fn is_expired(&self, color: Color) -> bool {
        self.remaining(color) == 0
    }

    /// Advance `side`'s counter by one second.
    ///
    /// Saturates at zero. Reports expiry once, on the tick that reaches zero.
    pub fn tick(&mut self, side: Color) -> Option<ClockEvent> {
        let (counter, flagged) = match side {
            Color::White => (&mut self.white, &mut self.white_flagged),
            Color::Black => (&mut self.black, &mut self.black_flagged),
        };
        *counter = counter.saturating_sub(1);
        if *counter == 0 && !*flagged {
            *flagged = true;
            return Some(ClockEvent::Expired(side));
        }
        None
    }

    /// Overwrite counters with remotely reported values.
    ///
    /// Returns whether any value was present.
    pub fn overwrite(&mut self, report: &ClockReport) -> bool {
        if let Some(white) = report.white {
            self.white = white;
            self.white_flagged = white == 0;
        }
        if let Some(black) = report.black {
            self.black = black;
            self.black_flagged = black == 0;
        }
        !report.is_empty()
    }
}

impl Default for ClockPair {
    fn default() -> Self {
        Self::new(DEFAULT_CLOCK_SECS, DEFAULT_CLOCK_SECS)
    }
}

/// Render seconds as `m:ss`.
pub fn format_clock(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

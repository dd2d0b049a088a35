//! Room channel link state machine.
//!
//! Pure and side-effect-free: events in, new state plus actions out. The
//! client performs the actual connect/subscribe/publish I/O by interpreting
//! the returned [`LinkAction`]s.
//!
//! There is no automatic reconnection. A dropped link stays
//! `Disconnected` until the caller requests a new connection.

/// Channel link state - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LinkState {
    /// No connection.
    #[default]
    Offline,
    /// Transport connection in progress.
    Connecting,
    /// Connected, subscribing to the room topic.
    Subscribing,
    /// Subscribed to the room topic; messages flow.
    Subscribed,
    /// The link was lost or could not be established.
    Disconnected {
        /// Why the link went down.
        reason: String,
    },
}

impl LinkState {
    /// Create a new state machine in the Offline state.
    pub fn new() -> Self {
        Self::Offline
    }

    /// Process an event and return the new state plus actions to execute.
    pub fn on_event(self, event: LinkEvent) -> (Self, Vec<LinkAction>) {
        match (self, event) {
            // From Offline or Disconnected
            (Self::Offline | Self::Disconnected { .. }, LinkEvent::ConnectRequested) => {
                (Self::Connecting, vec![LinkAction::Connect])
            }

            // From Connecting
            (Self::Connecting, LinkEvent::ConnectSucceeded) => {
                (Self::Subscribing, vec![LinkAction::Subscribe])
            }
            (Self::Connecting, LinkEvent::ConnectFailed { error }) => (
                Self::Disconnected {
                    reason: error.clone(),
                },
                vec![LinkAction::Emit(LinkStatus::Disconnected { reason: error })],
            ),

            // From Subscribing
            (Self::Subscribing, LinkEvent::SubscribeSucceeded) => (
                Self::Subscribed,
                vec![LinkAction::Emit(LinkStatus::Connected)],
            ),
            (Self::Subscribing, LinkEvent::SubscribeFailed { error }) => (
                Self::Disconnected {
                    reason: error.clone(),
                },
                vec![
                    LinkAction::Close,
                    LinkAction::Emit(LinkStatus::Disconnected { reason: error }),
                ],
            ),

            // From Subscribed
            (Self::Subscribed, LinkEvent::Dropped { reason }) => (
                Self::Disconnected {
                    reason: reason.clone(),
                },
                vec![LinkAction::Emit(LinkStatus::Disconnected { reason })],
            ),
            (Self::Subscribed, LinkEvent::LeaveRequested) => (
                Self::Offline,
                vec![
                    LinkAction::Unsubscribe,
                    LinkAction::Close,
                    LinkAction::Emit(LinkStatus::Disconnected {
                        reason: "left room".into(),
                    }),
                ],
            ),

            // Leaving mid-setup
            (Self::Connecting | Self::Subscribing, LinkEvent::LeaveRequested) => {
                (Self::Offline, vec![LinkAction::Close])
            }
            (Self::Disconnected { .. }, LinkEvent::LeaveRequested) => (Self::Offline, vec![]),

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Whether messages can be published.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Subscribed)
    }

    /// Whether a connection attempt is under way.
    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting | Self::Subscribing)
    }
}

/// Events in the link lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Caller asked to connect.
    ConnectRequested,
    /// Transport connected.
    ConnectSucceeded,
    /// Transport failed to connect.
    ConnectFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// Room topic subscription is active.
    SubscribeSucceeded,
    /// Room topic subscription failed.
    SubscribeFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// Connection was lost.
    Dropped {
        /// Reason for the drop.
        reason: String,
    },
    /// Caller is leaving the room.
    LeaveRequested,
}

/// Instructions for the client. Not side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAction {
    /// Open the transport connection.
    Connect,
    /// Subscribe to the room topic.
    Subscribe,
    /// Drop the room subscription.
    Unsubscribe,
    /// Close the transport.
    Close,
    /// Report a status change to the application.
    Emit(LinkStatus),
}

/// Connection status shown to the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    /// Subscribed to the room.
    Connected,
    /// Not connected.
    Disconnected {
        /// Why.
        reason: String,
    },
}

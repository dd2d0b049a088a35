//! GameClient - the main interface for a duelsync game.
//!
//! This module provides [`GameClient`], which owns one [`Session`] and
//! connects it to the outside world: the room channel, the clock tick and
//! the bot's think timer.
//!
//! # Architecture
//!
//! GameClient uses the pure state machines from duelsync-core for all game
//! and link logic and interprets their outputs to perform actual I/O via
//! the Transport trait.
//!
//! ```text
//! UI intents ─┐
//! channel ────┼─▶ GameClient::step ─▶ Session (pure) ─▶ GameEvents
//! timers ─────┘          │
//!                        └─▶ Transport::publish
//! ```
//!
//! Everything that touches the session runs on the task calling
//! [`GameClient::step`], so inbound messages, clock ticks and bot moves are
//! serialized with local actions.
//!
//! # Example
//!
//! ```ignore
//! use duel_client::{ClientConfig, GameClient, MemoryBroker};
//! use duel_core::SessionSetup;
//! use duel_types::{Color, RoomId};
//!
//! let broker = MemoryBroker::new("/app/move", "/topic/room/");
//! let setup = SessionSetup::remote(RoomId::new("r1"), Color::White);
//! let mut client = GameClient::online(ClientConfig::default(), broker.transport(), setup)?;
//! client.connect().await?;
//!
//! loop {
//!     for event in client.step().await {
//!         println!("{event:?}");
//!     }
//! }
//! ```

use std::collections::VecDeque;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use duel_core::{
    BotDriver, BotPlan, BotTicket, ChessOracle, GameEvent, LinkAction, LinkEvent, LinkState,
    LinkStatus, LocalMoveOutcome, MoveSelector, Opponent, RandomSelector, RejectReason, Session,
    SessionError, SessionSetup,
};
use duel_types::{Color, Move, MoveMessage, PieceKind};

use crate::config::ClientConfig;
use crate::transport::{Offline, Transport};

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The session could not be created.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The game has no room channel (bot game).
    #[error("game has no room channel")]
    NoChannel,

    /// The player already left this game.
    #[error("game was left")]
    Left,
}

/// Something the player asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Move a piece.
    Move(Move),
    /// Answer the promotion dialog.
    Promote(PieceKind),
    /// Dismiss the promotion dialog.
    CancelPromotion,
    /// Resign.
    Resign,
    /// End the game as a draw.
    OfferDraw,
    /// Let the bot start playing.
    StartBot,
    /// Leave the room.
    Leave,
}

/// Cloneable handle for submitting [`Intent`]s from the UI.
#[derive(Debug, Clone)]
pub struct IntentSender {
    tx: mpsc::UnboundedSender<Intent>,
}

impl IntentSender {
    /// Queue an intent. Returns false if the client is gone.
    pub fn send(&self, intent: Intent) -> bool {
        self.tx.send(intent).is_ok()
    }
}

/// Notifications for the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Session change.
    Game(GameEvent),
    /// Channel status change.
    Link(LinkStatus),
}

/// What woke up [`GameClient::step`].
enum Wake {
    Intent(Intent),
    Frame(Result<Vec<u8>, crate::transport::TransportError>),
    Tick,
    Bot,
    Idle,
}

/// The game client.
///
/// Owns the session, the channel link and the timers for one game.
pub struct GameClient<T: Transport, S: MoveSelector = RandomSelector> {
    config: ClientConfig,
    transport: T,
    session: Session,
    link: LinkState,
    bot: BotDriver<S>,
    bot_timer: Option<(Instant, BotTicket)>,
    ticker: Option<Interval>,
    /// Side whose clock the ticker is currently timing.
    ticking: Option<Color>,
    /// Set by [`GameClient::leave`]; the session is dead from then on.
    left: bool,
    intents_tx: mpsc::UnboundedSender<Intent>,
    intents_rx: mpsc::UnboundedReceiver<Intent>,
    events: Vec<ClientEvent>,
}

impl<T: Transport, S: MoveSelector> std::fmt::Debug for GameClient<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameClient")
            .field("room", self.session.room())
            .field("color", &self.session.local_color())
            .field("phase", &self.session.phase())
            .field("link", &self.link)
            .field("left", &self.left)
            .finish()
    }
}

impl<T: Transport> GameClient<T, RandomSelector> {
    /// A game against a remote player over `transport`.
    pub fn online(
        config: ClientConfig,
        transport: T,
        setup: SessionSetup,
    ) -> Result<Self, ClientError> {
        let selector = random_selector(&config);
        Self::build(config, transport, setup, selector)
    }
}

impl GameClient<Offline, RandomSelector> {
    /// A game against the local bot.
    pub fn against_bot(config: ClientConfig, local_color: Color) -> Result<Self, ClientError> {
        let selector = random_selector(&config);
        Self::against_bot_with(config, local_color, selector)
    }
}

impl<S: MoveSelector> GameClient<Offline, S> {
    /// A game against the local bot using a custom move selector.
    pub fn against_bot_with(
        config: ClientConfig,
        local_color: Color,
        selector: S,
    ) -> Result<Self, ClientError> {
        Self::build(config, Offline, SessionSetup::bot(local_color), selector)
    }
}

fn random_selector(config: &ClientConfig) -> RandomSelector {
    config
        .bot
        .seed
        .map_or_else(RandomSelector::new, RandomSelector::seeded)
}

impl<T: Transport, S: MoveSelector> GameClient<T, S> {
    fn build(
        config: ClientConfig,
        transport: T,
        setup: SessionSetup,
        selector: S,
    ) -> Result<Self, ClientError> {
        let session = Session::start(setup, ChessOracle::new(), config.session.options())?;
        let bot = BotDriver::new(selector, config.bot.think_delay());
        let (intents_tx, intents_rx) = mpsc::unbounded_channel();
        let mut client = Self {
            config,
            transport,
            session,
            link: LinkState::new(),
            bot,
            bot_timer: None,
            ticker: None,
            ticking: None,
            left: false,
            intents_tx,
            intents_rx,
            events: Vec::new(),
        };
        client.after_change();
        Ok(client)
    }

    // ===========================================
    // Accessors
    // ===========================================

    /// The session (read-only).
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Channel link state.
    pub fn link(&self) -> &LinkState {
        &self.link
    }

    /// Get a reference to the underlying transport (for testing).
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// A handle for submitting intents to [`GameClient::step`].
    pub fn intents(&self) -> IntentSender {
        IntentSender {
            tx: self.intents_tx.clone(),
        }
    }

    /// Whether [`GameClient::leave`] was called.
    pub fn has_left(&self) -> bool {
        self.left
    }

    /// Drain pending notifications.
    pub fn take_events(&mut self) -> Vec<ClientEvent> {
        self.collect_session_events();
        std::mem::take(&mut self.events)
    }

    fn is_online(&self) -> bool {
        self.session.opponent() == Opponent::Remote
    }

    fn topic(&self) -> String {
        self.session.room().topic(&self.config.transport.topic_prefix)
    }

    // ===========================================
    // Channel
    // ===========================================

    /// Connect to the relay and subscribe to the room topic.
    ///
    /// The joining (Black) side announces itself once subscribed.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        if self.left {
            return Err(ClientError::Left);
        }
        if !self.is_online() {
            return Err(ClientError::NoChannel);
        }
        self.drive_link(LinkEvent::ConnectRequested).await;

        match &self.link {
            LinkState::Subscribed => {
                tracing::info!(room = %self.session.room(), topic = %self.topic(), "subscribed to room");
                if self.config.transport.announce_join && self.session.local_color() == Color::Black
                {
                    let joined = MoveMessage::player_joined(self.session.room());
                    self.publish(joined).await;
                }
                Ok(())
            }
            LinkState::Disconnected { reason } => Err(ClientError::ConnectionFailed(reason.clone())),
            other => Err(ClientError::ConnectionFailed(format!(
                "link stopped in {other:?}"
            ))),
        }
    }

    /// Leave the room: unsubscribe, close, stop the bot and the clock.
    ///
    /// The session accepts nothing afterwards.
    pub async fn leave(&mut self) {
        if self.left {
            return;
        }
        self.left = true;
        self.drive_link(LinkEvent::LeaveRequested).await;
        self.bot.cancel();
        self.bot_timer = None;
        self.ticker = None;
        self.ticking = None;
        tracing::info!(room = %self.session.room(), "left room");
    }

    /// Feed a link event through the link state machine and perform the
    /// resulting actions until the link settles.
    async fn drive_link(&mut self, event: LinkEvent) {
        let mut pending = VecDeque::from([event]);
        while let Some(event) = pending.pop_front() {
            let (state, actions) = std::mem::take(&mut self.link).on_event(event);
            self.link = state;

            for action in actions {
                match action {
                    LinkAction::Connect => {
                        let address = self.config.transport.address.clone();
                        match self.transport.connect(&address).await {
                            Ok(()) => pending.push_back(LinkEvent::ConnectSucceeded),
                            Err(e) => pending.push_back(LinkEvent::ConnectFailed {
                                error: e.to_string(),
                            }),
                        }
                    }
                    LinkAction::Subscribe => match self.transport.subscribe(&self.topic()).await {
                        Ok(()) => pending.push_back(LinkEvent::SubscribeSucceeded),
                        Err(e) => pending.push_back(LinkEvent::SubscribeFailed {
                            error: e.to_string(),
                        }),
                    },
                    LinkAction::Unsubscribe => {
                        if let Err(e) = self.transport.unsubscribe().await {
                            tracing::debug!(error = %e, "unsubscribe failed");
                        }
                    }
                    LinkAction::Close => {
                        if let Err(e) = self.transport.close().await {
                            tracing::debug!(error = %e, "close failed");
                        }
                    }
                    LinkAction::Emit(status) => {
                        if let LinkStatus::Disconnected { reason } = &status {
                            tracing::warn!(room = %self.session.room(), %reason, "room link down");
                        }
                        self.events.push(ClientEvent::Link(status));
                    }
                }
            }
        }
    }

    /// Publish a message. Fire-and-forget: failures are logged and never
    /// roll back local state.
    async fn publish(&mut self, message: MoveMessage) {
        if !self.link.is_connected() {
            tracing::debug!(room = %self.session.room(), "not connected, message not sent");
            return;
        }
        let bytes = match message.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode message");
                return;
            }
        };
        let destination = self.config.transport.send_destination.clone();
        if let Err(e) = self.transport.publish(&destination, &bytes).await {
            tracing::warn!(%destination, error = %e, "publish failed");
            if e.is_disconnect() {
                self.drive_link(LinkEvent::Dropped {
                    reason: e.to_string(),
                })
                .await;
            }
        }
    }

    async fn announce_move(&mut self, mv: Move) {
        if !self.is_online() {
            return;
        }
        let clocks = self.session.clocks();
        let message = MoveMessage::for_move(self.session.room(), &mv, self.session.snapshot())
            .with_clocks(clocks.remaining(Color::White), clocks.remaining(Color::Black));
        self.publish(message).await;
    }

    fn handle_frame(&mut self, bytes: &[u8]) {
        let message = match MoveMessage::from_bytes(bytes) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "undecodable frame dropped");
                return;
            }
        };
        if let Some(room) = &message.room_id {
            if room != self.session.room() {
                tracing::debug!(%room, "frame for another room ignored");
                return;
            }
        }
        let outcome = self.session.receive(&message);
        tracing::debug!(room = %self.session.room(), ?outcome, "frame reconciled");
    }

    // ===========================================
    // Player actions
    // ===========================================

    /// Try a local move; publish it if it was committed.
    pub async fn play(&mut self, mv: Move) -> LocalMoveOutcome {
        if self.left {
            return LocalMoveOutcome::Rejected(RejectReason::Left);
        }
        let outcome = self.session.attempt_local_move(mv);
        if let LocalMoveOutcome::Committed(record) = &outcome {
            self.announce_move(record.as_move()).await;
        }
        self.after_change();
        outcome
    }

    /// Answer the promotion dialog; publish the move if it was committed.
    pub async fn choose_promotion(&mut self, kind: PieceKind) -> LocalMoveOutcome {
        if self.left {
            return LocalMoveOutcome::Rejected(RejectReason::Left);
        }
        let outcome = self.session.resolve_promotion(kind);
        if let LocalMoveOutcome::Committed(record) = &outcome {
            self.announce_move(record.as_move()).await;
        }
        self.after_change();
        outcome
    }

    /// Dismiss the promotion dialog.
    pub fn cancel_promotion(&mut self) -> bool {
        if self.left {
            return false;
        }
        let cancelled = self.session.cancel_promotion();
        self.after_change();
        cancelled
    }

    /// Resign and tell the room.
    pub async fn resign(&mut self) -> bool {
        if self.left {
            return false;
        }
        let finished = self.session.resign();
        if finished && self.is_online() {
            let color = self.session.local_color();
            let message = MoveMessage::resign(self.session.room(), color);
            self.publish(message).await;
        }
        self.after_change();
        finished
    }

    /// End the game as a draw and tell the room.
    pub async fn offer_draw(&mut self) -> bool {
        if self.left {
            return false;
        }
        let finished = self.session.offer_draw();
        if finished && self.is_online() {
            let color = self.session.local_color();
            let message = MoveMessage::draw(self.session.room(), color);
            self.publish(message).await;
        }
        self.after_change();
        finished
    }

    /// Let the bot start playing.
    pub fn start_bot(&mut self) -> bool {
        if self.left {
            return false;
        }
        let started = self.session.start_bot();
        self.after_change();
        started
    }

    async fn handle_intent(&mut self, intent: Intent) {
        match intent {
            Intent::Move(mv) => {
                if let LocalMoveOutcome::Rejected(reason) = self.play(mv).await {
                    tracing::debug!(%mv, ?reason, "move rejected");
                }
            }
            Intent::Promote(kind) => {
                self.choose_promotion(kind).await;
            }
            Intent::CancelPromotion => {
                self.cancel_promotion();
            }
            Intent::Resign => {
                self.resign().await;
            }
            Intent::OfferDraw => {
                self.offer_draw().await;
            }
            Intent::StartBot => {
                self.start_bot();
            }
            Intent::Leave => self.leave().await,
        }
    }

    // ===========================================
    // Event loop
    // ===========================================

    /// Wait for the next intent, frame, clock tick or bot move, apply it,
    /// and return the resulting notifications.
    ///
    /// Once the client has left, returns at once with whatever
    /// notifications remain.
    pub async fn step(&mut self) -> Vec<ClientEvent> {
        if self.left {
            return self.take_events();
        }
        self.after_change();

        let running = self.session.clocks_running();
        let timing = running.then(|| self.session.turn());
        let period = self.config.session.tick_period();
        let ticker = self.ticker.get_or_insert_with(|| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        // A fresh second starts whenever a different clock starts running.
        if timing.is_some() && timing != self.ticking {
            ticker.reset();
        }
        self.ticking = timing;

        let receiving = self.link.is_connected();
        let bot_deadline = self.bot_timer.map(|(at, _)| at);
        let bot_sleep = tokio::time::sleep_until(bot_deadline.unwrap_or_else(Instant::now));
        let intents = &mut self.intents_rx;
        let transport = &self.transport;

        let wake = tokio::select! {
            Some(intent) = intents.recv() => Wake::Intent(intent),
            frame = transport.recv(), if receiving => Wake::Frame(frame),
            _ = ticker.tick(), if running => Wake::Tick,
            _ = bot_sleep, if bot_deadline.is_some() => Wake::Bot,
            else => Wake::Idle,
        };

        match wake {
            Wake::Intent(intent) => self.handle_intent(intent).await,
            Wake::Frame(Ok(bytes)) => self.handle_frame(&bytes),
            Wake::Frame(Err(e)) => {
                self.drive_link(LinkEvent::Dropped {
                    reason: e.to_string(),
                })
                .await;
            }
            Wake::Tick => {
                self.session.tick();
            }
            Wake::Bot => {
                if let Some((_, ticket)) = self.bot_timer.take() {
                    self.bot.play(ticket, &mut self.session);
                }
            }
            Wake::Idle => {}
        }

        self.after_change();
        self.take_events()
    }

    /// Re-plan the bot and collect session notifications.
    fn after_change(&mut self) {
        if self.left {
            self.bot_timer = None;
            self.collect_session_events();
            return;
        }
        match self.bot.plan(&self.session) {
            BotPlan::Schedule(ticket) => {
                self.bot_timer = Some((Instant::now() + ticket.delay, ticket));
            }
            BotPlan::Cancel => self.bot_timer = None,
            BotPlan::Unchanged => {}
        }
        self.collect_session_events();
    }

    fn collect_session_events(&mut self) {
        self.events
            .extend(self.session.take_events().into_iter().map(ClientEvent::Game));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MemoryBroker, MockTransport};
    use duel_core::{FirstLegalSelector, SessionPhase};
    use duel_types::{RoomId, RESIGN};
    use std::time::Duration;

    fn mv(uci: &str) -> Move {
        uci.parse().unwrap()
    }

    fn room() -> RoomId {
        RoomId::new("r1")
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn online(color: Color, transport: MockTransport) -> GameClient<MockTransport> {
        GameClient::online(
            ClientConfig::default(),
            transport,
            SessionSetup::remote(room(), color),
        )
        .unwrap()
    }

    fn last_message(transport: &MockTransport) -> MoveMessage {
        MoveMessage::from_bytes(&transport.last_published().unwrap().payload).unwrap()
    }

    // ===========================================
    // Channel
    // ===========================================

    #[tokio::test]
    async fn connect_subscribes_to_room_topic() {
        let transport = MockTransport::new();
        let mut client = online(Color::White, transport.clone());

        client.connect().await.unwrap();

        assert!(client.link().is_connected());
        assert_eq!(transport.subscription(), Some("/topic/room/r1".to_string()));
        assert_eq!(
            transport.connected_address(),
            Some("ws://localhost:8080/ws".to_string())
        );
        // The creator does not announce itself.
        assert!(transport.published().is_empty());
        assert!(client
            .take_events()
            .contains(&ClientEvent::Link(LinkStatus::Connected)));
    }

    #[tokio::test]
    async fn joiner_announces_itself() {
        let transport = MockTransport::new();
        let mut client = online(Color::Black, transport.clone());
        client.connect().await.unwrap();

        let sent = last_message(&transport);
        assert_eq!(sent.fen.as_deref(), Some(duel_types::PLAYER_JOINED));
        assert_eq!(sent.room_id, Some(room()));
    }

    #[tokio::test]
    async fn connect_failure_is_reported() {
        let transport = MockTransport::new();
        transport.fail_next_connect("unreachable");
        let mut client = online(Color::White, transport);

        let result = client.connect().await;
        assert!(matches!(result, Err(ClientError::ConnectionFailed(_))));
        assert!(matches!(client.link(), LinkState::Disconnected { .. }));
    }

    #[tokio::test]
    async fn bot_game_has_no_channel() {
        let mut client = GameClient::against_bot(ClientConfig::default(), Color::White).unwrap();
        assert!(matches!(client.connect().await, Err(ClientError::NoChannel)));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_channel_surfaces_status() {
        init_tracing();
        let transport = MockTransport::new();
        let mut client = online(Color::Black, transport.clone());
        client.connect().await.unwrap();
        client.take_events();

        // The mock reports the connection closed once its queue is empty.
        let events = client.step().await;
        assert!(events
            .iter()
            .any(|e| matches!(e, ClientEvent::Link(LinkStatus::Disconnected { .. }))));
        assert!(!client.link().is_connected());
        assert!(!client.session().is_finished());
    }

    #[tokio::test]
    async fn leaving_tears_down_subscription() {
        let transport = MockTransport::new();
        let mut client = online(Color::White, transport.clone());
        client.connect().await.unwrap();
        client.take_events();

        client.leave().await;

        assert_eq!(transport.subscription(), None);
        assert!(!transport.is_connected());
        assert_eq!(client.link(), &LinkState::Offline);
        assert!(client.has_left());
        assert!(client.take_events().contains(&ClientEvent::Link(
            LinkStatus::Disconnected {
                reason: "left room".into()
            }
        )));
        assert!(matches!(client.connect().await, Err(ClientError::Left)));
    }

    #[tokio::test]
    async fn left_session_accepts_nothing() {
        let transport = MockTransport::new();
        let mut client = online(Color::White, transport.clone());
        client.connect().await.unwrap();
        client
            .session
            .receive(&MoveMessage::player_joined(&room()));
        client.leave().await;

        assert_eq!(
            client.play(mv("e2e4")).await,
            LocalMoveOutcome::Rejected(RejectReason::Left)
        );
        assert!(!client.resign().await);
        assert!(!client.offer_draw().await);
        assert!(client.session().history().is_empty());
        assert!(!client.session().is_finished());
        assert!(transport.published().is_empty());
    }

    // ===========================================
    // Publishing
    // ===========================================

    #[tokio::test]
    async fn committed_move_is_published_with_snapshot_and_clocks() {
        let transport = MockTransport::new();
        let mut client = online(Color::Black, transport.clone());
        client.connect().await.unwrap();

        let opening = MoveMessage::for_move(&room(), &mv("e2e4"), "");
        transport.queue_inbound(opening.to_bytes().unwrap());
        client.step().await;

        let outcome = client.play(mv("c7c5")).await;
        assert!(outcome.committed().is_some());

        let sent = last_message(&transport);
        assert_eq!(sent.from.as_deref(), Some("c7"));
        assert_eq!(sent.to.as_deref(), Some("c5"));
        assert_eq!(sent.fen, Some(client.session().snapshot()));
        assert_eq!(sent.white_time, Some(600));
        assert_eq!(sent.black_time, Some(600));
        assert_eq!(transport.last_published().unwrap().destination, "/app/move");
    }

    #[tokio::test]
    async fn rejected_move_is_not_published() {
        let transport = MockTransport::new();
        let mut client = online(Color::Black, transport.clone());
        client.connect().await.unwrap();
        let before = transport.published().len();

        // White to move.
        let outcome = client.play(mv("e7e5")).await;
        assert!(matches!(outcome, LocalMoveOutcome::Rejected(_)));
        assert_eq!(transport.published().len(), before);
    }

    #[tokio::test]
    async fn promotion_is_published_after_choice() {
        let transport = MockTransport::new();
        let setup = SessionSetup::remote(room(), Color::White)
            .with_snapshot("8/P6p/8/8/8/8/8/4K2k w - - 0 1")
            .with_clocks(300, 300);
        let mut client =
            GameClient::online(ClientConfig::default(), transport.clone(), setup).unwrap();
        client.connect().await.unwrap();

        let outcome = client.play(mv("a7a8")).await;
        assert!(matches!(outcome, LocalMoveOutcome::PromotionRequired(_)));
        assert!(transport.published().is_empty());

        client.choose_promotion(PieceKind::Knight).await;
        let sent = last_message(&transport);
        assert_eq!(sent.promotion.as_deref(), Some("n"));
        assert_eq!(sent.white_time, Some(300));
    }

    #[tokio::test]
    async fn resign_publishes_sentinel() {
        let transport = MockTransport::new();
        let mut client = online(Color::Black, transport.clone());
        client.connect().await.unwrap();

        assert!(client.resign().await);
        let sent = last_message(&transport);
        assert_eq!(sent.fen.as_deref(), Some(RESIGN));
        assert_eq!(sent.from.as_deref(), Some("black"));
        assert_eq!(client.session().status_line().unwrap(), "You Resigned");

        // Already finished: nothing more is sent.
        let count = transport.published().len();
        assert!(!client.offer_draw().await);
        assert_eq!(transport.published().len(), count);
    }

    #[tokio::test]
    async fn moves_while_disconnected_stay_local() {
        let transport = MockTransport::new();
        let mut client = online(Color::Black, transport.clone());

        client
            .session
            .receive(&MoveMessage::for_move(&room(), &mv("d2d4"), ""));
        assert!(client.play(mv("d7d5")).await.committed().is_some());
        assert!(transport.published().is_empty());
        assert_eq!(client.session().history().len(), 2);
    }

    // ===========================================
    // Inbound
    // ===========================================

    #[tokio::test]
    async fn frames_for_other_rooms_are_ignored() {
        let transport = MockTransport::new();
        let mut client = online(Color::Black, transport.clone());
        client.connect().await.unwrap();

        let stray = MoveMessage::for_move(&RoomId::new("elsewhere"), &mv("e2e4"), "");
        transport.queue_inbound(stray.to_bytes().unwrap());
        client.step().await;
        assert!(client.session().history().is_empty());
    }

    #[tokio::test]
    async fn garbage_frames_are_dropped() {
        let transport = MockTransport::new();
        let mut client = online(Color::Black, transport.clone());
        client.connect().await.unwrap();

        transport.queue_inbound(b"not json".to_vec());
        client.step().await;
        assert!(client.link().is_connected());
        assert!(client.session().history().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn two_clients_over_memory_broker() {
        init_tracing();
        let broker = MemoryBroker::new("/app/move", "/topic/room/");
        let config = ClientConfig::default();
        let mut white = GameClient::online(
            config.clone(),
            broker.transport(),
            SessionSetup::remote(room(), Color::White),
        )
        .unwrap();
        let mut black = GameClient::online(
            config,
            broker.transport(),
            SessionSetup::remote(room(), Color::Black),
        )
        .unwrap();

        white.connect().await.unwrap();
        black.connect().await.unwrap();

        // White sees the join signal.
        let events = white.step().await;
        assert!(events.contains(&ClientEvent::Game(GameEvent::OpponentJoined)));
        assert_eq!(white.session().phase(), SessionPhase::Active);

        white.play(mv("e2e4")).await;

        // Black first sees its own join echo, then the move.
        black.step().await;
        black.step().await;
        assert_eq!(black.session().history().len(), 1);
        assert_eq!(black.session().snapshot(), white.session().snapshot());

        // White's own move comes back as an echo.
        white.step().await;
        assert_eq!(white.session().history().len(), 1);

        black.play(mv("e7e5")).await;
        white.step().await;
        assert_eq!(white.session().history().len(), 2);
        assert!(white.session().is_local_turn());
    }

    // ===========================================
    // Intents and timers
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn intents_are_applied_by_step() {
        let mut client =
            GameClient::against_bot_with(ClientConfig::default(), Color::White, FirstLegalSelector)
                .unwrap();
        let intents = client.intents();
        assert!(intents.send(Intent::Move(mv("e2e4"))));

        let events = client.step().await;
        assert!(events
            .iter()
            .any(|e| matches!(e, ClientEvent::Game(GameEvent::MoveCommitted(_)))));
        assert_eq!(client.session().history().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn bot_replies_after_think_delay() {
        let mut client =
            GameClient::against_bot_with(ClientConfig::default(), Color::White, FirstLegalSelector)
                .unwrap();
        assert!(client.start_bot());
        client.play(mv("e2e4")).await;

        let started = Instant::now();
        client.step().await;
        assert_eq!(started.elapsed(), Duration::from_millis(500));
        assert_eq!(client.session().history().len(), 2);
        assert_eq!(client.session().history().last().unwrap().mover, Color::Black);
        // The reply came before a full second passed.
        assert_eq!(client.session().clocks().remaining(Color::Black), 600);
    }

    #[tokio::test(start_paused = true)]
    async fn bot_opens_when_playing_black() {
        let mut client =
            GameClient::against_bot_with(ClientConfig::default(), Color::Black, FirstLegalSelector)
                .unwrap();
        client.intents().send(Intent::StartBot);
        client.step().await;
        client.step().await;
        assert_eq!(client.session().history().len(), 1);
        assert!(client.session().is_local_turn());
    }

    #[tokio::test(start_paused = true)]
    async fn clock_ticks_for_side_to_move() {
        let mut client = GameClient::against_bot(ClientConfig::default(), Color::White).unwrap();

        client.step().await;
        client.step().await;
        assert_eq!(client.session().clocks().remaining(Color::White), 598);
        assert_eq!(client.session().clocks().remaining(Color::Black), 600);
    }

    #[tokio::test(start_paused = true)]
    async fn leaving_cancels_pending_bot_move() {
        let mut client =
            GameClient::against_bot_with(ClientConfig::default(), Color::White, FirstLegalSelector)
                .unwrap();
        assert!(client.start_bot());
        client.play(mv("e2e4")).await;
        assert!(client.bot_timer.is_some());

        client.leave().await;
        assert!(client.bot_timer.is_none());
        assert_eq!(client.bot.armed(), None);

        tokio::time::sleep(Duration::from_secs(3)).await;
        client.step().await;
        client.step().await;

        assert_eq!(client.session().history().len(), 1);
        assert_eq!(client.session().clocks().remaining(Color::White), 600);
        assert_eq!(client.session().clocks().remaining(Color::Black), 600);
        assert!(!client.start_bot());
    }

    #[tokio::test(start_paused = true)]
    async fn bot_never_moves_after_resign() {
        let mut client =
            GameClient::against_bot_with(ClientConfig::default(), Color::White, FirstLegalSelector)
                .unwrap();
        client.start_bot();
        client.play(mv("e2e4")).await;
        client.resign().await;

        client.intents().send(Intent::Leave);
        client.step().await;
        assert_eq!(client.session().history().len(), 1);
        assert!(client.session().is_finished());
    }
}

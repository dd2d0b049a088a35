//! # duelsync-client
//!
//! Async game client for duelsync.
//!
//! This is the library applications use to play a game: it owns one
//! session and connects it to the room channel, the clock tick and the
//! bot's think timer.
//!
//! ## Features
//!
//! - **Room Channel**: Publish/subscribe link with echo-tolerant reconciliation
//! - **Clocks**: One-second countdown for the side to move
//! - **Bot Opponent**: Local opponent with a configurable think delay
//! - **Transport Abstraction**: Pluggable transport layer (in-memory broker, mock)
//! - **Pure State Machine**: Uses duelsync-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use duel_client::{ClientConfig, GameClient, Intent};
//! use duel_types::Color;
//!
//! let config = ClientConfig::from_file("duelsync.toml".as_ref())?;
//! let mut client = GameClient::against_bot(config, Color::White)?;
//! let intents = client.intents();
//!
//! intents.send(Intent::StartBot);
//! intents.send(Intent::Move("e2e4".parse()?));
//! loop {
//!     for event in client.step().await {
//!         println!("{event:?}");
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod transport;

pub use client::{ClientError, ClientEvent, GameClient, Intent, IntentSender};
pub use config::{BotConfig, ClientConfig, ConfigError, SessionConfig, TransportConfig};
pub use transport::{
    MemoryBroker, MemoryTransport, MockTransport, Offline, Published, Transport, TransportError,
};

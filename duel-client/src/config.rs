//! Configuration loading for the game client.
//!
//! Configuration is loaded from a TOML file (default: `duelsync.toml`).
//! Every section and field is optional.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use duel_core::{SessionOptions, TimeoutPolicy, DEFAULT_CLOCK_SECS};

/// Root configuration for the game client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientConfig {
    /// Room channel configuration.
    #[serde(default)]
    pub transport: TransportConfig,
    /// Session rules configuration.
    #[serde(default)]
    pub session: SessionConfig,
    /// Bot opponent configuration.
    #[serde(default)]
    pub bot: BotConfig,
}

/// Room channel configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    /// Relay endpoint (default: ws://localhost:8080/ws).
    #[serde(default = "default_address")]
    pub address: String,
    /// Destination moves are published to (default: /app/move).
    #[serde(default = "default_send_destination")]
    pub send_destination: String,
    /// Room topic prefix; the room id is appended (default: /topic/room/).
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
    /// Publish the join signal after subscribing as the joining side
    /// (default: true).
    #[serde(default = "default_announce_join")]
    pub announce_join: bool,
}

/// Session rules configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Seconds per side when the room reports none (default: 600).
    #[serde(default = "default_clock_secs")]
    pub default_clock_secs: u32,
    /// What a clock reaching zero does: "report" or "forfeit" (default: report).
    #[serde(default)]
    pub timeout_policy: TimeoutPolicy,
    /// Clock tick period in milliseconds (default: 1000).
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
}

/// Bot opponent configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Delay before the bot moves, in milliseconds (default: 500).
    #[serde(default = "default_think_delay_ms")]
    pub think_delay_ms: u64,
    /// Seed for the bot's move choice; random when unset.
    pub seed: Option<u64>,
}

// Default value functions
fn default_address() -> String {
    "ws://localhost:8080/ws".to_string()
}

fn default_send_destination() -> String {
    "/app/move".to_string()
}

fn default_topic_prefix() -> String {
    "/topic/room/".to_string()
}

fn default_announce_join() -> bool {
    true
}

fn default_clock_secs() -> u32 {
    DEFAULT_CLOCK_SECS
}

fn default_tick_millis() -> u64 {
    1000
}

fn default_think_delay_ms() -> u64 {
    500
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            send_destination: default_send_destination(),
            topic_prefix: default_topic_prefix(),
            announce_join: default_announce_join(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_clock_secs: default_clock_secs(),
            timeout_policy: TimeoutPolicy::default(),
            tick_millis: default_tick_millis(),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            think_delay_ms: default_think_delay_ms(),
            seed: None,
        }
    }
}

impl SessionConfig {
    /// Options handed to the session.
    pub fn options(&self) -> SessionOptions {
        SessionOptions {
            default_clock_secs: self.default_clock_secs,
            timeout_policy: self.timeout_policy,
        }
    }

    /// Clock tick period. Never zero.
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_millis.max(1))
    }
}

impl BotConfig {
    /// Delay before the bot moves.
    pub fn think_delay(&self) -> Duration {
        Duration::from_millis(self.think_delay_ms)
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}

//! Transport abstraction for the room channel.
//!
//! The channel is a publish/subscribe relay: the client subscribes to its
//! room topic, publishes moves to a fixed send destination, and receives
//! every message broadcast on the topic, including its own.
//!
//! # Design
//!
//! The transport trait is async and connection-oriented:
//! - `connect()` establishes a connection
//! - `subscribe()` joins a topic
//! - `publish()` sends a frame to a destination
//! - `recv()` waits for the next frame on the subscribed topic
//! - `close()` gracefully terminates
//!
//! # Example
//!
//! ```ignore
//! let transport = MockTransport::new();
//! transport.connect("ws://localhost:8080/ws").await?;
//! transport.subscribe("/topic/room/abc").await?;
//! transport.publish("/app/move", &frame).await?;
//! let inbound = transport.recv().await?;
//! ```

mod memory;
mod mock;

pub use memory::{MemoryBroker, MemoryTransport};
pub use mock::{MockTransport, Published};

use async_trait::async_trait;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Not connected.
    #[error("not connected")]
    NotConnected,

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Subscription failed.
    #[error("subscribe failed: {0}")]
    SubscribeFailed(String),

    /// Publish failed.
    #[error("publish failed: {0}")]
    PublishFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),
}

impl TransportError {
    /// Whether the link is gone and must be re-established.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::NotConnected | Self::ConnectionClosed)
    }
}

/// Transport trait for the room channel.
///
/// Implementations handle the underlying mechanism (WebSocket/STOMP,
/// in-memory broker, mock).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to the relay at `address`.
    async fn connect(&self, address: &str) -> Result<(), TransportError>;

    /// Subscribe to `topic`. Replaces any previous subscription.
    async fn subscribe(&self, topic: &str) -> Result<(), TransportError>;

    /// Publish `payload` to `destination`.
    async fn publish(&self, destination: &str, payload: &[u8]) -> Result<(), TransportError>;

    /// Receive the next frame on the subscribed topic.
    ///
    /// Blocks until data is available or the connection closes.
    async fn recv(&self) -> Result<Vec<u8>, TransportError>;

    /// Check if currently connected.
    fn is_connected(&self) -> bool;

    /// Drop the current subscription.
    async fn unsubscribe(&self) -> Result<(), TransportError>;

    /// Close the connection gracefully.
    async fn close(&self) -> Result<(), TransportError>;
}

/// Transport for games with no room channel (the local bot).
///
/// Never connects; `recv` never resolves.
#[derive(Debug, Default, Clone, Copy)]
pub struct Offline;

#[async_trait]
impl Transport for Offline {
    async fn connect(&self, _address: &str) -> Result<(), TransportError> {
        Err(TransportError::ConnectionFailed("offline game".into()))
    }

    async fn subscribe(&self, _topic: &str) -> Result<(), TransportError> {
        Err(TransportError::NotConnected)
    }

    async fn publish(&self, _destination: &str, _payload: &[u8]) -> Result<(), TransportError> {
        Err(TransportError::NotConnected)
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        std::future::pending().await
    }

    fn is_connected(&self) -> bool {
        false
    }

    async fn unsubscribe(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

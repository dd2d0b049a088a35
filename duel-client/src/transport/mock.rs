//! Mock transport for testing.
//!
//! Allows queueing inbound frames and capturing published ones for
//! verification.

use super::{Transport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A frame captured by [`MockTransport::publish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    /// Destination it was sent to.
    pub destination: String,
    /// Raw frame.
    pub payload: Vec<u8>,
}

/// Mock transport for testing.
///
/// `recv()` pops queued frames and reports the connection closed once the
/// queue is empty.
#[derive(Debug, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    connected: bool,
    connected_address: Option<String>,
    subscription: Option<String>,
    published: Vec<Published>,
    receive_queue: VecDeque<Vec<u8>>,
    fail_next_connect: Option<String>,
    fail_next_subscribe: Option<String>,
    fail_next_publish: Option<String>,
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a frame to be returned by the next `recv()` call.
    pub fn queue_inbound(&self, data: Vec<u8>) {
        let mut inner = self.inner.lock().unwrap();
        inner.receive_queue.push_back(data);
    }

    /// Everything published so far.
    pub fn published(&self) -> Vec<Published> {
        let inner = self.inner.lock().unwrap();
        inner.published.clone()
    }

    /// The last published frame.
    pub fn last_published(&self) -> Option<Published> {
        let inner = self.inner.lock().unwrap();
        inner.published.last().cloned()
    }

    /// Get the address that was connected to.
    pub fn connected_address(&self) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner.connected_address.clone()
    }

    /// Current subscription topic.
    pub fn subscription(&self) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner.subscription.clone()
    }

    /// Cause the next connect() to fail with the given error.
    pub fn fail_next_connect(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_connect = Some(error.to_string());
    }

    /// Cause the next subscribe() to fail with the given error.
    pub fn fail_next_subscribe(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_subscribe = Some(error.to_string());
    }

    /// Cause the next publish() to fail with the given error.
    pub fn fail_next_publish(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_publish = Some(error.to_string());
    }

    /// Simulate the relay dropping the connection.
    pub fn drop_connection(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.connected = false;
        inner.subscription = None;
    }

    /// Clear all state (frames, queue, connection).
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        *inner = MockTransportInner::default();
    }
}

impl Clone for MockTransport {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, address: &str) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();

        // Check for forced failure
        if let Some(error) = inner.fail_next_connect.take() {
            return Err(TransportError::ConnectionFailed(error));
        }

        inner.connected = true;
        inner.connected_address = Some(address.to_string());
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();

        if !inner.connected {
            return Err(TransportError::NotConnected);
        }
        if let Some(error) = inner.fail_next_subscribe.take() {
            return Err(TransportError::SubscribeFailed(error));
        }

        inner.subscription = Some(topic.to_string());
        Ok(())
    }

    async fn publish(&self, destination: &str, payload: &[u8]) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();

        if !inner.connected {
            return Err(TransportError::NotConnected);
        }
        if let Some(error) = inner.fail_next_publish.take() {
            return Err(TransportError::PublishFailed(error));
        }

        inner.published.push(Published {
            destination: destination.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        let mut inner = self.inner.lock().unwrap();

        if !inner.connected {
            return Err(TransportError::NotConnected);
        }

        inner
            .receive_queue
            .pop_front()
            .ok_or(TransportError::ConnectionClosed)
    }

    fn is_connected(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.connected
    }

    async fn unsubscribe(&self) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.subscription = None;
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.connected = false;
        inner.subscription = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connects_and_subscribes() {
        let transport = MockTransport::new();
        assert!(!transport.is_connected());

        transport.connect("ws://relay").await.unwrap();
        transport.subscribe("/topic/room/r1").await.unwrap();

        assert!(transport.is_connected());
        assert_eq!(transport.connected_address(), Some("ws://relay".to_string()));
        assert_eq!(transport.subscription(), Some("/topic/room/r1".to_string()));
    }

    #[tokio::test]
    async fn captures_published_frames() {
        let transport = MockTransport::new();
        transport.connect("relay").await.unwrap();

        transport.publish("/app/move", b"one").await.unwrap();
        transport.publish("/app/move", b"two").await.unwrap();

        let published = transport.published();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].payload, b"one");
        assert_eq!(transport.last_published().unwrap().destination, "/app/move");
    }

    #[tokio::test]
    async fn queued_frames_then_closed() {
        let transport = MockTransport::new();
        transport.connect("relay").await.unwrap();
        transport.queue_inbound(b"frame".to_vec());

        assert_eq!(transport.recv().await.unwrap(), b"frame");
        assert!(matches!(
            transport.recv().await,
            Err(TransportError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn publish_without_connect_fails() {
        let transport = MockTransport::new();
        let result = transport.publish("/app/move", b"data").await;
        assert!(matches!(result, Err(TransportError::NotConnected)));
    }

    #[tokio::test]
    async fn forced_failures_are_one_shot() {
        let transport = MockTransport::new();
        transport.fail_next_connect("unreachable");
        assert!(matches!(
            transport.connect("relay").await,
            Err(TransportError::ConnectionFailed(_))
        ));
        transport.connect("relay").await.unwrap();

        transport.fail_next_subscribe("denied");
        assert!(transport.subscribe("t").await.is_err());
        transport.subscribe("t").await.unwrap();

        transport.fail_next_publish("buffer full");
        assert!(matches!(
            transport.publish("d", b"x").await,
            Err(TransportError::PublishFailed(_))
        ));
        transport.publish("d", b"x").await.unwrap();
    }

    #[tokio::test]
    async fn clone_shares_state() {
        let a = MockTransport::new();
        let b = a.clone();
        a.connect("relay").await.unwrap();
        assert!(b.is_connected());
        b.publish("d", b"from b").await.unwrap();
        assert_eq!(a.published().len(), 1);
    }

    #[tokio::test]
    async fn drop_and_reset() {
        let transport = MockTransport::new();
        transport.connect("relay").await.unwrap();
        transport.drop_connection();
        assert!(transport.recv().await.unwrap_err().is_disconnect());

        transport.reset();
        assert!(transport.connected_address().is_none());
        assert!(transport.published().is_empty());
    }
}

//! In-process room relay.
//!
//! [`MemoryBroker`] behaves like the room service's message broker: frames
//! published to the send destination are routed to the topic of the room
//! named in their `roomId`, and every subscriber of that topic receives
//! them, the sender included. Frames published to any other destination go
//! to that destination as a topic.
//!
//! Used for two clients in one process and for driving the client in tests.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{mpsc, Mutex};

use duel_types::MoveMessage;

use super::{Transport, TransportError};

type Subscriber = (u64, mpsc::UnboundedSender<Vec<u8>>);

/// Shared in-memory broker.
#[derive(Debug, Clone)]
pub struct MemoryBroker {
    inner: Arc<BrokerInner>,
}

#[derive(Debug)]
struct BrokerInner {
    send_destination: String,
    topic_prefix: String,
    topics: DashMap<String, Vec<Subscriber>>,
    next_subscriber: AtomicU64,
    accepting: AtomicBool,
}

impl MemoryBroker {
    /// Create a broker that routes `send_destination` frames to
    /// `{topic_prefix}{roomId}`.
    pub fn new(send_destination: impl Into<String>, topic_prefix: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                send_destination: send_destination.into(),
                topic_prefix: topic_prefix.into(),
                topics: DashMap::new(),
                next_subscriber: AtomicU64::new(1),
                accepting: AtomicBool::new(true),
            }),
        }
    }

    /// A new client endpoint on this broker.
    pub fn transport(&self) -> MemoryTransport {
        MemoryTransport {
            broker: self.clone(),
            connected: AtomicBool::new(false),
            subscription: StdMutex::new(None),
            inbox: Mutex::new(None),
        }
    }

    /// Refuse (or accept again) new connections.
    pub fn set_accepting(&self, accepting: bool) {
        self.inner.accepting.store(accepting, Ordering::SeqCst);
    }

    /// Number of live subscribers on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner
            .topics
            .get(topic)
            .map(|subs| subs.iter().filter(|(_, tx)| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    /// Drop every subscription, as if the broker restarted.
    pub fn disconnect_all(&self) {
        self.inner.topics.clear();
        tracing::debug!("memory broker dropped all subscriptions");
    }

    /// Publish `payload` to `destination`. Returns how many subscribers got it.
    pub fn publish(&self, destination: &str, payload: &[u8]) -> usize {
        let topic = self.route(destination, payload);
        let Some(mut subscribers) = self.inner.topics.get_mut(&topic) else {
            tracing::trace!(%topic, "no subscribers");
            return 0;
        };
        subscribers.retain(|(_, tx)| tx.send(payload.to_vec()).is_ok());
        subscribers.len()
    }

    fn route(&self, destination: &str, payload: &[u8]) -> String {
        if destination != self.inner.send_destination {
            return destination.to_string();
        }
        match MoveMessage::from_bytes(payload) {
            Ok(MoveMessage {
                room_id: Some(room),
                ..
            }) => room.topic(&self.inner.topic_prefix),
            _ => {
                tracing::debug!(%destination, "frame without roomId, delivered to destination");
                destination.to_string()
            }
        }
    }

    fn subscribe(&self, topic: &str) -> (u64, mpsc::UnboundedReceiver<Vec<u8>>) {
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .topics
            .entry(topic.to_string())
            .or_default()
            .push((id, tx));
        (id, rx)
    }

    fn unsubscribe(&self, topic: &str, id: u64) {
        if let Some(mut subscribers) = self.inner.topics.get_mut(topic) {
            subscribers.retain(|(sub, _)| *sub != id);
        }
    }
}

/// One client's connection to a [`MemoryBroker`].
#[derive(Debug)]
pub struct MemoryTransport {
    broker: MemoryBroker,
    connected: AtomicBool,
    subscription: StdMutex<Option<(String, u64)>>,
    inbox: Mutex<Option<mpsc::UnboundedReceiver<Vec<u8>>>>,
}

impl MemoryTransport {
    /// The broker this endpoint talks to.
    pub fn broker(&self) -> &MemoryBroker {
        &self.broker
    }

    fn take_subscription(&self) -> Option<(String, u64)> {
        self.subscription
            .lock()
            .map(|mut guard| guard.take())
            .unwrap_or(None)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self, address: &str) -> Result<(), TransportError> {
        if !self.broker.inner.accepting.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionFailed(format!(
                "{address}: broker not accepting"
            )));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        if let Some((old, id)) = self.take_subscription() {
            self.broker.unsubscribe(&old, id);
        }
        let (id, rx) = self.broker.subscribe(topic);
        *self.inbox.lock().await = Some(rx);
        let mut guard = self
            .subscription
            .lock()
            .map_err(|_| TransportError::SubscribeFailed("subscription state poisoned".into()))?;
        *guard = Some((topic.to_string(), id));
        Ok(())
    }

    async fn publish(&self, destination: &str, payload: &[u8]) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.broker.publish(destination, payload);
        Ok(())
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        let mut inbox = self.inbox.lock().await;
        let rx = inbox.as_mut().ok_or(TransportError::NotConnected)?;
        rx.recv().await.ok_or(TransportError::ConnectionClosed)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn unsubscribe(&self) -> Result<(), TransportError> {
        if let Some((topic, id)) = self.take_subscription() {
            self.broker.unsubscribe(&topic, id);
        }
        *self.inbox.lock().await = None;
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.unsubscribe().await?;
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duel_types::{Color, RoomId};

    fn broker() -> MemoryBroker {
        MemoryBroker::new("/app/move", "/topic/room/")
    }

    async fn joined(broker: &MemoryBroker, topic: &str) -> MemoryTransport {
        let t = broker.transport();
        t.connect("memory").await.unwrap();
        t.subscribe(topic).await.unwrap();
        t
    }

    #[tokio::test]
    async fn send_destination_routes_by_room_and_echoes() {
        let broker = broker();
        let white = joined(&broker, "/topic/room/r1").await;
        let black = joined(&broker, "/topic/room/r1").await;
        let other = joined(&broker, "/topic/room/r2").await;

        let frame = MoveMessage::resign(&RoomId::new("r1"), Color::White)
            .to_bytes()
            .unwrap();
        white.publish("/app/move", &frame).await.unwrap();

        assert_eq!(white.recv().await.unwrap(), frame);
        assert_eq!(black.recv().await.unwrap(), frame);
        let nothing =
            tokio::time::timeout(std::time::Duration::from_millis(20), other.recv()).await;
        assert!(nothing.is_err());
    }

    #[tokio::test]
    async fn other_destinations_are_topics() {
        let broker = broker();
        let sub = joined(&broker, "/topic/lobby").await;
        assert_eq!(broker.publish("/topic/lobby", b"hi"), 1);
        assert_eq!(sub.recv().await.unwrap(), b"hi");
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let broker = broker();
        let t = joined(&broker, "/topic/room/r1").await;
        assert_eq!(broker.subscriber_count("/topic/room/r1"), 1);

        t.unsubscribe().await.unwrap();
        assert_eq!(broker.subscriber_count("/topic/room/r1"), 0);
        assert!(matches!(t.recv().await, Err(TransportError::NotConnected)));
    }

    #[tokio::test]
    async fn broker_restart_closes_inboxes() {
        let broker = broker();
        let t = joined(&broker, "/topic/room/r1").await;
        broker.disconnect_all();
        assert!(t.recv().await.unwrap_err().is_disconnect());
    }

    #[tokio::test]
    async fn refused_connection() {
        let broker = broker();
        broker.set_accepting(false);
        let t = broker.transport();
        assert!(matches!(
            t.connect("memory").await,
            Err(TransportError::ConnectionFailed(_))
        ));
        assert!(!t.is_connected());
    }

    #[tokio::test]
    async fn publish_requires_connection() {
        let t = broker().transport();
        assert!(matches!(
            t.publish("/app/move", b"{}").await,
            Err(TransportError::NotConnected)
        ));
    }
}

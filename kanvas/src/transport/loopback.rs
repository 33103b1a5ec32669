//! Loopback event source for testing.
//!
//! Uses an in-process [`tokio::sync::mpsc`] channel in place of a broker
//! connection. [`LoopbackEventSource::create_pair`] returns a publisher and
//! the source it feeds; frames published on topics the source is not
//! subscribed to are discarded on receipt.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex as SyncMutex;
use tokio::sync::{Mutex, mpsc};

use super::{EventSource, Inbound, Topic, TransportError};

/// Sending half of a loopback pair.
#[derive(Debug, Clone)]
pub struct LoopbackPublisher {
    tx: mpsc::Sender<Inbound>,
}

impl LoopbackPublisher {
    /// Publishes `body` on `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionClosed`] if the source was dropped.
    pub async fn publish(&self, topic: Topic, body: impl Into<String>) -> Result<(), TransportError> {
        self.tx
            .send(Inbound {
                topic,
                body: body.into(),
            })
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    /// Whether the receiving source is gone.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// In-process event source backed by `tokio::sync::mpsc`.
pub struct LoopbackEventSource {
    /// Incoming frames (fed by the publisher).
    rx: Mutex<mpsc::Receiver<Inbound>>,
    /// Topics currently delivered.
    topics: SyncMutex<HashSet<Topic>>,
    /// Set once the publisher side is observed gone.
    closed: AtomicBool,
}

impl LoopbackEventSource {
    /// Creates a connected publisher and source.
    ///
    /// `buffer` is the channel capacity.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use kanvas::transport::loopback::LoopbackEventSource;
    /// use kanvas::transport::{EventSource, Topic};
    /// use kanvas_proto::ids::BoardId;
    ///
    /// # async fn example() {
    /// let (publisher, source) = LoopbackEventSource::create_pair(32);
    /// source.subscribe(Topic::Board(BoardId::new(1)));
    /// publisher.publish(Topic::Board(BoardId::new(1)), "{}").await.unwrap();
    /// let frame = source.recv().await.unwrap();
    /// assert_eq!(frame.body, "{}");
    /// # }
    /// ```
    #[must_use]
    pub fn create_pair(buffer: usize) -> (LoopbackPublisher, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        let source = Self {
            rx: Mutex::new(rx),
            topics: SyncMutex::new(HashSet::new()),
            closed: AtomicBool::new(false),
        };
        (LoopbackPublisher { tx }, source)
    }

    /// Topics currently subscribed.
    #[must_use]
    pub fn topics(&self) -> Vec<Topic> {
        self.topics.lock().iter().copied().collect()
    }
}

impl EventSource for LoopbackEventSource {
    fn subscribe(&self, topic: Topic) {
        tracing::debug!(%topic, "subscribed");
        self.topics.lock().insert(topic);
    }

    fn unsubscribe(&self, topic: &Topic) {
        tracing::debug!(%topic, "unsubscribed");
        self.topics.lock().remove(topic);
    }

    async fn recv(&self) -> Result<Inbound, TransportError> {
        let mut rx = self.rx.lock().await;
        loop {
            let Some(frame) = rx.recv().await else {
                self.closed.store(true, Ordering::Release);
                return Err(TransportError::ConnectionClosed);
            };
            let wanted = self.topics.lock().contains(&frame.topic);
            if wanted {
                return Ok(frame);
            }
            tracing::trace!(topic = %frame.topic, "frame for unsubscribed topic discarded");
        }
    }

    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }
}

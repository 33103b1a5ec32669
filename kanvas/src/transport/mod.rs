//! Real-time event source abstraction.
//!
//! An [`EventSource`] delivers text frames from topic subscriptions. The
//! engine subscribes to two topics per session: the board topic carrying
//! [`BoardEvent`](kanvas_proto::event::BoardEvent)s and the viewer's private
//! user topic carrying notifications. Frames are handed over undecoded so a
//! bad frame on one topic never stalls the other.
//!
//! [`loopback::LoopbackEventSource`] is the in-process implementation used by
//! tests and by [`InMemoryBoardService`](crate::remote::memory::InMemoryBoardService).

pub mod loopback;

use std::fmt;
use std::future::Future;

use kanvas_proto::codec::{self, CodecError};
use kanvas_proto::event::NotificationMessage;
use kanvas_proto::ids::{BoardId, UserId};

/// A subscription channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Events for every viewer of a board.
    Board(BoardId),
    /// Notifications for one user.
    User(UserId),
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Board(id) => write!(f, "/topic/board/{id}"),
            Self::User(id) => write!(f, "/topic/user/{id}"),
        }
    }
}

/// One received frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    /// Topic the frame arrived on.
    pub topic: Topic,
    /// Raw JSON body.
    pub body: String,
}

impl Inbound {
    /// Decodes the body as a user-topic notification.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Decode`] if the body is not a notification.
    pub fn decode_notification(&self) -> Result<NotificationMessage, TransportError> {
        Ok(codec::decode_notification(&self.body)?)
    }
}

/// Errors raised by an event source.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The source will deliver no more frames.
    #[error("connection closed")]
    ConnectionClosed,

    /// A frame could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] CodecError),
}

/// Async source of topic frames.
pub trait EventSource: Send + Sync {
    /// Starts delivering frames for `topic`.
    fn subscribe(&self, topic: Topic);

    /// Stops delivering frames for `topic`.
    fn unsubscribe(&self, topic: &Topic);

    /// Receives the next frame on any subscribed topic.
    fn recv(&self) -> impl Future<Output = Result<Inbound, TransportError>> + Send;

    /// Whether frames can still arrive.
    fn is_connected(&self) -> bool;
}

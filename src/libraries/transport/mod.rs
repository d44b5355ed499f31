//! Publish/subscribe transports
//!
//! A [`Transport`] hands payloads to every current subscriber of a named channel and opens
//! [`Subscription`]s which yield the raw events of a channel. Delivery is best-effort and
//! at-most-once: payloads published while nobody listens are lost and subscriptions never
//! observe anything published before they were established.
//!
//! Two implementations are provided, [`RedisTransport`] which talks to a Redis server and
//! [`MemoryTransport`] which keeps everything within the current process.

use super::BoxedError;
use async_trait::async_trait;
use std::{fmt, sync::Arc};
use thiserror::Error;

mod memory;
mod redis;

pub use self::memory::MemoryTransport;
pub use self::redis::RedisTransport;

/// Errors raised while talking to the bus
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection could not be established
    #[error("transport is unavailable")]
    Unavailable(#[source] BoxedError),
    /// Established connection has been dropped
    #[error("connection to transport lost while subscribed to '{0}'")]
    ConnectionLost(String),
    /// Publish has been rejected on an established connection
    #[error("failed to publish to '{channel}'")]
    PublishFailed {
        channel: String,
        #[source]
        source: BoxedError,
    },
    /// Received event did not have the expected shape
    #[error("malformed event on '{channel}': {reason}")]
    MalformedEvent { channel: String, reason: String },
}

impl TransportError {
    /// Whether the error originates from a missing or broken connection
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            TransportError::Unavailable(_) | TransportError::ConnectionLost(_)
        )
    }
}

/// Kind of event observed on a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Subscription has been confirmed
    Subscribe,
    /// Subscription has been released
    Unsubscribe,
    /// Payload published to the channel
    Message,
    /// Payload received through a pattern subscription
    PatternMessage,
    /// Anything else the transport reports
    Other,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Subscribe => "subscribe",
            EventKind::Unsubscribe => "unsubscribe",
            EventKind::Message => "message",
            EventKind::PatternMessage => "pmessage",
            EventKind::Other => "other",
        };

        write!(f, "{}", name)
    }
}

/// Raw event received on a subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEvent {
    pub kind: EventKind,
    pub channel: String,
    pub payload: Option<String>,
}

impl TransportEvent {
    /// Creates a message event carrying the given payload
    pub fn message(channel: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Message,
            channel: channel.into(),
            payload: Some(payload.into()),
        }
    }
}

/// Acknowledgement of a publish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    /// Number of subscribers that received the payload
    pub receivers: u64,
}

/// Live binding to a single channel
///
/// Dropping the subscription releases it on the transport.
#[async_trait]
pub trait Subscription: Send {
    /// Channel this subscription is bound to
    fn channel(&self) -> &str;

    /// Waits for the next event. Returns `None` once the subscription is closed,
    /// a lost connection is reported as an error exactly once beforehand.
    async fn next_event(&mut self) -> Option<Result<TransportEvent, TransportError>>;
}

pub type BoxedSubscription = Box<dyn Subscription>;

/// Publish/subscribe bus
#[async_trait]
pub trait Transport {
    /// Hands the payload to all current subscribers of the channel
    async fn publish(&self, channel: &str, payload: &str) -> Result<Delivery, TransportError>;

    /// Establishes a new subscription to the channel
    async fn subscribe(&self, channel: &str) -> Result<BoxedSubscription, TransportError>;
}

/// Transport which can be shared between tasks
pub type SharedTransport = Arc<dyn Transport + Send + Sync>;

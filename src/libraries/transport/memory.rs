use super::{
    BoxedSubscription, Delivery, EventKind, Subscription, Transport, TransportError,
    TransportEvent,
};
use async_trait::async_trait;
use futures::lock::Mutex;
use log::{debug, warn};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::broadcast::{self, error::RecvError};

const DEFAULT_CAPACITY: usize = 1024;

type Channels = Arc<Mutex<HashMap<String, broadcast::Sender<String>>>>;

/// In-process transport backed by tokio broadcast channels
///
/// Each channel with at least one subscriber owns a broadcast sender. Subscribers that fall
/// more than `capacity` payloads behind skip the ones they missed.
#[derive(Clone)]
pub struct MemoryTransport {
    channels: Channels,
    capacity: usize,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport whose channels buffer up to `capacity` payloads per subscriber
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Number of live subscriptions to the given channel
    pub async fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .lock()
            .await
            .get(channel)
            .map(broadcast::Sender::receiver_count)
            .unwrap_or(0)
    }

    /// Drops every subscription as if the connection to a server had been lost
    pub async fn shutdown(&self) {
        self.channels.lock().await.clear();
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn publish(&self, channel: &str, payload: &str) -> Result<Delivery, TransportError> {
        let mut channels = self.channels.lock().await;

        let receivers = match channels.get(channel) {
            Some(tx) => tx.send(payload.to_owned()).unwrap_or(0),
            None => 0,
        };

        if receivers == 0 {
            channels.remove(channel);
        }

        Ok(Delivery {
            receivers: receivers as u64,
        })
    }

    async fn subscribe(&self, channel: &str) -> Result<BoxedSubscription, TransportError> {
        let capacity = self.capacity;
        let rx = self
            .channels
            .lock()
            .await
            .entry(channel.to_owned())
            .or_insert_with(|| broadcast::channel(capacity).0)
            .subscribe();

        debug!("Subscribed to {} in memory", channel);

        Ok(Box::new(MemorySubscription {
            channel: channel.to_owned(),
            rx,
            confirmed: false,
            closed: false,
        }))
    }
}

struct MemorySubscription {
    channel: String,
    rx: broadcast::Receiver<String>,
    confirmed: bool,
    closed: bool,
}

#[async_trait]
impl Subscription for MemorySubscription {
    fn channel(&self) -> &str {
        &self.channel
    }

    async fn next_event(&mut self) -> Option<Result<TransportEvent, TransportError>> {
        if self.closed {
            return None;
        }

        // Mirror the confirmation frame a server sends for every subscribe
        if !self.confirmed {
            self.confirmed = true;
            return Some(Ok(TransportEvent {
                kind: EventKind::Subscribe,
                channel: self.channel.clone(),
                payload: Some("1".to_owned()),
            }));
        }

        loop {
            match self.rx.recv().await {
                Ok(payload) => return Some(Ok(TransportEvent::message(&self.channel, payload))),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Subscriber of {} lagged behind, skipped {} messages", self.channel, skipped);
                }
                Err(RecvError::Closed) => {
                    self.closed = true;
                    return Some(Err(TransportError::ConnectionLost(self.channel.clone())));
                }
            }
        }
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn skip_confirmation(subscription: &mut BoxedSubscription) {
        let event = subscription.next_event().await.unwrap().unwrap();
        assert_eq!(event.kind, EventKind::Subscribe);
    }

    #[tokio::test]
    async fn confirm_subscriptions() {
        let transport = MemoryTransport::new();
        let mut subscription = transport.subscribe("a").await.unwrap();

        assert_eq!(subscription.channel(), "a");
        assert_eq!(
            subscription.next_event().await.unwrap().unwrap(),
            TransportEvent {
                kind: EventKind::Subscribe,
                channel: "a".to_owned(),
                payload: Some("1".to_owned()),
            }
        );
    }

    #[tokio::test]
    async fn deliver_to_subscribers() {
        let transport = MemoryTransport::new();
        let mut first = transport.subscribe("a").await.unwrap();
        let mut second = transport.subscribe("a").await.unwrap();
        skip_confirmation(&mut first).await;
        skip_confirmation(&mut second).await;

        let delivery = transport.publish("a", "hello").await.unwrap();

        assert_eq!(delivery.receivers, 2);
        assert_eq!(
            first.next_event().await.unwrap().unwrap(),
            TransportEvent::message("a", "hello")
        );
        assert_eq!(
            second.next_event().await.unwrap().unwrap(),
            TransportEvent::message("a", "hello")
        );
    }

    #[tokio::test]
    async fn drop_payloads_without_subscribers() {
        let transport = MemoryTransport::new();

        let delivery = transport.publish("a", "lost").await.unwrap();
        assert_eq!(delivery.receivers, 0);

        let mut late = transport.subscribe("a").await.unwrap();
        skip_confirmation(&mut late).await;
        transport.publish("a", "seen").await.unwrap();

        assert_eq!(
            late.next_event().await.unwrap().unwrap().payload.as_deref(),
            Some("seen")
        );
    }

    #[tokio::test]
    async fn isolate_channels() {
        let transport = MemoryTransport::new();
        let mut subscription = transport.subscribe("a").await.unwrap();
        skip_confirmation(&mut subscription).await;

        assert_eq!(transport.publish("b", "other").await.unwrap().receivers, 0);
        transport.publish("a", "mine").await.unwrap();

        assert_eq!(
            subscription.next_event().await.unwrap().unwrap().payload.as_deref(),
            Some("mine")
        );
    }

    #[tokio::test]
    async fn release_dropped_subscriptions() {
        let transport = MemoryTransport::new();
        let subscription = transport.subscribe("a").await.unwrap();
        assert_eq!(transport.subscriber_count("a").await, 1);

        drop(subscription);

        assert_eq!(transport.subscriber_count("a").await, 0);
        assert_eq!(transport.publish("a", "nobody").await.unwrap().receivers, 0);
    }

    #[tokio::test]
    async fn skip_lagged_payloads() {
        let transport = MemoryTransport::with_capacity(2);
        let mut subscription = transport.subscribe("a").await.unwrap();
        skip_confirmation(&mut subscription).await;

        for payload in &["1", "2", "3", "4"] {
            transport.publish("a", payload).await.unwrap();
        }

        assert_eq!(
            subscription.next_event().await.unwrap().unwrap().payload.as_deref(),
            Some("3")
        );
    }

    #[tokio::test]
    async fn report_lost_connection_once() {
        let transport = MemoryTransport::new();
        let mut subscription = transport.subscribe("a").await.unwrap();
        skip_confirmation(&mut subscription).await;

        transport.shutdown().await;

        assert!(matches!(
            subscription.next_event().await,
            Some(Err(TransportError::ConnectionLost(channel))) if channel == "a"
        ));
        assert!(subscription.next_event().await.is_none());
    }
}

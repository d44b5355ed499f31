use super::{
    BoxedSubscription, Delivery, EventKind, Subscription, Transport, TransportError,
    TransportEvent,
};
use async_trait::async_trait;
use futures::{lock::Mutex, StreamExt};
use log::{debug, info, warn};
use redis::{aio::MultiplexedConnection, Client, Msg, RedisError};
use std::time::Duration;
use tokio::{sync::mpsc, time::timeout};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const SUBSCRIPTION_BUFFER: usize = 128;

/// Transport using [Redis Pub/Sub](https://redis.io/topics/pubsub)
///
/// Publishes share one multiplexed connection which is re-established lazily after it has been
/// lost. Every subscription uses a dedicated connection since Redis puts connections into a
/// subscriber-only mode.
pub struct RedisTransport {
    client: Client,
    connection: Mutex<Option<MultiplexedConnection>>,
    connect_timeout: Duration,
}

impl RedisTransport {
    /// Creates a new transport for the given URL, connections are established on first use
    pub fn new(url: &str) -> Result<Self, TransportError> {
        let client = Client::open(url).map_err(|e| TransportError::Unavailable(Box::new(e)))?;

        Ok(Self {
            client,
            connection: Mutex::new(None),
            connect_timeout: CONNECT_TIMEOUT,
        })
    }

    /// Overrides how long establishing a connection may take
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    async fn shared_connection(&self) -> Result<MultiplexedConnection, TransportError> {
        let mut cached = self.connection.lock().await;

        if let Some(connection) = cached.as_ref() {
            return Ok(connection.clone());
        }

        let connection = timeout(
            self.connect_timeout,
            self.client.get_multiplexed_tokio_connection(),
        )
        .await
        .map_err(|e| TransportError::Unavailable(Box::new(e)))?
        .map_err(|e| TransportError::Unavailable(Box::new(e)))?;

        info!("Established shared redis connection");
        *cached = Some(connection.clone());

        Ok(connection)
    }

    async fn invalidate_connection(&self) {
        self.connection.lock().await.take();
    }
}

/// Maps errors on an established connection, connection level failures count as unavailability
fn classify(channel: &str, error: RedisError) -> TransportError {
    if error.is_connection_dropped()
        || error.is_connection_refusal()
        || error.is_io_error()
        || error.is_timeout()
    {
        TransportError::Unavailable(Box::new(error))
    } else {
        TransportError::PublishFailed {
            channel: channel.to_owned(),
            source: Box::new(error),
        }
    }
}

fn event_from(message: &Msg) -> TransportEvent {
    let kind = if message.from_pattern() {
        EventKind::PatternMessage
    } else {
        EventKind::Message
    };

    TransportEvent {
        kind,
        channel: message.get_channel_name().to_owned(),
        payload: message.get_payload::<String>().ok(),
    }
}

#[async_trait]
impl Transport for RedisTransport {
    async fn publish(&self, channel: &str, payload: &str) -> Result<Delivery, TransportError> {
        let mut connection = self.shared_connection().await?;

        let result = redis::cmd("PUBLISH")
            .arg(channel)
            .arg(payload)
            .query_async::<_, u64>(&mut connection)
            .await;

        match result {
            Ok(receivers) => Ok(Delivery { receivers }),
            Err(e) => {
                let error = classify(channel, e);

                if error.is_unavailable() {
                    warn!("Lost publishing connection to redis");
                    self.invalidate_connection().await;
                }

                Err(error)
            }
        }
    }

    async fn subscribe(&self, channel: &str) -> Result<BoxedSubscription, TransportError> {
        let connection = timeout(self.connect_timeout, self.client.get_async_connection())
            .await
            .map_err(|e| TransportError::Unavailable(Box::new(e)))?
            .map_err(|e| TransportError::Unavailable(Box::new(e)))?;

        let mut pubsub = connection.into_pubsub();
        pubsub
            .subscribe(channel)
            .await
            .map_err(|e| TransportError::Unavailable(Box::new(e)))?;

        debug!("Subscribed to {} on redis", channel);

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let name = channel.to_owned();

        // Owns the connection until either the stream ends or the subscription is dropped
        tokio::spawn(async move {
            let mut messages = pubsub.on_message();

            loop {
                tokio::select! {
                    message = messages.next() => match message {
                        Some(message) => {
                            if tx.send(Ok(event_from(&message))).await.is_err() {
                                break;
                            }
                        }
                        None => {
                            tx.send(Err(TransportError::ConnectionLost(name.clone()))).await.ok();
                            break;
                        }
                    },
                    _ = tx.closed() => break,
                }
            }

            debug!("Released subscription to {}", name);
        });

        Ok(Box::new(RedisSubscription {
            channel: channel.to_owned(),
            rx,
        }))
    }
}

struct RedisSubscription {
    channel: String,
    rx: mpsc::Receiver<Result<TransportEvent, TransportError>>,
}

#[async_trait]
impl Subscription for RedisSubscription {
    fn channel(&self) -> &str {
        &self.channel
    }

    async fn next_event(&mut self) -> Option<Result<TransportEvent, TransportError>> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use redis::ErrorKind;
    use std::io;

    #[test]
    fn treat_io_errors_as_unavailable() {
        let error = RedisError::from(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));

        assert!(matches!(
            classify("channel_1", error),
            TransportError::Unavailable(_)
        ));
    }

    #[test]
    fn treat_protocol_errors_as_publish_failures() {
        let error = RedisError::from((ErrorKind::ResponseError, "WRONGTYPE"));

        assert!(matches!(
            classify("channel_1", error),
            TransportError::PublishFailed { channel, .. } if channel == "channel_1"
        ));
    }

    #[test]
    fn reject_invalid_urls() {
        assert!(matches!(
            RedisTransport::new("definitely not a url"),
            Err(TransportError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn report_unreachable_servers() {
        let transport = RedisTransport::new("redis://127.0.0.1:1/")
            .unwrap()
            .with_connect_timeout(Duration::from_millis(500));

        let publish = transport.publish("channel_1", "payload").await;
        assert!(matches!(publish, Err(TransportError::Unavailable(_))));

        let subscribe = transport.subscribe("channel_1").await;
        assert!(matches!(subscribe, Err(TransportError::Unavailable(_))));
    }
}

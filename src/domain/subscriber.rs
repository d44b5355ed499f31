use super::channel::Channel;
use crate::libraries::transport::{
    BoxedSubscription, EventKind, SharedTransport, TransportError, TransportEvent,
};
use futures::stream::{self, BoxStream, StreamExt};
use log::{debug, info};

/// Lazy, infinite sequence of payloads received on one channel
///
/// Ends after yielding a single error when the underlying connection is lost.
pub type PayloadStream = BoxStream<'static, Result<String, TransportError>>;

/// Opens channel subscriptions and strips everything but payloads from them
#[derive(Clone)]
pub struct Subscriber {
    transport: SharedTransport,
}

impl Subscriber {
    pub fn new(transport: SharedTransport) -> Self {
        Self { transport }
    }

    /// Subscribes to the channel. Dropping the returned stream releases the subscription.
    pub async fn subscribe(&self, channel: &Channel) -> Result<PayloadStream, TransportError> {
        let subscription = self.transport.subscribe(channel.name()).await?;
        info!("Subscribed to {}", channel);

        Ok(payloads(subscription))
    }
}

fn payloads(subscription: BoxedSubscription) -> PayloadStream {
    stream::unfold(subscription, |mut subscription| async move {
        loop {
            match subscription.next_event().await? {
                Ok(event) => match payload_of(event) {
                    Ok(Some(payload)) => return Some((Ok(payload), subscription)),
                    Ok(None) => continue,
                    Err(e) => debug!("Dropping event: {}", e),
                },
                Err(e) => return Some((Err(e), subscription)),
            }
        }
    })
    .boxed()
}

/// Extracts the payload of message events, other event kinds yield nothing
fn payload_of(event: TransportEvent) -> Result<Option<String>, TransportError> {
    if event.kind != EventKind::Message {
        return Ok(None);
    }

    match event.payload {
        Some(payload) => Ok(Some(payload)),
        None => Err(TransportError::MalformedEvent {
            channel: event.channel,
            reason: "message without payload".to_owned(),
        }),
    }
}

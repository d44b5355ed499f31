use super::channel::Channel;
use crate::libraries::transport::{Delivery, SharedTransport, TransportError};
use log::info;

/// Hands payloads to the transport without retrying
#[derive(Clone)]
pub struct Publisher {
    transport: SharedTransport,
}

impl Publisher {
    pub fn new(transport: SharedTransport) -> Self {
        Self { transport }
    }

    /// Publishes the payload to all current subscribers of the channel.
    /// Payloads published without any subscriber are lost.
    pub async fn publish(&self, channel: &Channel, payload: &str) -> Result<Delivery, TransportError> {
        let delivery = self.transport.publish(channel.name(), payload).await?;

        info!(
            "Published message to {}: {} ({} receivers)",
            channel, payload, delivery.receivers
        );

        Ok(delivery)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libraries::transport::{MemoryTransport, Transport};
    use std::sync::Arc;

    #[tokio::test]
    async fn count_receivers() {
        let transport = Arc::new(MemoryTransport::new());
        let publisher = Publisher::new(transport.clone());
        let channel = Channel::numbered(1);

        let _subscription = transport.subscribe(channel.name()).await.unwrap();

        assert_eq!(publisher.publish(&channel, "a").await.unwrap().receivers, 1);
        assert_eq!(
            publisher
                .publish(&Channel::numbered(2), "b")
                .await
                .unwrap()
                .receivers,
            0
        );
    }
}

use super::channel::{ChannelPool, Sequence};
use super::message::{Message, MessageSource, RealtimeMessages};
use super::publisher::Publisher;
use crate::libraries::helpers::Pacing;
use crate::libraries::transport::TransportError;
use log::{debug, info};
use std::{future::Future, sync::Arc};

/// Producer loop distributing generated messages round-robin over a [`ChannelPool`]
///
/// Every iteration assigns the channel for the current sequence number, builds the content and
/// publishes it. The sequence only advances once the publish succeeded, a failed or abandoned
/// publish is repeated with the same sequence number by the next run. Sequence numbers start at
/// one and keep increasing for the lifetime of the dispatcher, also across multiple runs.
pub struct Dispatcher {
    pool: ChannelPool,
    source: Arc<dyn MessageSource>,
    pacing: Pacing,
    limit: Option<u64>,
    sequence: Sequence,
}

impl Dispatcher {
    pub fn new(pool: ChannelPool, pacing: Pacing) -> Self {
        Self {
            pool,
            source: Arc::new(RealtimeMessages),
            pacing,
            limit: None,
            sequence: Sequence::first(),
        }
    }

    /// Replaces the default `Real-time Message <k>` contents
    pub fn with_source(mut self, source: impl MessageSource + 'static) -> Self {
        self.source = Arc::new(source);
        self
    }

    /// Stops dispatching once the given number of messages has been published in total
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Builds the message for the current sequence number without advancing it
    pub fn next_message(&self) -> Message {
        Message {
            sequence: self.sequence,
            channel: self.pool.channel_for(self.sequence),
            content: self.source.content(self.sequence),
        }
    }

    fn advance(&mut self) {
        self.sequence = self.sequence.next();
    }

    /// Number of messages published so far
    pub fn dispatched(&self) -> u64 {
        self.sequence.get() - 1
    }

    /// Whether the configured limit has been reached
    pub fn is_exhausted(&self) -> bool {
        self.limit
            .map(|limit| self.dispatched() >= limit)
            .unwrap_or(false)
    }

    /// Publishes messages until the termination future resolves or the limit has been reached.
    /// Returns the number of messages published during this run.
    ///
    /// A publish that is in flight when termination is requested is abandoned.
    pub async fn run<T>(&mut self, publisher: &Publisher, termination: T) -> Result<u64, TransportError>
    where
        T: Future<Output = ()>,
    {
        tokio::pin!(termination);

        let mut published = 0;
        info!("Dispatching over {} channels", self.pool.size());

        loop {
            if self.is_exhausted() {
                debug!("Dispatch limit of {} messages reached", self.dispatched());
                break;
            }

            let message = self.next_message();

            tokio::select! {
                biased;
                _ = &mut termination => break,
                result = publisher.publish(&message.channel, &message.content) => { result?; }
            }

            self.advance();
            published += 1;

            tokio::select! {
                biased;
                _ = &mut termination => break,
                _ = self.pacing.pause() => {}
            }
        }

        info!("Dispatcher stopped after {} messages", published);
        Ok(published)
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use crate::domain::channel::Channel;
    use crate::domain::subscriber::Subscriber;
    use crate::libraries::testing::FlakyTransport;
    use crate::libraries::transport::{MemoryTransport, Transport, TransportEvent};
    use futures::{future, StreamExt};
    use pretty_assertions::assert_eq;
    use std::{num::NonZeroU64, time::Duration};

    fn pool(size: u64) -> ChannelPool {
        ChannelPool::new(NonZeroU64::new(size).unwrap())
    }

    #[test]
    fn build_messages_round_robin() {
        let mut dispatcher = Dispatcher::new(pool(3), Pacing::none());

        let channels: Vec<String> = (0..4)
            .map(|_| {
                let channel = dispatcher.next_message().channel.to_string();
                dispatcher.advance();
                channel
            })
            .collect();

        assert_eq!(channels, vec!["channel_1", "channel_2", "channel_3", "channel_1"]);
        assert_eq!(dispatcher.dispatched(), 4);
    }

    #[test]
    fn keep_sequence_until_advanced() {
        let dispatcher = Dispatcher::new(pool(3), Pacing::none());

        assert_eq!(dispatcher.next_message(), dispatcher.next_message());
        assert_eq!(dispatcher.dispatched(), 0);
    }

    #[test]
    fn use_custom_sources() {
        let dispatcher = Dispatcher::new(pool(2), Pacing::none())
            .with_source(|sequence: Sequence| format!("custom {}", sequence));

        assert_eq!(dispatcher.next_message().content, "custom 1");
    }

    #[tokio::test]
    async fn publish_in_order_until_limit() {
        let transport = Arc::new(MemoryTransport::new());
        let publisher = Publisher::new(transport.clone());
        let mut subscription = transport.subscribe("channel_2").await.unwrap();
        subscription.next_event().await;

        let mut dispatcher = Dispatcher::new(pool(2), Pacing::none()).with_limit(4);
        let published = dispatcher
            .run(&publisher, future::pending())
            .await
            .unwrap();

        assert_eq!(published, 4);
        assert_eq!(
            subscription.next_event().await.unwrap().unwrap(),
            TransportEvent::message("channel_2", "Real-time Message 2")
        );
        assert_eq!(
            subscription.next_event().await.unwrap().unwrap(),
            TransportEvent::message("channel_2", "Real-time Message 4")
        );
    }

    #[tokio::test]
    async fn honour_limit_across_runs() {
        let transport = Arc::new(MemoryTransport::new());
        let publisher = Publisher::new(transport);

        let mut dispatcher = Dispatcher::new(pool(10), Pacing::none()).with_limit(3);
        assert_eq!(dispatcher.run(&publisher, future::pending()).await.unwrap(), 3);
        assert_eq!(dispatcher.run(&publisher, future::pending()).await.unwrap(), 0);

        assert!(dispatcher.is_exhausted());
        assert_eq!(dispatcher.dispatched(), 3);
        assert_eq!(dispatcher.next_message().channel, Channel::numbered(4));
    }

    #[tokio::test]
    async fn retry_failed_sequence_on_next_run() {
        let transport = Arc::new(FlakyTransport::failing_publish(2));
        let publisher = Publisher::new(transport.clone());
        let mut payloads = Subscriber::new(transport.clone())
            .subscribe(&Channel::numbered(1))
            .await
            .unwrap();

        let mut dispatcher = Dispatcher::new(pool(1), Pacing::none()).with_limit(3);
        assert!(dispatcher.run(&publisher, future::pending()).await.is_err());
        assert_eq!(dispatcher.dispatched(), 1);
        assert_eq!(dispatcher.next_message().content, "Real-time Message 2");

        assert_eq!(dispatcher.run(&publisher, future::pending()).await.unwrap(), 2);

        let mut received = Vec::new();
        for _ in 0..3 {
            received.push(payloads.next().await.unwrap().unwrap());
        }
        assert_eq!(
            received,
            vec!["Real-time Message 1", "Real-time Message 2", "Real-time Message 3"]
        );
    }

    #[tokio::test]
    async fn stop_on_termination() {
        let transport = Arc::new(MemoryTransport::new());
        let publisher = Publisher::new(transport);
        let pacing = Pacing::new(Duration::from_secs(60), Duration::from_secs(60)).unwrap();

        let mut dispatcher = Dispatcher::new(pool(10), pacing);
        let published = tokio::time::timeout(
            Duration::from_secs(5),
            dispatcher.run(&publisher, tokio::time::sleep(Duration::from_millis(20))),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(published, 1);
    }

    #[tokio::test]
    async fn do_not_publish_when_already_terminated() {
        let transport = Arc::new(MemoryTransport::new());
        let publisher = Publisher::new(transport);

        let mut dispatcher = Dispatcher::new(pool(10), Pacing::none());
        let published = dispatcher.run(&publisher, future::ready(())).await.unwrap();

        assert_eq!(published, 0);
    }
}

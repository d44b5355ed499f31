use super::channel::Channel;
use super::subscriber::{PayloadStream, Subscriber};
use crate::libraries::helpers::Pacing;
use crate::libraries::transport::TransportError;
use crate::libraries::{BoxedError, EmptyResult};
use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, info};
use std::{future::Future, sync::Arc};
use thiserror::Error;

/// Processing step applied to every received payload
#[async_trait]
pub trait Sink: Send + Sync {
    async fn process(&self, channel: &Channel, payload: String) -> EmptyResult;
}

/// Sink that writes every payload to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl Sink for LogSink {
    async fn process(&self, channel: &Channel, payload: String) -> EmptyResult {
        info!("Received message on {}: {}", channel, payload);
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum ListenerError {
    #[error("subscription failed")]
    Transport(#[from] TransportError),
    #[error("sink rejected payload")]
    Sink(#[source] BoxedError),
    #[error("subscription to '{0}' ended unexpectedly")]
    StreamEnded(String),
}

/// Consumer loop draining the subscription of a single channel
#[derive(Clone)]
pub struct Listener {
    channel: Channel,
    sink: Arc<dyn Sink>,
    pacing: Pacing,
}

impl Listener {
    pub fn new(channel: Channel, pacing: Pacing) -> Self {
        Self {
            channel,
            sink: Arc::new(LogSink),
            pacing,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Subscribes and drains the channel until terminated or the transport fails
    pub async fn run<T>(&self, subscriber: &Subscriber, termination: T) -> Result<u64, ListenerError>
    where
        T: Future<Output = ()>,
    {
        let payloads = subscriber.subscribe(&self.channel).await?;
        self.drain(payloads, termination).await
    }

    /// Applies the sink to every payload of an established subscription.
    /// Returns the number of processed payloads once the termination future resolves.
    ///
    /// The subscription is released when this function returns, regardless of the outcome.
    pub async fn drain<T>(&self, mut payloads: PayloadStream, termination: T) -> Result<u64, ListenerError>
    where
        T: Future<Output = ()>,
    {
        tokio::pin!(termination);
        let mut processed = 0;

        loop {
            let payload = tokio::select! {
                biased;
                _ = &mut termination => break,
                next = payloads.next() => match next {
                    Some(payload) => payload?,
                    None => return Err(ListenerError::StreamEnded(self.channel.to_string())),
                },
            };

            self.sink
                .process(&self.channel, payload)
                .await
                .map_err(ListenerError::Sink)?;
            processed += 1;

            tokio::select! {
                biased;
                _ = &mut termination => break,
                _ = self.pacing.pause() => {}
            }
        }

        debug!("Listener on {} stopped after {} messages", self.channel, processed);
        Ok(processed)
    }
}

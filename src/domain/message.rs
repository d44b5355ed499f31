use super::channel::{Channel, Sequence};
use serde::{Deserialize, Serialize};

/// Generated message about to be dispatched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub sequence: Sequence,
    pub channel: Channel,
    pub content: String,
}

/// Produces the payload for a given sequence number
pub trait MessageSource: Send + Sync {
    fn content(&self, sequence: Sequence) -> String;
}

/// Default source yielding `Real-time Message <k>`
#[derive(Debug, Clone, Copy, Default)]
pub struct RealtimeMessages;

impl MessageSource for RealtimeMessages {
    fn content(&self, sequence: Sequence) -> String {
        format!("Real-time Message {}", sequence)
    }
}

impl<F> MessageSource for F
where
    F: Fn(Sequence) -> String + Send + Sync,
{
    fn content(&self, sequence: Sequence) -> String {
        self(sequence)
    }
}

/// Externally created message targeted at an explicit channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub channel: Channel,
    pub content: String,
}

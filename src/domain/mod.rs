//! Message dispatch domain
//!
//! Messages are generated with increasing sequence numbers and distributed round-robin over a
//! fixed [`ChannelPool`] by the [`Dispatcher`]. Independently, [`Listener`]s subscribe to single
//! channels and feed every received payload into a [`Sink`]. Both sides only interact through a
//! [`Transport`](crate::libraries::transport::Transport).

mod channel;
mod dispatcher;
mod listener;
mod message;
mod publisher;
mod subscriber;

pub use channel::{assign, Channel, ChannelPool, Sequence, CHANNEL_PREFIX, DEFAULT_CHANNEL_COUNT};
pub use dispatcher::Dispatcher;
pub use listener::{Listener, ListenerError, LogSink, Sink};
pub use message::{Message, MessageRecord, MessageSource, RealtimeMessages};
pub use publisher::Publisher;
pub use subscriber::{PayloadStream, Subscriber};

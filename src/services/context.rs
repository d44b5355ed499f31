use super::options::{ConfigError, SharedOptions, TransportKind};
use crate::domain::{ChannelPool, Publisher, Subscriber};
use crate::libraries::transport::{MemoryTransport, RedisTransport, SharedTransport};
use log::info;
use std::sync::Arc;

/// Handles shared by all jobs and tasks of a process
#[derive(Clone)]
pub struct Context {
    pub transport: SharedTransport,
    pub pool: ChannelPool,
}

impl Context {
    pub fn new(transport: SharedTransport, pool: ChannelPool) -> Self {
        Self { transport, pool }
    }

    pub fn from_options(options: &SharedOptions) -> Result<Self, ConfigError> {
        let transport: SharedTransport = match options.transport {
            TransportKind::Redis => {
                info!("Using redis transport at {}", options.redis);
                Arc::new(RedisTransport::new(&options.redis)?)
            }
            TransportKind::Memory => {
                info!("Using in-memory transport");
                Arc::new(MemoryTransport::new())
            }
        };

        Ok(Self::new(transport, options.pool()))
    }

    pub fn publisher(&self) -> Publisher {
        Publisher::new(self.transport.clone())
    }

    pub fn subscriber(&self) -> Subscriber {
        Subscriber::new(self.transport.clone())
    }
}

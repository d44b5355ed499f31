use crate::domain::ChannelPool;
use crate::libraries::helpers::{parse_seconds, PacingError};
use crate::libraries::lifecycle::{Heart, HeartStone};
use crate::libraries::transport::TransportError;
use std::{num::NonZeroU64, str::FromStr, time::Duration};
use structopt::StructOpt;
use thiserror::Error;

/// Port used by the status server when the flag is passed without a value
pub const DEFAULT_STATUS_PORT: u16 = 47002;

/// Invalid configuration detected during startup
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unknown transport '{0}', expected 'redis' or 'memory'")]
    UnknownTransport(String),
    #[error("invalid pacing bounds")]
    Pacing(#[from] PacingError),
    #[error("unable to set up transport")]
    Transport(#[from] TransportError),
}

/// Bus implementation messages travel over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Redis,
    /// Only reaches listeners within the same process
    Memory,
}

impl FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "redis" => Ok(TransportKind::Redis),
            "memory" => Ok(TransportKind::Memory),
            _ => Err(ConfigError::UnknownTransport(s.to_owned())),
        }
    }
}

#[derive(Debug, StructOpt)]
pub struct SharedOptions {
    /// Redis database server URL
    #[structopt(
        short,
        long,
        global = true,
        env,
        default_value = "redis://redis:6379/0",
        value_name = "url"
    )]
    pub redis: String,

    /// Pub/sub transport to use, either redis or memory
    #[structopt(
        short,
        long,
        global = true,
        env,
        default_value = "redis",
        value_name = "kind"
    )]
    pub transport: TransportKind,

    /// Number of channels messages are distributed over
    #[structopt(
        short,
        long,
        global = true,
        env,
        default_value = "10",
        value_name = "count"
    )]
    pub channels: NonZeroU64,

    /// Enable status reporting server with optional port.
    ///
    /// If the flag is used without a port it will default to 47002.
    #[structopt(long, global = true, env, value_name = "port")]
    pub status_server: Option<Option<u16>>,

    /// Shut down after the given number of seconds
    #[structopt(long, global = true, env, value_name = "seconds", parse(try_from_str = parse_seconds))]
    pub lifetime: Option<Duration>,

    /// Log level, scopable to different modules
    ///
    /// Levels: trace, debug, info, warn, error
    #[structopt(
        short,
        long,
        global = true,
        default_value = "info",
        env = "RUST_LOG",
        value_name = "level"
    )]
    pub log: String,
}

impl SharedOptions {
    pub fn pool(&self) -> ChannelPool {
        ChannelPool::new(self.channels)
    }

    pub fn status_port(&self) -> Option<u16> {
        self.status_server
            .map(|port| port.unwrap_or(DEFAULT_STATUS_PORT))
    }

    /// Heart which honors the configured lifetime
    pub fn heart(&self) -> (Heart, HeartStone) {
        match self.lifetime {
            Some(lifetime) => Heart::with_lifetime(lifetime),
            None => Heart::new(),
        }
    }
}

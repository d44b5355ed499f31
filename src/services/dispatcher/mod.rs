//! Round-robin message dispatcher service

use super::{ConfigError, Context, SharedOptions};
use crate::domain::{ChannelPool, Dispatcher};
use crate::libraries::helpers::Pacing;
use crate::libraries::scheduling::{JobScheduler, StatusServer};
use crate::schedule;
use anyhow::Result;
use log::info;
use structopt::StructOpt;

mod jobs;

pub use jobs::DispatchJob;

#[derive(Debug, StructOpt)]
/// Message dispatcher
///
/// Continuously publishes generated messages, distributing them round-robin over all channels.
pub struct Options {
    /// Minimum delay between two messages in seconds
    #[structopt(long, env, default_value = "0.5", value_name = "seconds")]
    pub dispatch_min_delay: f64,

    /// Maximum delay between two messages in seconds
    #[structopt(long, env, default_value = "2.0", value_name = "seconds")]
    pub dispatch_max_delay: f64,

    /// Stop after dispatching the given number of messages
    #[structopt(short, long, env, value_name = "count")]
    pub iterations: Option<u64>,
}

impl Options {
    /// Validates the options and builds the configured dispatcher
    pub fn dispatcher(&self, pool: ChannelPool) -> Result<Dispatcher, ConfigError> {
        let pacing = Pacing::from_secs_f64(self.dispatch_min_delay, self.dispatch_max_delay)?;
        let dispatcher = Dispatcher::new(pool, pacing);

        Ok(match self.iterations {
            Some(limit) => dispatcher.with_limit(limit),
            None => dispatcher,
        })
    }
}

pub async fn run(shared_options: SharedOptions, options: Options) -> Result<()> {
    let (mut heart, heart_stone) = shared_options.heart();

    let context = Context::from_options(&shared_options)?;
    let scheduler = JobScheduler::default();

    let dispatch_job = DispatchJob::new(options.dispatcher(context.pool)?, heart_stone);

    if let Some(port) = shared_options.status_port() {
        let status_job = StatusServer::new(&scheduler, port);
        scheduler.spawn_job(status_job, context.clone()).await;
    }

    schedule!(scheduler, context, { dispatch_job });

    let death_reason = heart.death().await;
    info!("Heart died: {}", death_reason);

    scheduler.terminate_jobs().await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroU64;

    fn options(min: f64, max: f64, iterations: Option<u64>) -> Options {
        Options {
            dispatch_min_delay: min,
            dispatch_max_delay: max,
            iterations,
        }
    }

    #[test]
    fn inverted_delays_are_rejected() {
        let pool = ChannelPool::new(NonZeroU64::new(10).unwrap());

        assert!(matches!(
            options(2.0, 0.5, None).dispatcher(pool),
            Err(ConfigError::Pacing(_))
        ));
        assert!(options(0.5, 2.0, Some(3)).dispatcher(pool).is_ok());
    }
}

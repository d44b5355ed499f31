//! Channel listener service

use super::{ConfigError, Context, SharedOptions};
use crate::domain::{Channel, ChannelPool, Listener};
use crate::libraries::helpers::Pacing;
use crate::libraries::scheduling::{Job, JobScheduler, StatusServer};
use anyhow::Result;
use log::{info, warn};
use std::collections::HashSet;
use structopt::StructOpt;

mod jobs;

pub use jobs::ListenerJob;

#[derive(Debug, StructOpt)]
/// Channel listener
///
/// Subscribes to channels and logs every message received on them. Messages published
/// before a listener subscribed are never seen.
pub struct Options {
    /// Channels to listen on, defaults to all channels messages are dispatched to
    #[structopt(parse(from_str), value_name = "channel")]
    pub listen_channels: Vec<Channel>,

    /// Minimum processing time per message in seconds
    #[structopt(long, env, default_value = "0.5", value_name = "seconds")]
    pub listen_min_delay: f64,

    /// Maximum processing time per message in seconds
    #[structopt(long, env, default_value = "1.0", value_name = "seconds")]
    pub listen_max_delay: f64,
}

impl Options {
    /// Validates the options and builds one listener per distinct channel
    pub fn listeners(&self, pool: ChannelPool) -> Result<Vec<Listener>, ConfigError> {
        let pacing = Pacing::from_secs_f64(self.listen_min_delay, self.listen_max_delay)?;

        let mut channels: Vec<Channel> = if self.listen_channels.is_empty() {
            pool.channels().collect()
        } else {
            self.listen_channels.clone()
        };

        let mut seen = HashSet::new();
        channels.retain(|channel| {
            let first = seen.insert(channel.clone());
            if !first {
                warn!(
                    "{} has been given more than once, starting a single listener for it",
                    channel
                );
            }
            first
        });

        Ok(channels
            .into_iter()
            .map(|channel| Listener::new(channel, pacing))
            .collect())
    }
}

/// Schedules a job for each listener and returns the job names
pub async fn schedule_listeners(
    scheduler: &JobScheduler,
    context: &Context,
    listeners: Vec<Listener>,
) -> Vec<String> {
    let mut names = Vec::with_capacity(listeners.len());

    for listener in listeners {
        let job = ListenerJob::new(listener);
        names.push(job.name());
        scheduler.spawn_job(job, context.clone()).await;
    }

    names
}

pub async fn run(shared_options: SharedOptions, options: Options) -> Result<()> {
    let (mut heart, _) = shared_options.heart();

    let context = Context::from_options(&shared_options)?;
    let scheduler = JobScheduler::default();

    if let Some(port) = shared_options.status_port() {
        let status_job = StatusServer::new(&scheduler, port);
        scheduler.spawn_job(status_job, context.clone()).await;
    }

    let listeners = options.listeners(context.pool)?;
    schedule_listeners(&scheduler, &context, listeners).await;

    let death_reason = heart.death().await;
    info!("Heart died: {}", death_reason);

    scheduler.terminate_jobs().await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::num::NonZeroU64;

    fn pool() -> ChannelPool {
        ChannelPool::new(NonZeroU64::new(3).unwrap())
    }

    fn options(channels: &[&str], min: f64, max: f64) -> Options {
        Options {
            listen_channels: channels.iter().map(|c| Channel::from(*c)).collect(),
            listen_min_delay: min,
            listen_max_delay: max,
        }
    }

    #[test]
    fn listen_on_all_channels_by_default() {
        let listeners = options(&[], 0.5, 1.0).listeners(pool()).unwrap();

        assert_eq!(
            listeners.iter().map(|l| l.channel().to_string()).collect::<Vec<_>>(),
            vec!["channel_1", "channel_2", "channel_3"]
        );
    }

    #[test]
    fn listen_on_given_channels() {
        let listeners = options(&["channel_7"], 0.5, 1.0).listeners(pool()).unwrap();

        assert_eq!(listeners.len(), 1);
        assert_eq!(listeners[0].channel(), &Channel::numbered(7));
    }

    #[test]
    fn start_one_listener_per_distinct_channel() {
        let listeners = options(&["channel_2", "channel_1", "channel_2"], 0.5, 1.0)
            .listeners(pool())
            .unwrap();

        assert_eq!(
            listeners.iter().map(|l| l.channel().to_string()).collect::<Vec<_>>(),
            vec!["channel_2", "channel_1"]
        );
    }

    #[test]
    fn negative_delays_are_rejected() {
        assert!(matches!(
            options(&[], -1.0, 1.0).listeners(pool()),
            Err(ConfigError::Pacing(_))
        ));
    }
}

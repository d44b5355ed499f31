//! Dispatcher and listeners within a single process

use super::listener::schedule_listeners;
use super::{dispatcher, listener, Context, SharedOptions};
use crate::libraries::scheduling::{JobScheduler, StatusServer};
use crate::schedule;
use anyhow::Result;
use log::{info, warn};
use std::time::Duration;
use structopt::StructOpt;
use tokio::time::timeout;

const LISTENER_STARTUP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, StructOpt)]
/// Dispatcher and listeners combined
///
/// Runs the dispatcher alongside listeners for the given channels (all channels by default).
/// This is the only mode in which the in-memory transport delivers anything.
pub struct Options {
    #[structopt(flatten)]
    pub dispatcher: dispatcher::Options,

    #[structopt(flatten)]
    pub listener: listener::Options,
}

pub async fn run(shared_options: SharedOptions, options: Options) -> Result<()> {
    let (mut heart, heart_stone) = shared_options.heart();

    let context = Context::from_options(&shared_options)?;
    let scheduler = JobScheduler::default();

    let listeners = options.listener.listeners(context.pool)?;
    let dispatch_job =
        dispatcher::DispatchJob::new(options.dispatcher.dispatcher(context.pool)?, heart_stone);

    if let Some(port) = shared_options.status_port() {
        let status_job = StatusServer::new(&scheduler, port);
        scheduler.spawn_job(status_job, context.clone()).await;
    }

    // Messages published before a listener subscribed are lost
    for name in schedule_listeners(&scheduler, &context, listeners).await {
        if timeout(LISTENER_STARTUP_TIMEOUT, scheduler.wait_until_ready(&name))
            .await
            .is_err()
        {
            warn!("{} is not ready yet, dispatching anyway", name);
        }
    }

    schedule!(scheduler, context, { dispatch_job });

    let death_reason = heart.death().await;
    info!("Heart died: {}", death_reason);

    scheduler.terminate_jobs().await;

    Ok(())
}

//! One-off publish of an externally created message

use super::tasks::{enqueue_publish, task_queue};
use super::{Context, SharedOptions};
use crate::domain::Channel;
use anyhow::Result;
use log::info;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
/// Publish a single message
///
/// Submits the message to the task queue and waits until the publish task has completed.
/// Nobody will receive it unless a listener is subscribed to the channel at that moment.
pub struct Options {
    /// Channel to publish to
    #[structopt(parse(from_str), value_name = "channel")]
    pub channel: Channel,

    /// Message content
    #[structopt(value_name = "content")]
    pub content: String,
}

pub async fn run(shared_options: SharedOptions, options: Options) -> Result<()> {
    let context = Context::from_options(&shared_options)?;
    let queue = task_queue(context);

    let handle = enqueue_publish(&queue, options.channel, options.content)?;
    info!("Submitted {} task {}", handle.name(), handle.id());

    handle.join().await?;

    Ok(())
}

//! Background tasks which can be submitted by name
//!
//! | Task       | Arguments                                          |
//! |------------|----------------------------------------------------|
//! | `publish`  | `{ "channel": "channel_3", "content": "..." }`     |
//! | `dispatch` | `{ "iterations": 10, "min_delay": 0.5, ... }`      |
//! | `listen`   | `{ "channel": "channel_1", "max_delay": 1.0, ... }`|

use super::Context;
use crate::domain::{Channel, Dispatcher, Listener, MessageRecord};
use crate::libraries::helpers::Pacing;
use crate::libraries::scheduling::{TaskHandle, TaskManager, TaskQueue, TaskQueueError};
use anyhow::Result;
use log::info;
use serde::Deserialize;
use serde_json::json;

pub const PUBLISH_TASK: &str = "publish";
pub const DISPATCH_TASK: &str = "dispatch";
pub const LISTEN_TASK: &str = "listen";

fn default_dispatch_min_delay() -> f64 {
    0.5
}

fn default_dispatch_max_delay() -> f64 {
    2.0
}

fn default_listen_min_delay() -> f64 {
    0.5
}

fn default_listen_max_delay() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
pub struct DispatchArgs {
    #[serde(default)]
    pub iterations: Option<u64>,
    #[serde(default = "default_dispatch_min_delay")]
    pub min_delay: f64,
    #[serde(default = "default_dispatch_max_delay")]
    pub max_delay: f64,
}

#[derive(Debug, Deserialize)]
pub struct ListenArgs {
    pub channel: Channel,
    #[serde(default = "default_listen_min_delay")]
    pub min_delay: f64,
    #[serde(default = "default_listen_max_delay")]
    pub max_delay: f64,
}

/// Creates a queue with all tasks registered
pub fn task_queue(context: Context) -> TaskQueue<Context> {
    let mut queue = TaskQueue::new(context);

    queue
        .register(PUBLISH_TASK, publish)
        .register(DISPATCH_TASK, dispatch)
        .register(LISTEN_TASK, listen);

    queue
}

/// Submits a publish of the given content to an explicitly chosen channel.
/// The returned handle only acknowledges the submission, not the delivery.
pub fn enqueue_publish(
    queue: &TaskQueue<Context>,
    channel: Channel,
    content: String,
) -> Result<TaskHandle, TaskQueueError> {
    queue.submit(PUBLISH_TASK, json!(MessageRecord { channel, content }))
}

async fn publish(record: MessageRecord, manager: TaskManager<Context>) -> Result<()> {
    manager
        .context
        .publisher()
        .publish(&record.channel, &record.content)
        .await?;

    Ok(())
}

async fn dispatch(args: DispatchArgs, manager: TaskManager<Context>) -> Result<()> {
    let pacing = Pacing::from_secs_f64(args.min_delay, args.max_delay)?;
    let mut dispatcher = Dispatcher::new(manager.context.pool, pacing);

    if let Some(limit) = args.iterations {
        dispatcher = dispatcher.with_limit(limit);
    }

    dispatcher
        .run(&manager.context.publisher(), manager.termination_signal())
        .await?;

    Ok(())
}

async fn listen(args: ListenArgs, manager: TaskManager<Context>) -> Result<()> {
    let pacing = Pacing::from_secs_f64(args.min_delay, args.max_delay)?;
    let listener = Listener::new(args.channel, pacing);

    let processed = listener
        .run(&manager.context.subscriber(), manager.termination_signal())
        .await?;

    info!("Listen task {} processed {} messages", manager.task_id(), processed);

    Ok(())
}

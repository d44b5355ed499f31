use super::task_manager::{TaskId, TaskManager};
use futures::future::{abortable, AbortHandle, Aborted, BoxFuture, FutureExt};
use log::{debug, error, info};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use thiserror::Error;
use tokio::sync::watch::Sender as WatchSender;
use tokio::task::{self, JoinError, JoinHandle};
use uuid::Uuid;

type TaskFuture = BoxFuture<'static, anyhow::Result<()>>;
type TaskFactory<C> =
    Box<dyn Fn(Value, TaskManager<C>) -> Result<TaskFuture, TaskQueueError> + Send + Sync>;

/// Errors raised while submitting a task
#[derive(Error, Debug)]
pub enum TaskQueueError {
    /// No task has been registered under the given name
    #[error("unknown task '{0}'")]
    UnknownTask(String),
    /// Arguments could not be deserialized into the task's argument type
    #[error("invalid arguments for task '{task}'")]
    InvalidArguments {
        /// Name of the task
        task: String,
        /// Underlying deserialization error
        #[source]
        source: serde_json::Error,
    },
}

/// Reason why a submitted task did not complete successfully
#[derive(Error, Debug)]
pub enum TaskError {
    /// The task returned an error
    #[error("task failed")]
    Failed(#[source] anyhow::Error),
    /// The task has been aborted through its handle
    #[error("task was aborted")]
    Aborted,
    /// The task panicked
    #[error("task panicked")]
    Panicked(#[from] JoinError),
}

/// Named one-off tasks executed in the background
///
/// Tasks are registered by name together with a JSON deserializable argument type. Submitting a task
/// spawns it on its own tokio task and immediately hands back a [`TaskHandle`] which only acknowledges
/// the submission. Unlike jobs, failed tasks are not restarted.
pub struct TaskQueue<C> {
    context: C,
    tasks: HashMap<&'static str, TaskFactory<C>>,
}

impl<C> TaskQueue<C>
where
    C: Clone + Send + Sync + 'static,
{
    /// Creates an empty queue whose tasks receive a clone of the given context
    pub fn new(context: C) -> Self {
        Self {
            context,
            tasks: HashMap::new(),
        }
    }

    /// Registers a task under the given name, replacing any previous registration
    pub fn register<A, F, Fut>(&mut self, name: &'static str, task: F) -> &mut Self
    where
        A: DeserializeOwned,
        F: Fn(A, TaskManager<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let factory = move |args: Value, manager: TaskManager<C>| {
            let args = serde_json::from_value::<A>(args).map_err(|source| {
                TaskQueueError::InvalidArguments {
                    task: name.to_owned(),
                    source,
                }
            })?;

            Ok(task(args, manager).boxed())
        };

        self.tasks.insert(name, Box::new(factory));
        self
    }

    /// Names of all registered tasks
    pub fn task_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tasks.keys().copied()
    }

    /// Submits a task for background execution without waiting for it
    pub fn submit(&self, name: &str, args: Value) -> Result<TaskHandle, TaskQueueError> {
        let factory = self
            .tasks
            .get(name)
            .ok_or_else(|| TaskQueueError::UnknownTask(name.to_owned()))?;

        let id = Uuid::new_v4();
        let (manager, _readiness, termination_tx) = TaskManager::new(id, self.context.clone());
        let (future, abort_handle) = abortable(factory(args, manager)?);

        let task_name = name.to_owned();
        debug!("Submitted task {} ({})", task_name, id);

        let join_handle = task::spawn(async move {
            let result = future.await;

            match &result {
                Ok(Ok(_)) => debug!("Task {} ({}) completed", task_name, id),
                Ok(Err(e)) => error!("Task {} ({}) failed: {:?}", task_name, id, e),
                Err(_) => info!("Task {} ({}) aborted", task_name, id),
            }

            result
        });

        Ok(TaskHandle {
            id,
            name: name.to_owned(),
            join_handle,
            abort_handle,
            termination_tx,
        })
    }
}

/// Handle to a submitted task
///
/// Dropping the handle detaches the task, it keeps running in the background.
pub struct TaskHandle {
    id: TaskId,
    name: String,
    join_handle: JoinHandle<Result<anyhow::Result<()>, Aborted>>,
    abort_handle: AbortHandle,
    termination_tx: WatchSender<Option<()>>,
}

impl TaskHandle {
    /// Unique identifier assigned on submission
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Name under which the task has been submitted
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sends the graceful termination signal to the task
    pub fn cancel(&self) {
        self.termination_tx.send(Some(())).ok();
    }

    /// Forcefully stops the task at its next suspension point
    pub fn abort(&self) {
        self.abort_handle.abort();
    }

    /// Whether the task has exited
    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }

    /// Waits for the task to exit
    pub async fn join(self) -> Result<(), TaskError> {
        match self.join_handle.await? {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(TaskError::Failed(e)),
            Err(Aborted) => Err(TaskError::Aborted),
        }
    }
}

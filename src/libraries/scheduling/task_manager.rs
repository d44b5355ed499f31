use futures::{
    channel::oneshot::{
        channel as one_shot_channel, Receiver as OneShotReceiver, Sender as OneShotSender,
    },
    future,
    lock::Mutex,
};
use std::sync::Arc;
use tokio::sync::watch::{
    channel as watch_channel, Receiver as WatchReceiver, Sender as WatchSender,
};
use uuid::Uuid;

/// Unique identifier of a running job instance or task
pub type TaskId = Uuid;

/// Manager for tasks and jobs
///
/// Provides context, readiness reporting and graceful termination
#[derive(Clone)]
pub struct TaskManager<Context> {
    task_id: TaskId,
    readiness_tx: Arc<Mutex<Option<OneShotSender<()>>>>,
    termination_rx: WatchReceiver<Option<()>>,
    pub context: Context,
}

impl<Context> TaskManager<Context> {
    /// Create a new task manager for the given task and context
    pub fn new(
        task_id: TaskId,
        context: Context,
    ) -> (Self, OneShotReceiver<()>, WatchSender<Option<()>>) {
        let (readiness_tx, readiness_rx) = one_shot_channel();
        let (termination_tx, termination_rx) = watch_channel(None);

        let manager = Self {
            task_id,
            readiness_tx: Arc::new(Mutex::new(Some(readiness_tx))),
            termination_rx,
            context,
        };

        (manager, readiness_rx, termination_tx)
    }

    /// Identifier of the task this manager belongs to
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Future that completes when the job should gracefully shutdown.
    ///
    /// If the termination sender is dropped without ever firing the future never completes,
    /// the job can then only be aborted forcefully.
    pub fn termination_signal(&self) -> impl futures::Future<Output = ()> + Send + 'static {
        let mut rx = self.termination_rx.clone();

        async move {
            loop {
                if rx.borrow().is_some() {
                    return;
                }

                if rx.changed().await.is_err() {
                    future::pending::<()>().await;
                }
            }
        }
    }

    /// Check if the job should enter graceful shutdown
    pub fn termination_signal_triggered(&self) -> bool {
        self.termination_rx.borrow().is_some()
    }

    /// Function to indicate to the scheduler that this job is ready to fulfill its contract.
    /// Repeated calls have no effect.
    pub async fn ready(&self) {
        if let Some(tx) = self.readiness_tx.lock().await.take() {
            tx.send(()).ok();
        }
    }
}

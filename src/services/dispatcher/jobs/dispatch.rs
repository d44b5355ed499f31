use super::super::Context;
use crate::domain::Dispatcher;
use crate::libraries::lifecycle::HeartStone;
use crate::libraries::scheduling::{Job, TaskManager};
use anyhow::Result;
use async_trait::async_trait;
use futures::lock::Mutex;
use log::info;
use std::sync::Arc;

/// Runs the dispatcher until termination, restarts continue the sequence where the crash left it
#[derive(Clone)]
pub struct DispatchJob {
    dispatcher: Arc<Mutex<Dispatcher>>,
    heart_stone: HeartStone,
}

impl DispatchJob {
    pub fn new(dispatcher: Dispatcher, heart_stone: HeartStone) -> Self {
        Self {
            dispatcher: Arc::new(Mutex::new(dispatcher)),
            heart_stone,
        }
    }
}

#[async_trait]
impl Job for DispatchJob {
    type Context = Context;

    const NAME: &'static str = "dispatcher";
    const SUPPORTS_GRACEFUL_TERMINATION: bool = true;

    async fn execute(&self, manager: TaskManager<Self::Context>) -> Result<()> {
        let publisher = manager.context.publisher();
        let mut dispatcher = self.dispatcher.lock().await;

        manager.ready().await;

        let published = dispatcher
            .run(&publisher, manager.termination_signal())
            .await?;

        // Bounded runs end the process once all messages are out
        if !manager.termination_signal_triggered() {
            info!("Dispatched {} messages in total", dispatcher.dispatched());
            self.heart_stone
                .clone()
                .kill(format!("Dispatch finished after {} messages", published))
                .await;
        }

        Ok(())
    }
}

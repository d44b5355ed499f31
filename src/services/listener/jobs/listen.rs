use super::super::Context;
use crate::domain::Listener;
use crate::libraries::scheduling::{Job, TaskManager};
use anyhow::Result;
use async_trait::async_trait;
use log::info;

#[derive(Clone)]
pub struct ListenerJob {
    listener: Listener,
}

impl ListenerJob {
    pub fn new(listener: Listener) -> Self {
        Self { listener }
    }
}

#[async_trait]
impl Job for ListenerJob {
    type Context = Context;

    const NAME: &'static str = "listener";
    const SUPPORTS_GRACEFUL_TERMINATION: bool = true;

    fn name(&self) -> String {
        format!("{}({})", Self::NAME, self.listener.channel())
    }

    async fn execute(&self, manager: TaskManager<Self::Context>) -> Result<()> {
        let payloads = manager
            .context
            .subscriber()
            .subscribe(self.listener.channel())
            .await?;

        manager.ready().await;

        let processed = self
            .listener
            .drain(payloads, manager.termination_signal())
            .await?;

        info!(
            "Stopped listening on {} after {} messages",
            self.listener.channel(),
            processed
        );

        Ok(())
    }
}

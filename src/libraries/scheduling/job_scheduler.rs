use crate::libraries::helpers::Backoff;
use futures::{
    channel::oneshot::Receiver as OneShotReceiver,
    future::{abortable, AbortHandle},
    lock::Mutex,
};
use log::{debug, error, info, warn};
use std::{
    collections::HashMap,
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{sync::watch::Sender as WatchSender, task, time::sleep};
use uuid::Uuid;

use super::job::Job;
use super::task_manager::TaskManager;

/// Status of all jobs managed by a scheduler, keyed by job name
pub(crate) type StatusMap = Arc<Mutex<HashMap<String, JobStatus>>>;

/// State in which a job currently resides
#[derive(Debug)]
pub enum JobStatus {
    /// Job has started and is ready to fulfill contracts. Contains graceful termination handle if supported.
    Ready(Option<WatchSender<Option<()>>>),
    /// Job has never started and is in the process of getting ready
    Startup,
    /// Job crashed earlier and is getting ready again
    Restarting,
    /// Job has exited with an error and is currently waiting before it retries
    CrashLoopBackOff,
    /// Job has exceeded its crash loop limit
    Terminated,
    /// Job has exited cleanly
    Finished,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            JobStatus::Ready(_) => write!(f, "Ready"),
            _ => write!(f, "{:?}", self),
        }
    }
}

impl PartialEq for JobStatus {
    fn eq(&self, other: &Self) -> bool {
        matches!(
            (self, other),
            (JobStatus::Ready(_), JobStatus::Ready(_))
                | (JobStatus::Startup, JobStatus::Startup)
                | (JobStatus::Restarting, JobStatus::Restarting)
                | (JobStatus::CrashLoopBackOff, JobStatus::CrashLoopBackOff)
                | (JobStatus::Terminated, JobStatus::Terminated)
                | (JobStatus::Finished, JobStatus::Finished)
        )
    }
}

impl Eq for JobStatus {}

impl JobStatus {
    fn is_gracefully_terminatable(&self) -> bool {
        matches!(*self, JobStatus::Ready(Some(_)))
    }
}

/// Job lifecycle handler
///
/// Every job gets a dedicated tokio task for as long as it runs. Crashed jobs are restarted
/// following an exponential [`Backoff`] until its retry limit is exhausted.
pub struct JobScheduler {
    pub(crate) status: StatusMap,
    termination_handles: Arc<Mutex<HashMap<String, AbortHandle>>>,
    grace_period: Duration,
    backoff: Backoff,
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self {
            status: Arc::new(Mutex::new(HashMap::new())),
            termination_handles: Arc::new(Mutex::new(HashMap::new())),
            grace_period: Duration::from_secs(60),
            backoff: Backoff::default(),
        }
    }
}

impl JobScheduler {
    /// Overrides how long [`terminate_jobs`](JobScheduler::terminate_jobs) waits for graceful jobs to exit
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Overrides the crash loop backoff handed to newly spawned jobs
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Snapshot of the human readable status of all known jobs
    pub async fn status(&self) -> HashMap<String, String> {
        self.status
            .lock()
            .await
            .iter()
            .map(|(name, status)| (name.clone(), status.to_string()))
            .collect()
    }

    /// Whether the job with the given name has reported readiness
    pub async fn is_ready(&self, job_name: &str) -> bool {
        matches!(
            self.status.lock().await.get(job_name),
            Some(JobStatus::Ready(_))
        )
    }

    /// Waits until the job with the given name has reported readiness
    pub async fn wait_until_ready(&self, job_name: &str) {
        while !self.is_ready(job_name).await {
            sleep(Duration::from_millis(10)).await;
        }
    }

    fn add_status_watcher(
        readiness_rx: OneShotReceiver<()>,
        termination_tx: Option<WatchSender<Option<()>>>,
        status_map: StatusMap,
        job_name: String,
    ) -> AbortHandle {
        let (watcher, handle) = abortable(async move {
            if readiness_rx.await.is_ok() {
                JobScheduler::change_status(
                    &status_map,
                    &job_name,
                    JobStatus::Ready(termination_tx),
                )
                .await;
            }
        });

        task::spawn(watcher);
        handle
    }

    async fn change_status(status_map: &StatusMap, job_name: &str, status: JobStatus) {
        info!("{:<16} {}", format!("{}", status), job_name);
        status_map.lock().await.insert(job_name.to_owned(), status);
    }

    async fn manage_job_lifecycle<J>(
        job: J,
        ctx: J::Context,
        status_map: StatusMap,
        mut backoff: Backoff,
    ) where
        J: 'static + Job + Send + Sync,
        J::Context: Send + Sync + Clone,
    {
        let job_name = job.name();

        JobScheduler::change_status(&status_map, &job_name, JobStatus::Startup).await;

        loop {
            let (manager, readiness_rx, termination_tx) =
                TaskManager::new(Uuid::new_v4(), ctx.clone());

            let wrapped_termination_tx = if job.supports_graceful_termination() {
                Some(termination_tx)
            } else {
                None
            };

            let status_handle = JobScheduler::add_status_watcher(
                readiness_rx,
                wrapped_termination_tx,
                status_map.clone(),
                job_name.clone(),
            );

            let result = job.execute(manager).await;

            status_handle.abort();

            match result {
                Ok(_) => {
                    JobScheduler::change_status(&status_map, &job_name, JobStatus::Finished)
                        .await;
                    status_map.lock().await.remove(&job_name);
                    return;
                }
                Err(e) => {
                    error!("{} crashed: {:?}", job_name, e);
                    JobScheduler::change_status(
                        &status_map,
                        &job_name,
                        JobStatus::CrashLoopBackOff,
                    )
                    .await;

                    match backoff.next() {
                        Some(sleep_duration) => {
                            debug!(
                                "{} backing off for {:?} (retry {})",
                                job_name,
                                sleep_duration,
                                backoff.retries()
                            );
                            sleep(sleep_duration).await;
                        }
                        None => {
                            error!("{} exceeded its retry limit!", job_name);
                            JobScheduler::change_status(
                                &status_map,
                                &job_name,
                                JobStatus::Terminated,
                            )
                            .await;
                            return;
                        }
                    }
                }
            }

            JobScheduler::change_status(&status_map, &job_name, JobStatus::Restarting).await;
        }
    }

    /// Manage a new job
    ///
    /// The job is executed on its own task, respawned if it crashes and its lifecycle is tracked.
    /// Jobs are identified by [`Job::name`], spawning a second job with the same name is refused.
    pub async fn spawn_job<J>(&self, job: J, ctx: J::Context)
    where
        J: 'static + Job + Send + Sync,
        J::Context: 'static + Send + Sync + Clone,
    {
        let job_name = job.name();
        let mut termination_handles = self.termination_handles.lock().await;

        if termination_handles.contains_key(&job_name) {
            warn!("{} is already scheduled, refusing to spawn it twice", job_name);
            return;
        }

        let status_map = self.status.clone();
        let (job_lifecycle, termination_handle) = abortable(JobScheduler::manage_job_lifecycle(
            job,
            ctx,
            status_map.clone(),
            self.backoff.clone(),
        ));

        termination_handles.insert(job_name.clone(), termination_handle);
        drop(termination_handles);

        let termination_handles = self.termination_handles.clone();
        task::spawn(async move {
            if job_lifecycle.await.is_err() {
                JobScheduler::change_status(&status_map, &job_name, JobStatus::Terminated).await;
                status_map.lock().await.remove(&job_name);
            }

            termination_handles.lock().await.remove(&job_name);
        });
    }

    /// Number of jobs that have not yet exited
    pub async fn active_jobs(&self) -> usize {
        self.termination_handles.lock().await.len()
    }

    /// Gracefully terminates all managed jobs that support it and aborts the remaining ones
    pub async fn terminate_jobs(&self) {
        // 1. Signal jobs that support graceful shutdown and abort the ones that don't (or aren't ready yet)
        {
            let status = self.status.lock().await;
            let termination_handles = self.termination_handles.lock().await;

            for (job_name, handle) in termination_handles.iter() {
                match status.get(job_name) {
                    Some(JobStatus::Ready(Some(graceful_handle))) => {
                        graceful_handle.send(Some(())).ok();
                    }
                    _ => handle.abort(),
                }
            }
        }

        // 2. Give graceful jobs some time to exit on their own
        let deadline = Instant::now() + self.grace_period;
        while Instant::now() < deadline {
            {
                let status = self.status.lock().await;
                let termination_handles = self.termination_handles.lock().await;

                let remaining = termination_handles
                    .keys()
                    .filter(|job_name| {
                        status
                            .get(*job_name)
                            .map(JobStatus::is_gracefully_terminatable)
                            .unwrap_or(false)
                    })
                    .count();

                if remaining == 0 {
                    break;
                }
            }

            sleep(Duration::from_millis(10)).await;
        }

        // 3. Abort everything that is still around
        let status = self.status.lock().await;
        for (job_name, handle) in self.termination_handles.lock().await.iter() {
            if status
                .get(job_name)
                .map(JobStatus::is_gracefully_terminatable)
                .unwrap_or(false)
            {
                warn!("{} ignored graceful termination request", job_name);
            }

            handle.abort()
        }
    }
}

/// Schedule jobs on a given scheduler with some context
#[macro_export]
macro_rules! schedule {
    ($scheduler:expr, $context:expr, { $($job:ident$(,)? )+ }) => {
        $(
            $scheduler.spawn_job($job.clone(), $context.clone()).await;
        )+
    };
}

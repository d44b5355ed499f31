//! Job handling and scheduling structs

mod job;
mod job_scheduler;
mod status_server;
mod task_manager;
mod task_queue;

pub use job::Job;
pub use job_scheduler::{JobScheduler, JobStatus};
pub use status_server::StatusServer;
pub use task_manager::{TaskId, TaskManager};
pub use task_queue::{TaskError, TaskHandle, TaskQueue, TaskQueueError};

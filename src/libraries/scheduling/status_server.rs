use super::job_scheduler::{JobScheduler, JobStatus, StatusMap};
use super::{Job, TaskManager};
use anyhow::Result;
use async_trait::async_trait;
use hyper::{
    header::CONTENT_TYPE,
    service::{make_service_fn, service_fn},
    Body, Error as HyperError, Request, Response, Server, StatusCode,
};
use log::info;
use serde::Serialize;
use std::{collections::HashMap, convert::Infallible, marker::PhantomData, net::SocketAddr};

#[derive(Serialize, Debug, Clone, Copy, Eq, PartialEq)]
enum Status {
    Operational,
    Degraded,
    Unrecoverable,
}

impl Status {
    fn status_code(&self) -> StatusCode {
        match *self {
            Status::Operational => StatusCode::OK,
            Status::Degraded => StatusCode::SERVICE_UNAVAILABLE,
            Status::Unrecoverable => StatusCode::GONE,
        }
    }
}

#[derive(Serialize)]
struct StatusResponse {
    status: Status,
    jobs: HashMap<String, String>,
}

/// Aggregates individual job states into an overall health report
fn summarize<'a>(statuses: impl Iterator<Item = (&'a String, &'a JobStatus)>) -> StatusResponse {
    let mut status = Status::Operational;
    let mut jobs = HashMap::new();

    for (job_name, job_status) in statuses {
        match *job_status {
            JobStatus::Terminated => status = Status::Unrecoverable,
            JobStatus::Restarting | JobStatus::CrashLoopBackOff | JobStatus::Startup => {
                if status != Status::Unrecoverable {
                    status = Status::Degraded
                }
            }
            _ => {}
        };

        jobs.insert(job_name.clone(), job_status.to_string());
    }

    StatusResponse { status, jobs }
}

/// HTTP endpoint reporting the health of every job in a scheduler
///
/// Responds with `200` while all jobs are ready, `503` while some are (re-)starting
/// and `410` once any job has permanently failed.
pub struct StatusServer<C> {
    status: StatusMap,
    port: u16,
    phantom: PhantomData<C>,
}

impl<C> StatusServer<C> {
    pub fn new(scheduler: &JobScheduler, port: u16) -> Self {
        Self {
            status: scheduler.status.clone(),
            port,
            phantom: PhantomData,
        }
    }

    async fn respond(status_map: StatusMap, _req: Request<Body>) -> Result<Response<Body>> {
        let summary = summarize(status_map.lock().await.iter());
        let body = serde_json::to_string(&summary)?;

        let response = Response::builder()
            .status(summary.status.status_code())
            .header(CONTENT_TYPE, "application/json")
            .body(body.into())?;

        Ok(response)
    }

    async fn handle(status_map: StatusMap, req: Request<Body>) -> Result<Response<Body>, Infallible> {
        match StatusServer::<C>::respond(status_map, req).await {
            Ok(response) => Ok(response),
            Err(e) => {
                log::error!("Failed to build status response: {}", e);

                let mut response = Response::new(Body::empty());
                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                Ok(response)
            }
        }
    }
}

#[async_trait]
impl<C: Send + Sync + 'static> Job for StatusServer<C> {
    type Context = C;

    const NAME: &'static str = "status-server";
    const SUPPORTS_GRACEFUL_TERMINATION: bool = true;

    async fn execute(&self, manager: TaskManager<Self::Context>) -> Result<()> {
        let status = self.status.clone();
        let make_svc = make_service_fn(|_conn| {
            let status = status.clone();

            async move {
                Ok::<_, HyperError>(service_fn(move |req| {
                    StatusServer::<C>::handle(status.clone(), req)
                }))
            }
        });

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let server = Server::try_bind(&addr)?.serve(make_svc);
        let graceful = server.with_graceful_shutdown(manager.termination_signal());

        info!("Status server listening on {}", addr);
        manager.ready().await;

        graceful.await?;

        Ok(())
    }
}

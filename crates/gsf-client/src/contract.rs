//! The protocol-independent GSF API.
//!
//! ```text
//! Server ─ services() / service(name) ─▶ Service ─ task(name) ─▶ Task
//!    │                                                            │
//!    └──────────── job(id) ──────────▶ Job ◀──── submit(params) ──┘
//! ```
//!
//! Each server family ([`crate::ese`], [`crate::sdk`]) implements these
//! traits; [`crate::any`] picks one at construction. Handles hand out
//! independent values: a service, task or job keeps only a shared reference
//! to its server's URL, session and metadata cache, and stays usable after
//! the handle it came from is dropped.

use async_trait::async_trait;
use serde_json::{Map, Value};
use url::Url;

use crate::error::GsfResult;
use crate::job::{CancelAck, JobQuery, JobRecord, JobSnapshot, JobStatus};
use crate::normalize::{JobResults, Parameter};

/// A GSF server endpoint.
#[async_trait]
pub trait Server: Send + Sync {
    type Service: Service;
    type Job: Job;

    /// Server host name.
    fn name(&self) -> &str;

    fn port(&self) -> u16;

    /// Root URL all endpoints of this family hang off.
    fn url(&self) -> &Url;

    /// The server information document (memoized).
    async fn info(&self) -> GsfResult<Value>;

    async fn description(&self) -> GsfResult<String>;

    /// GSF version string, e.g. `3.1.0`.
    async fn version(&self) -> GsfResult<String>;

    /// Types of the request handlers configured on the server.
    async fn request_handlers(&self) -> GsfResult<Vec<String>>;

    /// Names of the services hosted by the server (memoized).
    async fn services(&self) -> GsfResult<Vec<String>>;

    /// Open a service; `ServiceNotFound` when the name is not hosted here.
    async fn service(&self, name: &str) -> GsfResult<Self::Service>;

    /// Handle for an existing job. No request is made until it is read.
    fn job(&self, job_id: i64) -> GsfResult<Self::Job>;

    async fn get_jobs(&self, query: &JobQuery) -> GsfResult<Vec<JobRecord>>;

    /// All jobs, unfiltered.
    async fn jobs(&self) -> GsfResult<Vec<JobRecord>> {
        self.get_jobs(&JobQuery::default()).await
    }

    /// Cancel a running job.
    ///
    /// A job that is not `Started` is `JobNotFound` when
    /// `raise_if_not_running`, otherwise an acknowledgement saying nothing
    /// was sent.
    async fn cancel_job(&self, job_id: i64, raise_if_not_running: bool) -> GsfResult<CancelAck>;
}

/// A named processing service hosted by a server.
#[async_trait]
pub trait Service: Send + Sync {
    type Task: Task;

    async fn name(&self) -> GsfResult<String>;

    async fn description(&self) -> GsfResult<String>;

    /// Names of the tasks the service offers.
    async fn tasks(&self) -> GsfResult<Vec<String>>;

    /// Handle for a task. Metadata is fetched on first read, which is where
    /// an unknown name surfaces as `TaskNotFound`.
    fn task(&self, name: &str) -> GsfResult<Self::Task>;
}

/// A named operation within a service.
#[async_trait]
pub trait Task: Send + Sync {
    type Job: Job;

    /// The unique identifier (URL) of the task.
    fn uri(&self) -> &Url;

    async fn name(&self) -> GsfResult<String>;

    async fn display_name(&self) -> GsfResult<String>;

    async fn description(&self) -> GsfResult<String>;

    /// Input parameters followed by output parameters (memoized).
    async fn parameters(&self) -> GsfResult<Vec<Parameter>>;

    /// Submit a job; `parameters` maps input parameter names to values.
    async fn submit(&self, parameters: Option<Map<String, Value>>) -> GsfResult<Self::Job>;
}

/// One asynchronous execution of a task.
///
/// Everything except `job_id` is read live from the server.
#[async_trait]
pub trait Job: Send + Sync {
    fn job_id(&self) -> i64;

    /// Fetch the current state in one request.
    async fn snapshot(&self) -> GsfResult<JobSnapshot>;

    /// Interval `wait_for_done` waits between polls.
    fn poll_interval(&self) -> std::time::Duration;

    async fn cancel(&self) -> GsfResult<CancelAck>;

    async fn status(&self) -> GsfResult<JobStatus> {
        Ok(self.snapshot().await?.status)
    }

    async fn progress(&self) -> GsfResult<u8> {
        Ok(self.snapshot().await?.progress)
    }

    async fn progress_message(&self) -> GsfResult<String> {
        Ok(self.snapshot().await?.progress_message)
    }

    async fn error_message(&self) -> GsfResult<String> {
        Ok(self.snapshot().await?.error_message)
    }

    async fn results(&self) -> GsfResult<JobResults> {
        Ok(self.snapshot().await?.results)
    }

    /// Poll until the job is `Succeeded` or `Failed`.
    ///
    /// `callback` sees every non-terminal snapshot and then the terminal
    /// one, which is also returned. There is no timeout.
    async fn wait_for_done(
        &self,
        mut callback: Option<&mut (dyn for<'s> FnMut(&'s JobSnapshot) + Send)>,
    ) -> GsfResult<JobSnapshot> {
        loop {
            let snapshot = self.snapshot().await?;
            if let Some(cb) = callback.as_deref_mut() {
                cb(&snapshot);
            }
            if snapshot.status.is_terminal() {
                tracing::debug!(job_id = snapshot.job_id, status = %snapshot.status, "Job done");
                return Ok(snapshot);
            }
            tracing::debug!(
                job_id = snapshot.job_id,
                status = %snapshot.status,
                progress = snapshot.progress,
                "Job not done yet"
            );
            tokio::time::sleep(self.poll_interval()).await;
        }
    }
}

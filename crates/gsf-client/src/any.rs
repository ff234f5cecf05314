//! Protocol selection — one handle type per contract, whichever server family
//! answers.
//!
//! Callers that know their server family can use [`crate::ese`] or
//! [`crate::sdk`] directly. Everyone else goes through [`AnyServer::connect`]
//! with [`Protocol::Auto`] and gets the family decided once, up front.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::contract::{Job, Server, Service, Task};
use crate::ese::{EseJob, EseServer, EseService, EseTask, ROOT_SEGMENT};
use crate::error::{GsfError, GsfResult};
use crate::http::Session;
use crate::job::{CancelAck, JobQuery, JobRecord, JobSnapshot};
use crate::normalize::Parameter;
use crate::sdk::{SdkJob, SdkServer, SdkService, SdkTask};

/// Server family to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Detect the server family: SDK first, then ESE.
    #[default]
    Auto,
    Ese,
    Sdk,
}

impl std::str::FromStr for Protocol {
    type Err = GsfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Protocol::Auto),
            "ese" => Ok(Protocol::Ese),
            "sdk" => Ok(Protocol::Sdk),
            other => Err(GsfError::Config(format!(
                "unknown protocol '{other}' (expected auto, ese or sdk)"
            ))),
        }
    }
}

// Forwards a call to whichever family the handle wraps.
macro_rules! delegate {
    ($value:expr, $inner:ident => $call:expr) => {
        match $value {
            Self::Ese($inner) => $call,
            Self::Sdk($inner) => $call,
        }
    };
}

/// A server of either family.
#[derive(Debug, Clone)]
pub enum AnyServer {
    Ese(EseServer),
    Sdk(SdkServer),
}

impl AnyServer {
    /// Open the server at `base`.
    ///
    /// With [`Protocol::Auto`] the SDK server-info endpoint is tried first;
    /// only when the server answers it with an HTTP error is the ESE root
    /// tried. An unreachable server fails right away.
    pub async fn connect(base: &Url, session: Session, protocol: Protocol) -> GsfResult<Self> {
        let server = match protocol {
            Protocol::Ese => AnyServer::Ese(EseServer::from_base_url(base, session)?),
            Protocol::Sdk => AnyServer::Sdk(SdkServer::connect_with(base, session).await?),
            Protocol::Auto => match SdkServer::connect_with(base, session.clone()).await {
                Ok(server) => AnyServer::Sdk(server),
                Err(GsfError::ServerNotFound(failure)) if failure.status.is_some() => {
                    tracing::debug!(%base, %failure, "No SDK server info; probing for ESE");
                    let server = EseServer::from_base_url(base, session)?;
                    server.services().await?;
                    AnyServer::Ese(server)
                }
                Err(e) => return Err(e),
            },
        };
        tracing::info!(%base, protocol = server.protocol_name(), "Connected to GSF server");
        Ok(server)
    }

    fn protocol_name(&self) -> &'static str {
        match self {
            AnyServer::Ese(_) => "ese",
            AnyServer::Sdk(_) => "sdk",
        }
    }

    pub fn protocol(&self) -> Protocol {
        match self {
            AnyServer::Ese(_) => Protocol::Ese,
            AnyServer::Sdk(_) => Protocol::Sdk,
        }
    }
}

#[async_trait]
impl Server for AnyServer {
    type Service = AnyService;
    type Job = AnyJob;

    fn name(&self) -> &str {
        delegate!(self, s => s.name())
    }

    fn port(&self) -> u16 {
        delegate!(self, s => s.port())
    }

    fn url(&self) -> &Url {
        delegate!(self, s => s.url())
    }

    async fn info(&self) -> GsfResult<Value> {
        delegate!(self, s => s.info().await)
    }

    async fn description(&self) -> GsfResult<String> {
        delegate!(self, s => s.description().await)
    }

    async fn version(&self) -> GsfResult<String> {
        delegate!(self, s => s.version().await)
    }

    async fn request_handlers(&self) -> GsfResult<Vec<String>> {
        delegate!(self, s => s.request_handlers().await)
    }

    async fn services(&self) -> GsfResult<Vec<String>> {
        delegate!(self, s => s.services().await)
    }

    async fn service(&self, name: &str) -> GsfResult<AnyService> {
        match self {
            AnyServer::Ese(s) => s.service(name).await.map(AnyService::Ese),
            AnyServer::Sdk(s) => s.service(name).await.map(AnyService::Sdk),
        }
    }

    fn job(&self, job_id: i64) -> GsfResult<AnyJob> {
        match self {
            AnyServer::Ese(s) => s.job(job_id).map(AnyJob::Ese),
            AnyServer::Sdk(s) => s.job(job_id).map(AnyJob::Sdk),
        }
    }

    async fn get_jobs(&self, query: &JobQuery) -> GsfResult<Vec<JobRecord>> {
        delegate!(self, s => s.get_jobs(query).await)
    }

    async fn cancel_job(&self, job_id: i64, raise_if_not_running: bool) -> GsfResult<CancelAck> {
        delegate!(self, s => s.cancel_job(job_id, raise_if_not_running).await)
    }
}

/// A service of either family.
#[derive(Debug)]
pub enum AnyService {
    Ese(EseService),
    Sdk(SdkService),
}

#[async_trait]
impl Service for AnyService {
    type Task = AnyTask;

    async fn name(&self) -> GsfResult<String> {
        delegate!(self, s => s.name().await)
    }

    async fn description(&self) -> GsfResult<String> {
        delegate!(self, s => s.description().await)
    }

    async fn tasks(&self) -> GsfResult<Vec<String>> {
        delegate!(self, s => s.tasks().await)
    }

    fn task(&self, name: &str) -> GsfResult<AnyTask> {
        match self {
            AnyService::Ese(s) => s.task(name).map(AnyTask::Ese),
            AnyService::Sdk(s) => s.task(name).map(AnyTask::Sdk),
        }
    }
}

/// A task of either family.
#[derive(Debug)]
pub enum AnyTask {
    Ese(EseTask),
    Sdk(SdkTask),
}

impl AnyTask {
    /// Open a task from its full URL. A URL with an `ese` path segment is an
    /// ESE task; anything else is read as an SDK task URL.
    pub fn from_url(uri: &Url, session: Session) -> GsfResult<Self> {
        let is_ese = uri
            .path_segments()
            .is_some_and(|mut segments| segments.any(|s| s == ROOT_SEGMENT));
        if is_ese {
            EseTask::from_url(uri.clone(), session).map(AnyTask::Ese)
        } else {
            SdkTask::from_url(uri, session).map(AnyTask::Sdk)
        }
    }
}

#[async_trait]
impl Task for AnyTask {
    type Job = AnyJob;

    fn uri(&self) -> &Url {
        delegate!(self, t => t.uri())
    }

    async fn name(&self) -> GsfResult<String> {
        delegate!(self, t => t.name().await)
    }

    async fn display_name(&self) -> GsfResult<String> {
        delegate!(self, t => t.display_name().await)
    }

    async fn description(&self) -> GsfResult<String> {
        delegate!(self, t => t.description().await)
    }

    async fn parameters(&self) -> GsfResult<Vec<Parameter>> {
        delegate!(self, t => t.parameters().await)
    }

    async fn submit(&self, parameters: Option<Map<String, Value>>) -> GsfResult<AnyJob> {
        match self {
            AnyTask::Ese(t) => t.submit(parameters).await.map(AnyJob::Ese),
            AnyTask::Sdk(t) => t.submit(parameters).await.map(AnyJob::Sdk),
        }
    }
}

/// A job of either family.
#[derive(Debug)]
pub enum AnyJob {
    Ese(EseJob),
    Sdk(SdkJob),
}

#[async_trait]
impl Job for AnyJob {
    fn job_id(&self) -> i64 {
        delegate!(self, j => j.job_id())
    }

    async fn snapshot(&self) -> GsfResult<JobSnapshot> {
        delegate!(self, j => j.snapshot().await)
    }

    fn poll_interval(&self) -> Duration {
        delegate!(self, j => j.poll_interval())
    }

    async fn cancel(&self) -> GsfResult<CancelAck> {
        delegate!(self, j => j.cancel().await)
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use super::{EseJob, EseService, ROOT_SEGMENT};
use crate::cache::ResponseCache;
use crate::contract::Server;
use crate::error::{Failure, GsfError, GsfResult};
use crate::http::{endpoint, host_and_port, server_url, Resource, Session};
use crate::job::{CancelAck, JobQuery, JobRecord};
use crate::normalize::{name_list, text_field};

const SERVICES_PATH: &str = "services";

/// Server handle for the ESE family. Clones share the metadata cache.
#[derive(Debug, Clone)]
pub struct EseServer {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    host: String,
    port: u16,
    /// `{base}/ese`
    url: Url,
    session: Session,
    cache: ResponseCache,
}

impl EseServer {
    /// Handle for `http://{host}:{port}/ese`. No request is made.
    pub fn new(host: &str, port: u16) -> GsfResult<Self> {
        Self::from_base_url(&server_url("http", host, port)?, Session::default())
    }

    /// Handle for the ESE root under `base`, using `session` for every request.
    pub fn from_base_url(base: &Url, session: Session) -> GsfResult<Self> {
        let (host, port) = host_and_port(base)?;
        Ok(Self {
            inner: Arc::new(Inner {
                host,
                port,
                url: endpoint(base, &[ROOT_SEGMENT])?,
                session,
                cache: ResponseCache::new(),
            }),
        })
    }

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// Drop memoized metadata; the next read goes back to the server.
    pub fn clear_cache(&self) {
        self.inner.cache.clear();
    }

    async fn services_document(&self) -> GsfResult<Value> {
        self.inner
            .cache
            .get_or_fetch(SERVICES_PATH, || async {
                let url = endpoint(&self.inner.url, &[SERVICES_PATH])?;
                self.inner
                    .session
                    .get(&url)
                    .await
                    .map_err(|e| e.addressing(Resource::Server))
            })
            .await
    }
}

#[async_trait]
impl Server for EseServer {
    type Service = EseService;
    type Job = EseJob;

    fn name(&self) -> &str {
        &self.inner.host
    }

    fn port(&self) -> u16 {
        self.inner.port
    }

    fn url(&self) -> &Url {
        &self.inner.url
    }

    /// ESE servers expose no separate info endpoint; the services document
    /// stands in for it.
    async fn info(&self) -> GsfResult<Value> {
        self.services_document().await
    }

    async fn description(&self) -> GsfResult<String> {
        Ok(text_field(&self.info().await?, "description").unwrap_or_default())
    }

    async fn version(&self) -> GsfResult<String> {
        text_field(&self.info().await?, "version")
            .ok_or_else(|| GsfError::Unsupported("ESE server does not report a version".into()))
    }

    async fn request_handlers(&self) -> GsfResult<Vec<String>> {
        let info = self.info().await?;
        let handlers = info
            .pointer("/configuration/requestHandlers")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                GsfError::Unsupported("ESE server does not report request handlers".into())
            })?;
        Ok(handlers
            .iter()
            .filter_map(|h| h.get("type").and_then(Value::as_str).map(str::to_string))
            .collect())
    }

    async fn services(&self) -> GsfResult<Vec<String>> {
        name_list(&self.services_document().await?, "services")
    }

    async fn service(&self, name: &str) -> GsfResult<EseService> {
        if !self.services().await?.iter().any(|s| s == name) {
            return Err(GsfError::ServiceNotFound(Failure::reason(format!(
                "Service {name} not found"
            ))));
        }
        Ok(EseService::new(
            endpoint(&self.inner.url, &[SERVICES_PATH, name])?,
            self.inner.url.clone(),
            self.inner.session.clone(),
        ))
    }

    fn job(&self, job_id: i64) -> GsfResult<EseJob> {
        EseJob::new(&self.inner.url, job_id, self.inner.session.clone())
    }

    async fn get_jobs(&self, _query: &JobQuery) -> GsfResult<Vec<JobRecord>> {
        Err(GsfError::Unsupported("ESE servers have no job listing endpoint".into()))
    }

    async fn cancel_job(&self, job_id: i64, _raise_if_not_running: bool) -> GsfResult<CancelAck> {
        Err(GsfError::Unsupported(format!(
            "ESE servers cannot cancel jobs (job {job_id})"
        )))
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use url::Url;

use super::{SdkJob, SdkService, SdkVersion};
use crate::cache::ResponseCache;
use crate::contract::{Job, Server};
use crate::error::{Failure, GsfError, GsfResult};
use crate::http::{endpoint, host_and_port, server_url, Resource, Session};
use crate::job::{CancelAck, JobQuery, JobRecord, JobStatus};
use crate::normalize::{name_list, text_field};

const INFO_PATH: &str = "reports/server-info";
const SERVICES_PATH: &str = "services";

/// Sent as `limit` to 2.x servers when the query has no limit.
const V2_NO_LIMIT: i64 = -1;

/// Server handle for the SDK family. Clones share the session and the
/// metadata cache; services, tasks and jobs each hold one.
#[derive(Debug, Clone)]
pub struct SdkServer {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    host: String,
    port: u16,
    url: Url,
    session: Session,
    cache: ResponseCache,
}

impl SdkServer {
    /// Connect to `http://{host}:{port}`, fetching the server info up front.
    pub async fn connect(host: &str, port: u16) -> GsfResult<Self> {
        Self::connect_with(&server_url("http", host, port)?, Session::default()).await
    }

    /// Connect to the server at `base`, fetching the server info up front.
    pub async fn connect_with(base: &Url, session: Session) -> GsfResult<Self> {
        let server = Self::from_base_url(base, session)?;
        server.info().await?;
        Ok(server)
    }

    /// Handle for the server at `base`. No request is made.
    pub fn from_base_url(base: &Url, session: Session) -> GsfResult<Self> {
        let (host, port) = host_and_port(base)?;
        let mut url = base.clone();
        url.set_query(None);
        Ok(Self {
            inner: Arc::new(Inner {
                host,
                port,
                url,
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

    /// Job listing/cancel dialect, from the server version.
    pub async fn api_version(&self) -> GsfResult<SdkVersion> {
        SdkVersion::parse(&self.version().await?)
    }

    pub(crate) fn endpoint(&self, segments: &[&str]) -> GsfResult<Url> {
        endpoint(&self.inner.url, segments)
    }

    async fn cached_get(&self, key: &str, segments: &[&str]) -> GsfResult<Value> {
        self.inner
            .cache
            .get_or_fetch(key, || async {
                let url = self.endpoint(segments)?;
                self.inner
                    .session
                    .get(&url)
                    .await
                    .map_err(|e| e.addressing(Resource::Server))
            })
            .await
    }

    fn parse_jobs(doc: Value) -> GsfResult<Vec<JobRecord>> {
        match doc {
            Value::Object(mut obj) => match obj.remove("jobs") {
                Some(jobs) => Ok(serde_json::from_value(jobs)?),
                None => Err(GsfError::MalformedResponse("job listing has no `jobs` list".into())),
            },
            other => Err(GsfError::MalformedResponse(format!(
                "job listing is not an object: {other}"
            ))),
        }
    }

    fn search_document(query: &JobQuery) -> Value {
        let mut filter = serde_json::Map::new();
        if let Some(status) = query.status {
            filter.insert("jobStatus".into(), json!({ "$eq": status.as_str() }));
        }
        if let Some(ref task_name) = query.task_name {
            filter.insert("taskName".into(), json!({ "$eq": task_name }));
        }

        let mut doc = json!({
            "offset": query.offset,
            "totals": "all",
            "sort": [["jobSubmitted", -1]],
            "query": filter,
        });
        if let Some(limit) = query.limit {
            doc["limit"] = json!(limit);
        }
        doc
    }
}

#[async_trait]
impl Server for SdkServer {
    type Service = SdkService;
    type Job = SdkJob;

    fn name(&self) -> &str {
        &self.inner.host
    }

    fn port(&self) -> u16 {
        self.inner.port
    }

    fn url(&self) -> &Url {
        &self.inner.url
    }

    async fn info(&self) -> GsfResult<Value> {
        self.cached_get(INFO_PATH, &["reports", "server-info"]).await
    }

    async fn description(&self) -> GsfResult<String> {
        Ok(text_field(&self.info().await?, "description").unwrap_or_default())
    }

    async fn version(&self) -> GsfResult<String> {
        text_field(&self.info().await?, "version")
            .ok_or_else(|| GsfError::MalformedResponse("server info has no version".into()))
    }

    async fn request_handlers(&self) -> GsfResult<Vec<String>> {
        let info = self.info().await?;
        Ok(info
            .pointer("/configuration/requestHandlers")
            .and_then(Value::as_array)
            .map(|handlers| {
                handlers
                    .iter()
                    .filter_map(|h| h.get("type").and_then(Value::as_str).map(str::to_string))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn services(&self) -> GsfResult<Vec<String>> {
        name_list(&self.cached_get(SERVICES_PATH, &[SERVICES_PATH]).await?, "services")
    }

    async fn service(&self, name: &str) -> GsfResult<SdkService> {
        if !self.services().await?.iter().any(|s| s == name) {
            return Err(GsfError::ServiceNotFound(Failure::reason(format!(
                "Service {name} not found"
            ))));
        }
        SdkService::new(self.clone(), name)
    }

    fn job(&self, job_id: i64) -> GsfResult<SdkJob> {
        SdkJob::new(self.clone(), job_id)
    }

    async fn get_jobs(&self, query: &JobQuery) -> GsfResult<Vec<JobRecord>> {
        match self.api_version().await? {
            SdkVersion::V2 => {
                let mut url = self.endpoint(&["jobs"])?;
                url.query_pairs_mut()
                    .append_pair(
                        "limit",
                        &query.limit.map_or(V2_NO_LIMIT, i64::from).to_string(),
                    )
                    .append_pair("offset", &query.offset.to_string());
                let doc = self
                    .inner
                    .session
                    .get(&url)
                    .await
                    .map_err(|e| e.addressing(Resource::Server))?;

                // The 2.x listing has no filters of its own.
                let mut jobs = Self::parse_jobs(doc)?;
                jobs.retain(|record| query.matches(record));
                Ok(jobs)
            }
            SdkVersion::V3 => {
                let url = self.endpoint(&["searchJobs"])?;
                let doc = self
                    .inner
                    .session
                    .post(&url, &Self::search_document(query))
                    .await
                    .map_err(|e| e.addressing(Resource::Server))?;
                Self::parse_jobs(doc)
            }
        }
    }

    async fn cancel_job(&self, job_id: i64, raise_if_not_running: bool) -> GsfResult<CancelAck> {
        let status = self.job(job_id)?.status().await?;
        if status != JobStatus::Started {
            let message = format!("Job {job_id} is not running (status {status})");
            if raise_if_not_running {
                return Err(GsfError::JobNotFound(Failure::reason(message)));
            }
            return Ok(CancelAck {
                message: format!("{message}; no cancel request sent"),
            });
        }

        let id = job_id.to_string();
        let response = match self.api_version().await? {
            SdkVersion::V2 => {
                let url = self.endpoint(&["job-console", &id])?;
                self.inner.session.delete(&url).await
            }
            SdkVersion::V3 => {
                let url = self.endpoint(&["jobs", &id])?;
                self.inner
                    .session
                    .put(&url, &json!({ "jobStatus": "CancelRequested" }))
                    .await
            }
        }
        .map_err(|e| e.addressing(Resource::Job))?;

        tracing::info!(job_id, "Cancel sent");
        Ok(CancelAck::from_response(&response, "Cancel Sent"))
    }
}

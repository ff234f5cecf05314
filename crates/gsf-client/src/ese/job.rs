use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::contract::Job;
use crate::error::{GsfError, GsfResult};
use crate::http::{endpoint, Resource, Session};
use crate::job::{message_text, progress_percent, CancelAck, JobSnapshot, JobStatus, StatusWatermark};
use crate::normalize::flatten_results;

/// Job handle for the ESE family.
#[derive(Debug)]
pub struct EseJob {
    job_id: i64,
    /// `{root}/jobs/{id}`
    url: Url,
    status_url: Url,
    session: Session,
    watermark: StatusWatermark,
}

impl EseJob {
    pub(crate) fn new(root: &Url, job_id: i64, session: Session) -> GsfResult<Self> {
        let id = job_id.to_string();
        Ok(Self {
            job_id,
            url: endpoint(root, &["jobs", &id])?,
            status_url: endpoint(root, &["jobs", &id, "status"])?,
            session,
            watermark: StatusWatermark::default(),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn parse_status(&self, doc: &Value) -> GsfResult<JobSnapshot> {
        let token = doc
            .get("jobStatus")
            .and_then(Value::as_str)
            .ok_or_else(|| GsfError::MalformedResponse(format!("job {} status has no jobStatus", self.job_id)))?;
        let status = self
            .watermark
            .observe(self.job_id, JobStatus::from_ese_token(token)?);

        Ok(JobSnapshot {
            job_id: self.job_id,
            status,
            progress: progress_percent(doc.get("jobProgress")),
            progress_message: message_text(doc.get("jobProgressMessage")),
            error_message: message_text(doc.get("jobErrorMessage")),
            results: flatten_results(doc.get("results").unwrap_or(&Value::Null))?,
        })
    }
}

#[async_trait]
impl Job for EseJob {
    fn job_id(&self) -> i64 {
        self.job_id
    }

    async fn snapshot(&self) -> GsfResult<JobSnapshot> {
        let doc = self
            .session
            .get(&self.status_url)
            .await
            .map_err(|e| e.addressing(Resource::Job))?;
        self.parse_status(&doc)
    }

    fn poll_interval(&self) -> Duration {
        self.session.poll_interval()
    }

    async fn cancel(&self) -> GsfResult<CancelAck> {
        Err(GsfError::Unsupported(format!(
            "ESE servers cannot cancel jobs (job {})",
            self.job_id
        )))
    }
}

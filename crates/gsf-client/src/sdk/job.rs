use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use super::SdkServer;
use crate::contract::{Job, Server};
use crate::error::{GsfError, GsfResult};
use crate::http::Resource;
use crate::job::{message_text, progress_percent, CancelAck, JobSnapshot, JobStatus, StatusWatermark};
use crate::normalize::flatten_results;

/// Job handle for the SDK family.
#[derive(Debug)]
pub struct SdkJob {
    server: SdkServer,
    job_id: i64,
    /// `{base}/jobs/{id}`
    url: Url,
    watermark: StatusWatermark,
}

impl SdkJob {
    pub(crate) fn new(server: SdkServer, job_id: i64) -> GsfResult<Self> {
        let url = server.endpoint(&["jobs", &job_id.to_string()])?;
        Ok(Self {
            server,
            job_id,
            url,
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
            .ok_or_else(|| GsfError::MalformedResponse(format!("job {} has no jobStatus", self.job_id)))?;
        let status = self
            .watermark
            .observe(self.job_id, JobStatus::from_sdk_token(token)?);

        Ok(JobSnapshot {
            job_id: self.job_id,
            status,
            progress: progress_percent(doc.get("jobProgress")),
            progress_message: message_text(doc.get("jobMessage")),
            error_message: message_text(doc.get("jobError")),
            results: flatten_results(doc.get("jobResults").unwrap_or(&Value::Null))?,
        })
    }
}

#[async_trait]
impl Job for SdkJob {
    fn job_id(&self) -> i64 {
        self.job_id
    }

    async fn snapshot(&self) -> GsfResult<JobSnapshot> {
        let doc = self
            .server
            .session()
            .get(&self.url)
            .await
            .map_err(|e| e.addressing(Resource::Job))?;
        self.parse_status(&doc)
    }

    fn poll_interval(&self) -> Duration {
        self.server.session().poll_interval()
    }

    async fn cancel(&self) -> GsfResult<CancelAck> {
        self.server.cancel_job(self.job_id, true).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Session;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn job_at(mock: &MockServer, id: i64) -> SdkJob {
        let session = Session::default().with_poll_interval(Duration::from_millis(10));
        let server = SdkServer::from_base_url(&Url::parse(&mock.uri()).unwrap(), session).unwrap();
        server.job(id).unwrap()
    }

    #[tokio::test]
    async fn test_snapshot_reads_canonical_fields() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobs/17"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jobId": 17,
                "jobStatus": "Succeeded",
                "jobProgress": 100,
                "jobMessage": "Completed",
                "jobResults": {
                    "OUTPUT_RASTER": {"best": {"url": "http://localhost:9191/jobs/17/out.dat", "factory": "URLRaster"}},
                    "COUNT": 3
                }
            })))
            .mount(&mock)
            .await;

        let job = job_at(&mock, 17);
        assert!(job.url().as_str().ends_with("/jobs/17"));

        let snapshot = job.snapshot().await.unwrap();
        assert_eq!(snapshot.status, JobStatus::Succeeded);
        assert_eq!(snapshot.progress, 100);
        assert_eq!(snapshot.progress_message, "Completed");
        assert_eq!(snapshot.error_message, "");
        assert_eq!(snapshot.results["OUTPUT_RASTER"]["factory"], "URLRaster");
        assert_eq!(snapshot.results["COUNT"], 3);
    }

    #[tokio::test]
    async fn test_failed_job_reports_error() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobs/18"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jobId": 18,
                "jobStatus": "Failed",
                "jobProgress": 40,
                "jobError": "Input raster could not be opened"
            })))
            .mount(&mock)
            .await;

        let job = job_at(&mock, 18);
        let done = job.wait_for_done(None).await.unwrap();
        assert_eq!(done.status, JobStatus::Failed);
        assert_eq!(done.error_message, "Input raster could not be opened");
        assert!(done.results.is_empty());
    }

    #[tokio::test]
    async fn test_status_never_moves_backwards() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobs/19"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jobId": 19, "jobStatus": "Started"})))
            .up_to_n_times(1)
            .mount(&mock)
            .await;
        Mock::given(method("GET"))
            .and(path("/jobs/19"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jobId": 19, "jobStatus": "Accepted"})))
            .mount(&mock)
            .await;

        let job = job_at(&mock, 19);
        assert_eq!(job.status().await.unwrap(), JobStatus::Started);
        assert_eq!(job.status().await.unwrap(), JobStatus::Started);
    }

    #[tokio::test]
    async fn test_cancel_delegates_to_server() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reports/server-info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "3.0"})))
            .mount(&mock)
            .await;
        Mock::given(method("GET"))
            .and(path("/jobs/20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jobId": 20, "jobStatus": "Accepted"})))
            .mount(&mock)
            .await;

        let job = job_at(&mock, 20);
        assert!(matches!(job.cancel().await, Err(GsfError::JobNotFound(_))));
    }
}

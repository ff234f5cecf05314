use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::sync::OnceCell;
use url::Url;

use super::{SdkJob, SdkServer};
use crate::contract::Task;
use crate::error::{GsfError, GsfResult};
use crate::http::{decoded_segments, Resource, Session};
use crate::job::submitted_job_id;
use crate::normalize::{normalize_parameters, text_field, Direction, Parameter, TaskInfo};

/// Task handle for the SDK family.
#[derive(Debug)]
pub struct SdkTask {
    server: SdkServer,
    service_name: String,
    task_name: String,
    /// `{base}/services/{service}/tasks/{task}`
    uri: Url,
    info: OnceCell<TaskInfo>,
}

impl SdkTask {
    pub(crate) fn new(server: SdkServer, service_name: &str, task_name: &str) -> GsfResult<Self> {
        let uri = server.endpoint(&["services", service_name, "tasks", task_name])?;
        Ok(Self {
            server,
            service_name: service_name.to_string(),
            task_name: task_name.to_string(),
            uri,
            info: OnceCell::new(),
        })
    }

    /// Open a task from its full URL, e.g.
    /// `http://localhost:9191/services/ENVI/tasks/SpectralIndex`.
    ///
    /// Everything before `/services/` is taken as the server root.
    pub fn from_url(uri: &Url, session: Session) -> GsfResult<Self> {
        let raw: Vec<&str> = uri.path_segments().map(|s| s.collect()).unwrap_or_default();
        let segments = decoded_segments(uri);
        let at = segments
            .windows(4)
            .rposition(|w| w[0] == "services" && w[2] == "tasks" && !w[3].is_empty())
            .filter(|at| at + 4 == segments.len())
            .ok_or_else(|| GsfError::Config(format!("{uri} is not an SDK task URL")))?;

        // The root keeps its original encoding; names are re-encoded by `new`.
        let mut base = uri.clone();
        base.set_query(None);
        base.set_path(&raw[..at].join("/"));

        let server = SdkServer::from_base_url(&base, session)?;
        Self::new(server, &segments[at + 1], &segments[at + 3])
    }

    /// Canonical task metadata (memoized).
    pub async fn info(&self) -> GsfResult<&TaskInfo> {
        self.info
            .get_or_try_init(|| async {
                let doc = self
                    .server
                    .session()
                    .get(&self.uri)
                    .await
                    .map_err(|e| e.addressing(Resource::Task))?;
                self.parse_task_info(&doc)
            })
            .await
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn server(&self) -> &SdkServer {
        &self.server
    }

    fn parse_task_info(&self, doc: &Value) -> GsfResult<TaskInfo> {
        let name = text_field(doc, "taskName")
            .or_else(|| text_field(doc, "name"))
            .unwrap_or_else(|| self.task_name.clone());

        let mut parameters = normalize_parameters(
            doc.get("inputParameters").unwrap_or(&Value::Null),
            Some(Direction::Input),
        )?;
        parameters.extend(normalize_parameters(
            doc.get("outputParameters").unwrap_or(&Value::Null),
            Some(Direction::Output),
        )?);

        Ok(TaskInfo {
            service_name: text_field(doc, "serviceName").unwrap_or_else(|| self.service_name.clone()),
            display_name: text_field(doc, "displayName").unwrap_or_else(|| name.clone()),
            description: text_field(doc, "description").unwrap_or_default(),
            parameters,
            name,
        })
    }
}

#[async_trait]
impl Task for SdkTask {
    type Job = SdkJob;

    fn uri(&self) -> &Url {
        &self.uri
    }

    async fn name(&self) -> GsfResult<String> {
        Ok(self.info().await?.name.clone())
    }

    async fn display_name(&self) -> GsfResult<String> {
        Ok(self.info().await?.display_name.clone())
    }

    async fn description(&self) -> GsfResult<String> {
        Ok(self.info().await?.description.clone())
    }

    async fn parameters(&self) -> GsfResult<Vec<Parameter>> {
        Ok(self.info().await?.parameters.clone())
    }

    async fn submit(&self, parameters: Option<Map<String, Value>>) -> GsfResult<SdkJob> {
        let mut body = json!({
            "serviceName": self.service_name,
            "taskName": self.task_name,
            "jobOptions": {
                "route": "default",
                "jobResultsFile": "job_results.json",
            },
        });
        if let Some(parameters) = parameters {
            body["inputParameters"] = Value::Object(parameters);
        }

        let url = self.server.endpoint(&["jobs"])?;
        let response = self
            .server
            .session()
            .post(&url, &body)
            .await
            .map_err(|e| e.addressing(Resource::Task))?;

        let job_id = submitted_job_id(&response)?;
        tracing::info!(
            service = %self.service_name,
            task = %self.task_name,
            job_id,
            "Submitted SDK job"
        );
        SdkJob::new(self.server.clone(), job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{Job, Server};
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn task_at(mock: &MockServer) -> SdkTask {
        let uri = Url::parse(&format!("{}/services/ENVI/tasks/SpectralIndex", mock.uri())).unwrap();
        SdkTask::from_url(&uri, Session::default()).unwrap()
    }

    #[test]
    fn test_from_url_splits_server_service_and_task() {
        let uri = Url::parse("http://gsf.example.com:9191/gsf/services/ENVI/tasks/SpectralIndex").unwrap();
        let task = SdkTask::from_url(&uri, Session::default()).unwrap();
        assert_eq!(task.service_name(), "ENVI");
        assert_eq!(task.task_name, "SpectralIndex");
        assert_eq!(task.server().url().as_str(), "http://gsf.example.com:9191/gsf");
        assert_eq!(task.uri(), &uri);

        for bad in [
            "http://localhost:9191/services/ENVI",
            "http://localhost:9191/services/ENVI/tasks/",
            "http://localhost:9191/ese/services/ENVI/SpectralIndex",
        ] {
            let uri = Url::parse(bad).unwrap();
            assert!(SdkTask::from_url(&uri, Session::default()).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_from_url_decodes_names_once() {
        let uri = Url::parse("http://localhost:9191/services/My%20Service/tasks/Spectral%20Index").unwrap();
        let task = SdkTask::from_url(&uri, Session::default()).unwrap();
        assert_eq!(task.service_name(), "My Service");
        assert_eq!(task.task_name, "Spectral Index");
        assert_eq!(task.uri(), &uri);
    }

    #[tokio::test]
    async fn test_submit_sends_decoded_names() {
        let mock = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/jobs"))
            .and(body_json(json!({
                "serviceName": "My Service",
                "taskName": "Spectral Index",
                "jobOptions": {"route": "default", "jobResultsFile": "job_results.json"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jobId": 21})))
            .expect(1)
            .mount(&mock)
            .await;

        let uri = Url::parse(&format!("{}/services/My%20Service/tasks/Spectral%20Index", mock.uri())).unwrap();
        let task = SdkTask::from_url(&uri, Session::default()).unwrap();
        assert_eq!(task.submit(None).await.unwrap().job_id(), 21);
    }

    #[tokio::test]
    async fn test_task_info_joins_inputs_and_outputs() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/services/ENVI/tasks/SpectralIndex"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "taskName": "SpectralIndex",
                "serviceName": "ENVI",
                "displayName": "Spectral Index",
                "description": "This task creates a spectral index raster.",
                "inputParameters": [
                    {"name": "INPUT_RASTER", "type": "ENVIRASTER", "required": true},
                    {"name": "INDEX", "type": "string", "required": true,
                     "choiceList": ["Normalized Difference Vegetation Index"]}
                ],
                "outputParameters": [
                    {"name": "OUTPUT_RASTER", "type": "ENVIRASTER", "required": true}
                ]
            })))
            .expect(1)
            .mount(&mock)
            .await;

        let task = task_at(&mock);
        assert_eq!(task.name().await.unwrap(), "SpectralIndex");
        assert_eq!(task.display_name().await.unwrap(), "Spectral Index");

        let params = task.parameters().await.unwrap();
        let names: Vec<_> = params.iter().map(|p| (p.name.as_str(), p.direction)).collect();
        assert_eq!(
            names,
            vec![
                ("INPUT_RASTER", Direction::Input),
                ("INDEX", Direction::Input),
                ("OUTPUT_RASTER", Direction::Output)
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_task_is_task_not_found() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Task not found"))
            .mount(&mock)
            .await;

        let task = task_at(&mock);
        assert!(matches!(task.description().await, Err(GsfError::TaskNotFound(_))));
    }

    #[tokio::test]
    async fn test_submit_posts_job_request() {
        let mock = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/jobs"))
            .and(body_json(json!({
                "serviceName": "ENVI",
                "taskName": "SpectralIndex",
                "jobOptions": {"route": "default", "jobResultsFile": "job_results.json"},
                "inputParameters": {"INDEX": "Normalized Difference Vegetation Index"}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"jobId": 17})))
            .expect(1)
            .mount(&mock)
            .await;

        let task = task_at(&mock);
        let mut params = Map::new();
        params.insert("INDEX".into(), json!("Normalized Difference Vegetation Index"));
        let job = task.submit(Some(params)).await.unwrap();
        assert_eq!(job.job_id(), 17);
    }

    #[tokio::test]
    async fn test_submit_without_parameters_omits_them() {
        let mock = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/jobs"))
            .and(body_json(json!({
                "serviceName": "ENVI",
                "taskName": "SpectralIndex",
                "jobOptions": {"route": "default", "jobResultsFile": "job_results.json"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jobID": "18"})))
            .mount(&mock)
            .await;

        let task = task_at(&mock);
        assert_eq!(task.submit(None).await.unwrap().job_id(), 18);
    }
}

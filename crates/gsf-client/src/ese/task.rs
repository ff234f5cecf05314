use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::OnceCell;
use url::Url;

use super::EseJob;
use crate::contract::Task;
use crate::error::{GsfError, GsfResult};
use crate::http::{endpoint, Resource, Session};
use crate::job::submitted_job_id;
use crate::normalize::{normalize_parameters, text_field, Parameter, TaskInfo};

/// Task handle for the ESE family.
#[derive(Debug)]
pub struct EseTask {
    uri: Url,
    /// `{base}/ese`, where job status endpoints live.
    root: Url,
    session: Session,
    info: OnceCell<TaskInfo>,
}

impl EseTask {
    pub(crate) fn new(uri: Url, root: Url, session: Session) -> Self {
        Self {
            uri,
            root,
            session,
            info: OnceCell::new(),
        }
    }

    /// Open a task from its full URL, e.g.
    /// `http://localhost:9191/ese/services/ENVI/SpectralIndex`.
    pub fn from_url(uri: Url, session: Session) -> GsfResult<Self> {
        let first = uri
            .path_segments()
            .and_then(|mut segments| segments.next())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| GsfError::Config(format!("{uri} is not an ESE task URL")))?;
        let mut root = uri.clone();
        root.set_path(&first);
        root.set_query(None);
        Ok(Self::new(uri, root, session))
    }

    /// Canonical task metadata (memoized).
    pub async fn info(&self) -> GsfResult<&TaskInfo> {
        self.info
            .get_or_try_init(|| async {
                let doc = self
                    .session
                    .get(&self.uri)
                    .await
                    .map_err(|e| e.addressing(Resource::Task))?;
                parse_task_info(&doc, &self.uri)
            })
            .await
    }

    pub async fn service_name(&self) -> GsfResult<String> {
        Ok(self.info().await?.service_name.clone())
    }
}

fn parse_task_info(doc: &Value, uri: &Url) -> GsfResult<TaskInfo> {
    let segments: Vec<&str> = uri.path_segments().map(|s| s.collect()).unwrap_or_default();
    let from_path = |back: usize| {
        segments
            .len()
            .checked_sub(back)
            .and_then(|i| segments.get(i))
            .map(|s| s.to_string())
    };

    let name = text_field(doc, "name")
        .or_else(|| from_path(1))
        .ok_or_else(|| GsfError::MalformedResponse("task info has no name".into()))?;

    Ok(TaskInfo {
        service_name: text_field(doc, "serviceName")
            .or_else(|| from_path(2))
            .unwrap_or_default(),
        display_name: text_field(doc, "displayName").unwrap_or_else(|| name.clone()),
        description: text_field(doc, "description").unwrap_or_default(),
        parameters: normalize_parameters(doc.get("parameters").unwrap_or(&Value::Null), None)?,
        name,
    })
}

#[async_trait]
impl Task for EseTask {
    type Job = EseJob;

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

    async fn submit(&self, parameters: Option<Map<String, Value>>) -> GsfResult<EseJob> {
        let url = endpoint(&self.uri, &["submitJob"])?;
        let body = Value::Object(parameters.unwrap_or_default());
        let response = self
            .session
            .post(&url, &body)
            .await
            .map_err(|e| e.addressing(Resource::Task))?;

        let job_id = submitted_job_id(&response)?;
        tracing::info!(task = %self.uri, job_id, "Submitted ESE job");
        EseJob::new(&self.root, job_id, self.session.clone())
    }
}

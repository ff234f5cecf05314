use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::OnceCell;
use url::Url;

use super::EseTask;
use crate::contract::Service;
use crate::error::{GsfError, GsfResult};
use crate::http::{endpoint, Resource, Session};
use crate::normalize::{name_list, text_field};

/// Service handle for the ESE family.
#[derive(Debug)]
pub struct EseService {
    url: Url,
    root: Url,
    session: Session,
    info: OnceCell<Value>,
}

impl EseService {
    pub(crate) fn new(url: Url, root: Url, session: Session) -> Self {
        Self {
            url,
            root,
            session,
            info: OnceCell::new(),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn info(&self) -> GsfResult<&Value> {
        self.info
            .get_or_try_init(|| async {
                self.session
                    .get(&self.url)
                    .await
                    .map_err(|e| e.addressing(Resource::Service))
            })
            .await
    }
}

#[async_trait]
impl Service for EseService {
    type Task = EseTask;

    async fn name(&self) -> GsfResult<String> {
        text_field(self.info().await?, "name")
            .ok_or_else(|| GsfError::MalformedResponse("service info has no name".into()))
    }

    async fn description(&self) -> GsfResult<String> {
        Ok(text_field(self.info().await?, "description").unwrap_or_default())
    }

    async fn tasks(&self) -> GsfResult<Vec<String>> {
        name_list(self.info().await?, "tasks")
    }

    fn task(&self, name: &str) -> GsfResult<EseTask> {
        Ok(EseTask::new(
            endpoint(&self.url, &[name])?,
            self.root.clone(),
            self.session.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::Task;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service_at(mock: &MockServer, name: &str) -> EseService {
        let root = Url::parse(&format!("{}/ese", mock.uri())).unwrap();
        let url = endpoint(&root, &["services", name]).unwrap();
        EseService::new(url, root, Session::default())
    }

    #[tokio::test]
    async fn test_service_info() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ese/services/ENVI"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "ENVI",
                "description": "ENVI processing routines",
                "tasks": ["AdditiveLeeAdaptiveFilter", "ApplyGainOffset", "SpectralIndex"]
            })))
            .expect(1)
            .mount(&mock)
            .await;

        let service = service_at(&mock, "ENVI");
        assert_eq!(service.name().await.unwrap(), "ENVI");
        assert_eq!(service.description().await.unwrap(), "ENVI processing routines");
        assert_eq!(service.tasks().await.unwrap().len(), 3);

        let task = service.task("SpectralIndex").unwrap();
        assert!(task.uri().as_str().ends_with("/ese/services/ENVI/SpectralIndex"));
    }

    #[tokio::test]
    async fn test_missing_service_is_service_not_found() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Bad Request"))
            .mount(&mock)
            .await;

        let service = service_at(&mock, "Rfaefhguh");
        match service.tasks().await {
            Err(GsfError::ServiceNotFound(f)) => {
                assert_eq!(f.status, Some(400));
                assert_eq!(f.reason, "Bad Request");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::OnceCell;
use url::Url;

use super::{SdkServer, SdkTask};
use crate::contract::Service;
use crate::error::GsfResult;
use crate::http::{endpoint, Resource};
use crate::normalize::{name_list, text_field};

/// Service handle for the SDK family.
#[derive(Debug)]
pub struct SdkService {
    server: SdkServer,
    name: String,
    /// `{base}/services/{name}`
    url: Url,
    info: OnceCell<Value>,
    tasks: OnceCell<Vec<String>>,
}

impl SdkService {
    pub(crate) fn new(server: SdkServer, name: &str) -> GsfResult<Self> {
        let url = server.endpoint(&["services", name])?;
        Ok(Self {
            server,
            name: name.to_string(),
            url,
            info: OnceCell::new(),
            tasks: OnceCell::new(),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn info(&self) -> GsfResult<&Value> {
        self.info
            .get_or_try_init(|| async {
                self.server
                    .session()
                    .get(&self.url)
                    .await
                    .map_err(|e| e.addressing(Resource::Service))
            })
            .await
    }
}

#[async_trait]
impl Service for SdkService {
    type Task = SdkTask;

    async fn name(&self) -> GsfResult<String> {
        Ok(text_field(self.info().await?, "name").unwrap_or_else(|| self.name.clone()))
    }

    async fn description(&self) -> GsfResult<String> {
        Ok(text_field(self.info().await?, "description").unwrap_or_default())
    }

    async fn tasks(&self) -> GsfResult<Vec<String>> {
        self.tasks
            .get_or_try_init(|| async {
                let url = endpoint(&self.url, &["tasks"])?;
                let doc = self
                    .server
                    .session()
                    .get(&url)
                    .await
                    .map_err(|e| e.addressing(Resource::Service))?;
                name_list(&doc, "tasks")
            })
            .await
            .cloned()
    }

    fn task(&self, name: &str) -> GsfResult<SdkTask> {
        SdkTask::new(self.server.clone(), &self.name, name)
    }
}

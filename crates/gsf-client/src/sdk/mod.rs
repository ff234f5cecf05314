//! SDK adapter — the REST layout of GSF 2.x and 3.x servers, rooted at the
//! server URL.
//!
//! ```text
//! GET  /reports/server-info                server info (version, handlers)
//! GET  /services                           service list
//! GET  /services/{svc}                     service info
//! GET  /services/{svc}/tasks               task list
//! GET  /services/{svc}/tasks/{task}        task info (input/outputParameters)
//! POST /jobs                               submit
//! GET  /jobs/{id}                          job status (canonical tokens)
//! ```
//!
//! Job listing and cancellation differ between server versions; see
//! [`SdkVersion`].

mod job;
mod server;
mod service;
mod task;

pub use job::SdkJob;
pub use server::SdkServer;
pub use service::SdkService;
pub use task::SdkTask;

use crate::error::{GsfError, GsfResult};

/// Server version dialect for job listing and cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdkVersion {
    /// `GET /jobs?limit&offset`, `DELETE /job-console/{id}`.
    V2,
    /// `POST /searchJobs`, `PUT /jobs/{id}` with `CancelRequested`.
    V3,
}

impl SdkVersion {
    /// Resolve a server version string by its major-version prefix.
    pub fn parse(version: &str) -> GsfResult<Self> {
        if version.starts_with("2.") {
            Ok(SdkVersion::V2)
        } else if version.starts_with("3.") {
            Ok(SdkVersion::V3)
        } else {
            Err(GsfError::UnsupportedVersion(version.to_string()))
        }
    }
}

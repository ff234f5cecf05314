//! # gsf-client
//!
//! Rust client for the Geospatial Services Framework (GSF), a job-processing
//! server that runs ENVI and IDL analytics as asynchronous jobs.
//!
//! This crate provides:
//! - Protocol-independent contracts for servers, services, tasks and jobs
//! - Adapters for the legacy ESE layout and the GSF 2.x/3.x SDK layout
//! - Automatic protocol selection
//! - Canonical task parameter and job result shapes
//! - Job polling with progress callbacks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gsf_client::{AnyServer, Job, Protocol, Server, Service, Session, Task};
//! use serde_json::json;
//! use url::Url;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let base = Url::parse("http://localhost:9191")?;
//!     let server = AnyServer::connect(&base, Session::default(), Protocol::Auto).await?;
//!
//!     let service = server.service("ENVI").await?;
//!     let task = service.task("SpectralIndex")?;
//!
//!     let params = json!({
//!         "INPUT_RASTER": {"url": "http://localhost:9191/data/qb_boulder_msi", "factory": "URLRaster"},
//!         "INDEX": "Normalized Difference Vegetation Index",
//!     });
//!     let job = task.submit(params.as_object().cloned()).await?;
//!
//!     let mut report = |s: &gsf_client::JobSnapshot| println!("{}% {}", s.progress, s.progress_message);
//!     let done = job.wait_for_done(Some(&mut report)).await?;
//!     println!("{}: {:?}", done.status, done.results.get("OUTPUT_RASTER"));
//!     Ok(())
//! }
//! ```

pub mod any;
pub mod cache;
pub mod config;
pub mod contract;
pub mod error;
pub mod ese;
pub mod http;
pub mod job;
pub mod logging;
pub mod normalize;
pub mod sdk;

// Re-exports
pub use any::{AnyJob, AnyServer, AnyService, AnyTask, Protocol};
pub use config::{connect, open_task, GsfConfig, LoggingConfig};
pub use contract::{Job, Server, Service, Task};
pub use error::{Failure, GsfError, GsfResult};
pub use ese::{EseJob, EseServer, EseService, EseTask};
pub use http::{Auth, HttpClient, ReqwestClient, Session};
pub use job::{CancelAck, JobQuery, JobRecord, JobSnapshot, JobStatus};
pub use logging::init_logging;
pub use normalize::{Direction, JobResults, Parameter, ResultRecord, TaskInfo};
pub use sdk::{SdkJob, SdkServer, SdkService, SdkTask, SdkVersion};

//! ESE adapter — the legacy endpoint layout rooted at `{base}/ese`.
//!
//! ```text
//! GET  /ese/services                       service list
//! GET  /ese/services/{svc}                 service info
//! GET  /ese/services/{svc}/{task}          task info (dataType, parameterType)
//! POST /ese/services/{svc}/{task}/submitJob
//! GET  /ese/jobs/{id}/status               job status (esriJob* tokens)
//! ```
//!
//! The family has no job listing or cancellation endpoints; those
//! operations fail with [`crate::GsfError::Unsupported`].

mod job;
mod server;
mod service;
mod task;

pub use job::EseJob;
pub use server::EseServer;
pub use service::EseService;
pub use task::EseTask;

/// Path segment every ESE endpoint hangs off.
pub const ROOT_SEGMENT: &str = "ese";

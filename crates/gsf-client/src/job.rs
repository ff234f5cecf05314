//! Job state — the canonical view of an asynchronous GSF job.
//!
//! Every job moves through the same lifecycle, whatever the server family:
//!
//! ```text
//! ACCEPTED → STARTED → SUCCEEDED (terminal)
//!                    → FAILED (terminal)
//! ```
//!
//! Servers speak their own status tokens; adapters translate them into
//! [`JobStatus`] when a status document is parsed.

use std::str::FromStr;
use std::sync::Mutex;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::GsfError;
use crate::normalize::{JobResults, ResultRecord};

/// The status of a job in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum JobStatus {
    /// Job has been queued but not yet started.
    Accepted,

    /// Job is running.
    Started,

    /// Job finished successfully (terminal).
    Succeeded,

    /// Job failed (terminal).
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Accepted,
        JobStatus::Started,
        JobStatus::Succeeded,
        JobStatus::Failed,
    ];

    /// Check if the status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Accepted => "Accepted",
            JobStatus::Started => "Started",
            JobStatus::Succeeded => "Succeeded",
            JobStatus::Failed => "Failed",
        }
    }

    /// Translate an ESE status token (`esriJob*`).
    pub fn from_ese_token(token: &str) -> Result<Self, GsfError> {
        match token {
            "esriJobSucceeded" => Ok(JobStatus::Succeeded),
            "esriJobFailed" => Ok(JobStatus::Failed),
            "esriJobSubmitted" => Ok(JobStatus::Accepted),
            "esriJobExecuting" => Ok(JobStatus::Started),
            other => Err(GsfError::UnrecognizedStatus(other.to_string())),
        }
    }

    /// Translate an SDK status token; these are already canonical.
    pub fn from_sdk_token(token: &str) -> Result<Self, GsfError> {
        Self::ALL
            .into_iter()
            .find(|s| s.as_str() == token)
            .ok_or_else(|| GsfError::UnrecognizedStatus(token.to_string()))
    }

    fn rank(&self) -> u8 {
        match self {
            JobStatus::Accepted => 0,
            JobStatus::Started => 1,
            JobStatus::Succeeded | JobStatus::Failed => 2,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a caller-supplied status filter value.
impl FromStr for JobStatus {
    type Err = GsfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| GsfError::JobStatusNotFound(s.to_string()))
    }
}

/// Highest status observed for one job handle.
///
/// Reads are live, but a reported status that would move the job backwards
/// (including out of a terminal state) is replaced by the last one observed.
#[derive(Debug, Default)]
pub(crate) struct StatusWatermark {
    seen: Mutex<Option<JobStatus>>,
}

impl StatusWatermark {
    pub(crate) fn observe(&self, job_id: i64, reported: JobStatus) -> JobStatus {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        match *seen {
            Some(prev) if prev.is_terminal() || prev.rank() > reported.rank() => {
                if prev != reported {
                    tracing::warn!(
                        job_id,
                        observed = %prev,
                        reported = %reported,
                        "Server reported a status behind one already observed; keeping it"
                    );
                }
                prev
            }
            _ => {
                *seen = Some(reported);
                reported
            }
        }
    }
}

/// One poll's worth of job state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobSnapshot {
    pub job_id: i64,
    pub status: JobStatus,
    /// Percentage complete, 0 to 100.
    pub progress: u8,
    /// Empty when the server sent none.
    pub progress_message: String,
    /// Empty when the server sent none.
    pub error_message: String,
    /// Output parameter name → value.
    #[schemars(with = "Vec<ResultRecord>")]
    pub results: JobResults,
}

/// One entry of a server job listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    #[serde(alias = "jobID")]
    pub job_id: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_progress: Option<f64>,

    /// Every other field the server reported.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobRecord {
    /// The record's status, when it is one of the canonical four.
    pub fn status(&self) -> Option<JobStatus> {
        self.job_status
            .as_deref()
            .and_then(|s| JobStatus::from_sdk_token(s).ok())
    }
}

/// Filters for listing jobs.
///
/// `limit = None` means no limit.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct JobQuery {
    pub status: Option<JobStatus>,
    pub task_name: Option<String>,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl JobQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Filter by a status given by name; unknown names are `JobStatusNotFound`.
    pub fn status_named(self, status: &str) -> Result<Self, GsfError> {
        Ok(self.status(status.parse()?))
    }

    pub fn task_name(mut self, task_name: impl Into<String>) -> Self {
        self.task_name = Some(task_name.into());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    /// Whether a listed record passes the status and task filters.
    pub fn matches(&self, record: &JobRecord) -> bool {
        let status_ok = self
            .status
            .map_or(true, |s| record.job_status.as_deref() == Some(s.as_str()));
        let task_ok = self
            .task_name
            .as_deref()
            .map_or(true, |t| record.task_name.as_deref() == Some(t));
        status_ok && task_ok
    }
}

/// Acknowledgement of a cancel request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelAck {
    pub message: String,
}

impl CancelAck {
    pub(crate) fn from_response(value: &Value, fallback: &str) -> Self {
        let message = match value.get("message") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => fallback.to_string(),
        };
        Self { message }
    }
}

/// Render an optional message field the way the server meant it: absent or
/// null is empty, strings verbatim, anything else as JSON text.
pub(crate) fn message_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Clamp a reported progress value into 0..=100.
pub(crate) fn progress_percent(value: Option<&Value>) -> u8 {
    let raw = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    };
    raw.round().clamp(0.0, 100.0) as u8
}

/// Read a job id that may be sent as a number or a numeric string.
pub(crate) fn job_id_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Job id from a submit response. Servers spell the field `jobId` or
/// `jobID`; `jobId` wins when both are present.
pub(crate) fn submitted_job_id(response: &Value) -> Result<i64, GsfError> {
    ["jobId", "jobID"]
        .iter()
        .find_map(|key| response.get(*key).and_then(job_id_value))
        .ok_or_else(|| GsfError::MalformedResponse(format!("submit response has no job id: {response}")))
}

//! GSF error types.

use std::fmt;

use thiserror::Error;

/// Details of a failed request: the HTTP status (when the server answered)
/// and the reason text it gave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// HTTP status code, `None` for transport-level failures.
    pub status: Option<u16>,

    /// Response body, reason phrase, or transport error description.
    pub reason: String,
}

impl Failure {
    /// A failure reported by the server with an HTTP status.
    pub fn http(status: u16, reason: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            reason: reason.into(),
        }
    }

    /// A failure with no HTTP status attached.
    pub fn reason(reason: impl Into<String>) -> Self {
        Self {
            status: None,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(code) => write!(f, "HTTP code {code}, Reason: {}", self.reason),
            None => write!(f, "Reason: {}", self.reason),
        }
    }
}

/// Errors that can occur when talking to a GSF server.
#[derive(Debug, Error)]
pub enum GsfError {
    /// The server could not be reached, or a server-level endpoint failed.
    #[error("server not found: {0}")]
    ServerNotFound(Failure),

    /// The named service does not exist, or its endpoint failed.
    #[error("service not found: {0}")]
    ServiceNotFound(Failure),

    /// The named task does not exist, its endpoint failed, or a submit was rejected.
    #[error("task not found: {0}")]
    TaskNotFound(Failure),

    /// The job id is unknown, its endpoint failed, or it cannot be canceled.
    #[error("job not found: {0}")]
    JobNotFound(Failure),

    /// A job status filter value that is not one of the canonical statuses.
    #[error("job status not found: {0}")]
    JobStatusNotFound(String),

    /// The server reported a job status token outside the canonical set.
    #[error("unrecognized job status reported by server: {0}")]
    UnrecognizedStatus(String),

    /// The server's GSF version has no known job-listing/cancel dialect.
    #[error("unsupported GSF server version: {0}")]
    UnsupportedVersion(String),

    /// The protocol family does not offer this operation.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// A successful response was missing an expected field.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// JSON serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Configuration could not be read or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),
}

impl GsfError {
    /// The HTTP status code behind a domain error, if there was one.
    pub fn status_code(&self) -> Option<u16> {
        self.failure().and_then(|f| f.status)
    }

    /// The request failure carried by the five domain kinds.
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            GsfError::ServerNotFound(f)
            | GsfError::ServiceNotFound(f)
            | GsfError::TaskNotFound(f)
            | GsfError::JobNotFound(f) => Some(f),
            _ => None,
        }
    }
}

/// GSF Result type alias.
pub type GsfResult<T> = Result<T, GsfError>;

//! HTTP access — the injectable transport and the request helper the
//! adapters use.
//!
//! The helper performs exactly one request per call and decodes the JSON
//! body. It does not decide which domain error an HTTP failure becomes:
//! that depends on the resource being addressed, so adapters call
//! [`HttpError::addressing`] with the [`Resource`] they were talking to.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::error::{Failure, GsfError, GsfResult};

/// Default interval between job status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

// ── Transport ────────────────────────────────────────────────

/// HTTP method of a GSF request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

/// A single request handed to the transport.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    /// JSON body, sent with `Content-Type: application/json`.
    pub body: Option<Value>,
}

/// The raw answer from the transport.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// Canonical reason phrase for `status`, if known.
    pub reason: Option<String>,
    pub body: String,
}

/// The request never produced an HTTP response (DNS, connect, I/O).
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Capability to issue HTTP requests. Implement this to plug in a
/// pre-authenticated or instrumented transport.
#[async_trait]
pub trait HttpClient: Send + Sync + std::fmt::Debug {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Credentials applied to every request by [`ReqwestClient`].
///
/// `Debug` output hides the password and token.
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    Basic {
        username: String,
        password: Option<String>,
    },
    Bearer(String),
}

pub(crate) const REDACTED: &str = "<redacted>";

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::Basic { username, password } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &password.as_ref().map(|_| REDACTED))
                .finish(),
            Auth::Bearer(_) => f.debug_tuple("Bearer").field(&REDACTED).finish(),
        }
    }
}

/// Default transport backed by `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestClient {
    http: Client,
    auth: Option<Auth>,
}

impl ReqwestClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing (possibly pre-configured) reqwest client.
    pub fn with_http_client(http: Client) -> Self {
        Self { http, auth: None }
    }

    /// Set credentials sent with each request.
    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self
            .http
            .request(method, request.url)
            .header("Accept", "application/json");

        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        builder = match self.auth {
            Some(Auth::Basic {
                ref username,
                ref password,
            }) => builder.basic_auth(username, password.as_ref()),
            Some(Auth::Bearer(ref token)) => builder.bearer_auth(token),
            None => builder,
        };

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().map(str::to_string),
            body,
        })
    }
}

// ── Helper ───────────────────────────────────────────────────

/// The kind of resource a request addressed; decides which domain error an
/// HTTP failure maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Server,
    Service,
    Task,
    Job,
}

/// Failure of a single helper call, before domain mapping.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("HTTP code {status}, Reason: {reason}")]
    Status { status: u16, reason: String },

    #[error("invalid JSON in response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl HttpError {
    /// Map to the domain error for the resource that was addressed.
    ///
    /// Transport failures are always `ServerNotFound`; undecodable bodies
    /// are `Serialization` whatever the resource.
    pub fn addressing(self, resource: Resource) -> GsfError {
        match self {
            HttpError::Transport(e) => GsfError::ServerNotFound(Failure::reason(e.0)),
            HttpError::Decode(e) => GsfError::Serialization(e),
            HttpError::Status { status, reason } => {
                let failure = Failure::http(status, reason);
                match resource {
                    Resource::Server => GsfError::ServerNotFound(failure),
                    Resource::Service => GsfError::ServiceNotFound(failure),
                    Resource::Task => GsfError::TaskNotFound(failure),
                    Resource::Job => GsfError::JobNotFound(failure),
                }
            }
        }
    }
}

/// Shared request helper. Cheap to clone; clones share the transport.
#[derive(Debug, Clone)]
pub struct Session {
    client: Arc<dyn HttpClient>,
    poll_interval: Duration,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(ReqwestClient::new())
    }
}

impl Session {
    pub fn new(client: impl HttpClient + 'static) -> Self {
        Self::from_arc(Arc::new(client))
    }

    pub fn from_arc(client: Arc<dyn HttpClient>) -> Self {
        Self {
            client,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Interval `wait_for_done` sleeps between polls for jobs created
    /// through this session.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub async fn get(&self, url: &Url) -> Result<Value, HttpError> {
        self.call(Method::Get, url, None).await
    }

    pub async fn post(&self, url: &Url, body: &Value) -> Result<Value, HttpError> {
        self.call(Method::Post, url, Some(body.clone())).await
    }

    pub async fn put(&self, url: &Url, body: &Value) -> Result<Value, HttpError> {
        self.call(Method::Put, url, Some(body.clone())).await
    }

    pub async fn delete(&self, url: &Url) -> Result<Value, HttpError> {
        self.call(Method::Delete, url, None).await
    }

    async fn call(&self, method: Method, url: &Url, body: Option<Value>) -> Result<Value, HttpError> {
        tracing::debug!(method = method.as_str(), url = %url, "Sending GSF request");

        let response = self
            .client
            .send(HttpRequest {
                method,
                url: url.clone(),
                body,
            })
            .await?;

        if response.status >= 400 {
            tracing::warn!(
                method = method.as_str(),
                url = %url,
                status = response.status,
                "GSF request failed"
            );
            let reason = if response.body.trim().is_empty() {
                response.reason.unwrap_or_default()
            } else {
                response.body
            };
            return Err(HttpError::Status {
                status: response.status,
                reason,
            });
        }

        if response.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&response.body)?)
    }
}

/// Root URL of a GSF server, e.g. `http://localhost:9191`.
pub fn server_url(scheme: &str, host: &str, port: u16) -> GsfResult<Url> {
    Ok(Url::parse(&format!("{scheme}://{host}:{port}"))?)
}

/// Host and port of a server URL.
pub(crate) fn host_and_port(url: &Url) -> GsfResult<(String, u16)> {
    let host = url
        .host_str()
        .ok_or_else(|| GsfError::Config(format!("{url} has no host")))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| GsfError::Config(format!("{url} has no port")))?;
    Ok((host.to_string(), port))
}

/// Path segments of `url` with percent-encoding removed.
pub(crate) fn decoded_segments(url: &Url) -> Vec<String> {
    url.path_segments()
        .map(|segments| {
            segments
                .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default()
}

/// Append path segments to `base`, percent-encoding each one.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> GsfResult<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| GsfError::Config(format!("{base} cannot be used as a base URL")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

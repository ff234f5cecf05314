//! Configuration for GSF clients.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::any::{AnyServer, AnyTask, Protocol};
use crate::error::{GsfError, GsfResult};
use crate::http::{server_url, Auth, ReqwestClient, Session, REDACTED};

/// GSF client configuration — typically stored at `~/.gsf/config.toml`.
///
/// ```toml
/// host = "gsf.example.com"
/// port = 9191
/// protocol = "sdk"
/// token = "..."
///
/// [logging]
/// json = true
/// ```
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct GsfConfig {
    /// Server host name.
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// `http` or `https`.
    #[serde(default = "default_scheme")]
    pub scheme: String,

    #[serde(default)]
    pub protocol: Protocol,

    /// Basic auth user (or read from GSF_USERNAME).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Bearer token (or read from GSF_TOKEN). Takes precedence over basic auth.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Full URL of the task opened by [`open_task`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_url: Option<String>,

    /// Interval between job status polls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for GsfConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            scheme: default_scheme(),
            protocol: Protocol::default(),
            username: None,
            password: None,
            token: None,
            task_url: None,
            poll_interval_ms: default_poll_interval_ms(),
            logging: LoggingConfig::default(),
        }
    }
}

impl fmt::Debug for GsfConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GsfConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("scheme", &self.scheme)
            .field("protocol", &self.protocol)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| REDACTED))
            .field("token", &self.token.as_ref().map(|_| REDACTED))
            .field("task_url", &self.task_url)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("logging", &self.logging)
            .finish()
    }
}

fn default_host() -> String {
    "localhost".into()
}

fn default_port() -> u16 {
    9191
}

fn default_scheme() -> String {
    "http".into()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,

    /// `EnvFilter` directives, used when RUST_LOG is not set.
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json: false,
            filter: default_filter(),
        }
    }
}

fn default_filter() -> String {
    "info,gsf_client=debug".into()
}

impl GsfConfig {
    /// `~/.gsf/config.toml`, when a home directory is known.
    pub fn default_path() -> Option<PathBuf> {
        dirs_next::home_dir().map(|home| home.join(".gsf").join("config.toml"))
    }

    /// Read a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> GsfResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| GsfError::Config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&text)
            .map_err(|e| GsfError::Config(format!("invalid config {}: {e}", path.display())))
    }

    /// The file at [`GsfConfig::default_path`] if there is one, defaults
    /// otherwise, with environment overrides applied on top.
    pub fn load_default() -> GsfResult<Self> {
        let config = match Self::default_path() {
            Some(path) if path.is_file() => Self::load(path)?,
            _ => Self::default(),
        };
        config.with_env()
    }

    /// Defaults overridden from GSF_* environment variables.
    pub fn from_env() -> GsfResult<Self> {
        Self::default().with_env()
    }

    /// Apply GSF_HOST, GSF_PORT, GSF_SCHEME, GSF_PROTOCOL, GSF_USERNAME,
    /// GSF_PASSWORD and GSF_TOKEN where set.
    pub fn with_env(self) -> GsfResult<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> GsfResult<Self> {
        if let Some(host) = lookup("GSF_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("GSF_PORT") {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| GsfError::Config(format!("GSF_PORT is not a port number: {port}")))?;
        }
        if let Some(scheme) = lookup("GSF_SCHEME") {
            self.scheme = scheme;
        }
        if let Some(protocol) = lookup("GSF_PROTOCOL") {
            self.protocol = protocol.parse()?;
        }
        if let Some(username) = lookup("GSF_USERNAME") {
            self.username = Some(username);
        }
        if let Some(password) = lookup("GSF_PASSWORD") {
            self.password = Some(password);
        }
        if let Some(token) = lookup("GSF_TOKEN") {
            self.token = Some(token);
        }
        Ok(self)
    }

    /// Root URL of the configured server.
    pub fn base_url(&self) -> GsfResult<Url> {
        server_url(&self.scheme, &self.host, self.port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    fn auth(&self) -> Option<Auth> {
        match (&self.token, &self.username) {
            (Some(token), _) => Some(Auth::Bearer(token.clone())),
            (None, Some(username)) => Some(Auth::Basic {
                username: username.clone(),
                password: self.password.clone(),
            }),
            (None, None) => None,
        }
    }

    /// A reqwest-backed session carrying the configured credentials and
    /// poll interval.
    pub fn session(&self) -> Session {
        let client = match self.auth() {
            Some(auth) => ReqwestClient::new().with_auth(auth),
            None => ReqwestClient::new(),
        };
        Session::new(client).with_poll_interval(self.poll_interval())
    }
}

/// Connect to the configured server with the configured protocol.
pub async fn connect(config: &GsfConfig) -> GsfResult<AnyServer> {
    AnyServer::connect(&config.base_url()?, config.session(), config.protocol).await
}

/// Open the configured `task_url`.
pub fn open_task(config: &GsfConfig) -> GsfResult<AnyTask> {
    let raw = config
        .task_url
        .as_deref()
        .ok_or_else(|| GsfError::Config("no task_url configured".into()))?;
    AnyTask::from_url(&Url::parse(raw)?, config.session())
}

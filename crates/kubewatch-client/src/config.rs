use crate::ClientError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How long a create-and-await call waits for an object to become ready.
pub const DEFAULT_AWAIT_TIMEOUT_MS: u64 = 120_000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CLEANUP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the API server, without trailing slash.
    pub host: String,
    /// Milliseconds, so sub-second deadlines survive a round trip.
    #[serde(default = "default_await_timeout")]
    pub await_timeout_ms: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_cleanup_timeout")]
    pub cleanup_timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_await_timeout() -> u64 {
    DEFAULT_AWAIT_TIMEOUT_MS
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_cleanup_timeout() -> u64 {
    DEFAULT_CLEANUP_TIMEOUT_SECS
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

impl ClientConfig {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.trim_end_matches('/').to_owned(),
            await_timeout_ms: DEFAULT_AWAIT_TIMEOUT_MS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            cleanup_timeout_secs: DEFAULT_CLEANUP_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }

    /// Set the create-and-await deadline. Sub-millisecond parts round up.
    #[must_use]
    pub fn with_await_timeout(mut self, timeout: Duration) -> Self {
        let millis = timeout.as_nanos().div_ceil(1_000_000);
        self.await_timeout_ms = u64::try_from(millis).unwrap_or(u64::MAX);
        self
    }

    pub fn await_timeout(&self) -> Duration {
        Duration::from_millis(self.await_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn cleanup_timeout(&self) -> Duration {
        Duration::from_secs(self.cleanup_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Build a config from the process environment.
    ///
    /// `KUBEWATCH_HOST` wins; otherwise the in-cluster service variables
    /// `KUBERNETES_SERVICE_HOST` and `KUBERNETES_SERVICE_PORT` name an
    /// `https://` endpoint. Certificates are not loaded here; TLS uses ureq's
    /// default roots.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ClientError> {
        if let Some(host) = lookup("KUBEWATCH_HOST").filter(|h| !h.is_empty()) {
            return Ok(Self::new(&host));
        }
        match (
            lookup("KUBERNETES_SERVICE_HOST"),
            lookup("KUBERNETES_SERVICE_PORT"),
        ) {
            (Some(host), Some(port)) if !host.is_empty() && !port.is_empty() => {
                Ok(Self::new(&format!("https://{host}:{port}")))
            }
            _ => Err(ClientError::Config(
                "neither KUBEWATCH_HOST nor KUBERNETES_SERVICE_HOST/PORT is set".to_owned(),
            )),
        }
    }

    /// Load config from `~/.config/kubewatch/config.json`.
    pub fn load_default() -> Result<Self, ClientError> {
        let path = default_config_path()?;
        Self::load(&path)
    }

    pub fn load(path: &Path) -> Result<Self, ClientError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&content)
            .map_err(|e| ClientError::Config(format!("invalid client config: {e}")))?;
        config.host = config.host.trim_end_matches('/').to_owned();
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ClientError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

pub fn default_config_path() -> Result<PathBuf, ClientError> {
    let home = std::env::var("HOME").map_err(|_| ClientError::Config("HOME not set".to_owned()))?;
    Ok(PathBuf::from(home).join(".config/kubewatch/config.json"))
}

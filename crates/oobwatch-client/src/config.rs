//! Interaction server configuration.
//!
//! Values arrive from the host application. [`RawServerSettings`] is the
//! boundary where user-typed strings become a [`ServerConfig`], falling back
//! to safe defaults; [`ServerConfig::validate`] is the constructor-time check
//! the client runs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// Default public interaction server.
pub const DEFAULT_HOST: &str = "oast.pro";
/// Default server port.
pub const DEFAULT_PORT: u16 = 443;
/// Default poll interval in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Connection settings for one interaction server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host name; also the suffix of the interaction domain.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Use HTTPS.
    pub tls: bool,
    /// Value of the `Authorization` header, if the server requires one.
    pub authorization: Option<String>,
    /// Seconds between poll cycles.
    pub poll_interval_secs: u64,
    /// Seconds before a single request is abandoned.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            tls: true,
            authorization: None,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl ServerConfig {
    /// Configuration for `host` with all other fields defaulted.
    pub fn for_host(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Load from a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ClientError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the client relies on.
    pub fn validate(&self) -> Result<()> {
        let host = self.host.trim();
        if host.is_empty() {
            return Err(ClientError::InvalidConfig("host is empty".into()));
        }
        if host.contains("://") || host.contains('/') || host.contains(char::is_whitespace) {
            return Err(ClientError::InvalidConfig(format!(
                "host must be a bare host name, got '{}'",
                self.host
            )));
        }
        if self.port == 0 {
            return Err(ClientError::InvalidConfig("port must be non-zero".into()));
        }
        if self.poll_interval_secs == 0 {
            return Err(ClientError::InvalidConfig(
                "poll interval must be a positive number of seconds".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ClientError::InvalidConfig(
                "request timeout must be a positive number of seconds".into(),
            ));
        }
        Ok(())
    }

    /// `http(s)://host:port` with no trailing slash.
    pub fn base_url(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }

    /// Authorization header value, if configured and not blank.
    pub fn authorization(&self) -> Option<&str> {
        self.authorization
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Request timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Settings as typed into a form or command line, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawServerSettings {
    pub host: String,
    pub port: String,
    pub tls: bool,
    pub authorization: String,
    pub poll_interval: String,
}

impl RawServerSettings {
    /// Convert to a [`ServerConfig`].
    ///
    /// A blank host becomes the default host, an unparsable port becomes 443,
    /// an unparsable or non-positive poll interval becomes the default
    /// interval, and a blank authorization is dropped.
    pub fn into_config(self) -> ServerConfig {
        let host = match self.host.trim() {
            "" => DEFAULT_HOST.to_string(),
            host => host.to_string(),
        };
        let port = match self.port.trim().parse::<u16>() {
            Ok(port) if port > 0 => port,
            _ => DEFAULT_PORT,
        };
        let poll_interval_secs = match self.poll_interval.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => secs,
            _ => DEFAULT_POLL_INTERVAL_SECS,
        };
        let authorization = Some(self.authorization.trim().to_string()).filter(|a| !a.is_empty());

        ServerConfig {
            host,
            port,
            tls: self.tls,
            authorization,
            poll_interval_secs,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

//! Layered client configuration
//!
//! Values are resolved in order: built-in defaults, the TOML config file,
//! `WAYBILL_*` environment variables, then explicit `section.field=value`
//! overrides from the command line. [`WaybillConfig::validate`] runs last.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Prefix for environment overrides, e.g. `WAYBILL_API_BASE_URL`.
pub const ENV_PREFIX: &str = "WAYBILL_";

/// REST backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL every REST path is appended to.
    pub base_url: String,
    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

/// Push channel settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Socket server origin (`http(s)://` or `ws(s)://`).
    pub endpoint: String,
    /// Handshake path on the socket server.
    pub path: String,
    /// Automatic reconnection attempts before giving up.
    pub reconnection_attempts: u32,
    /// Fixed delay between reconnection attempts in milliseconds.
    pub reconnection_delay_ms: u64,
    /// Timeout for establishing one connection in milliseconds.
    pub connect_timeout_ms: u64,
    /// Keep the connection open after the last listener detaches.
    pub keep_warm: bool,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:5000".to_string(),
            path: "/socket.io/".to_string(),
            reconnection_attempts: 5,
            reconnection_delay_ms: 1_000,
            connect_timeout_ms: 10_000,
            keep_warm: false,
        }
    }
}

/// Notification feed behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Re-run the snapshot load every N seconds while active. 0 disables polling.
    pub poll_interval_secs: u64,
    /// Reload the snapshot once a clear-all call settles.
    pub reconcile_after_clear: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 0,
            reconcile_after_clear: true,
        }
    }
}

/// Where the ambient session credential comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Bearer token supplied directly. Takes precedence over `session_file`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Session file written by the sign-in flow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_file: Option<PathBuf>,
    /// Directory for local preferences.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

/// Complete client configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaybillConfig {
    /// REST backend.
    pub api: ApiConfig,
    /// Push channel.
    pub live: LiveConfig,
    /// Feed behavior.
    pub feed: FeedConfig,
    /// Session credential source.
    pub session: SessionConfig,
}

impl WaybillConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Apply `WAYBILL_*` variables from the process environment.
    pub fn merge_with_env(&mut self) -> Result<(), ConfigError> {
        self.merge_from_vars(std::env::vars())
    }

    /// Apply `WAYBILL_SECTION_FIELD=value` pairs; unrelated variables are ignored.
    pub fn merge_from_vars(
        &mut self,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<(), ConfigError> {
        for (name, value) in vars {
            let Some(rest) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let lowered = rest.to_lowercase();
            let Some((section, field)) = lowered.split_once('_') else {
                continue;
            };
            match self.set_from_string(&format!("{section}.{field}"), &value) {
                Err(ConfigError::UnknownKey(key)) => {
                    tracing::warn!(variable = %name, key = %key, "Ignoring unknown environment override");
                }
                other => other?,
            }
        }
        Ok(())
    }

    /// Set a single value by `section.field` key.
    pub fn set_from_string(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "api.base_url" => self.api.base_url = value.to_string(),
            "api.request_timeout_ms" => self.api.request_timeout_ms = parse(key, value)?,
            "live.endpoint" => self.live.endpoint = value.to_string(),
            "live.path" => self.live.path = value.to_string(),
            "live.reconnection_attempts" => self.live.reconnection_attempts = parse(key, value)?,
            "live.reconnection_delay_ms" => self.live.reconnection_delay_ms = parse(key, value)?,
            "live.connect_timeout_ms" => self.live.connect_timeout_ms = parse(key, value)?,
            "live.keep_warm" => self.live.keep_warm = parse(key, value)?,
            "feed.poll_interval_secs" => self.feed.poll_interval_secs = parse(key, value)?,
            "feed.reconcile_after_clear" => self.feed.reconcile_after_clear = parse(key, value)?,
            "session.token" => self.session.token = non_empty(value),
            "session.session_file" => self.session.session_file = non_empty(value).map(PathBuf::from),
            "session.data_dir" => self.session.data_dir = non_empty(value).map(PathBuf::from),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    /// Reject values the client can not operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = parse_url("api.base_url", &self.api.base_url)?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ConfigError::invalid(
                "api.base_url",
                format!("unsupported scheme '{}'", base.scheme()),
            ));
        }
        if self.api.request_timeout_ms == 0 {
            return Err(ConfigError::invalid("api.request_timeout_ms", "must be non-zero"));
        }

        let endpoint = parse_url("live.endpoint", &self.live.endpoint)?;
        if !matches!(endpoint.scheme(), "http" | "https" | "ws" | "wss") {
            return Err(ConfigError::invalid(
                "live.endpoint",
                format!("unsupported scheme '{}'", endpoint.scheme()),
            ));
        }
        if !self.live.path.starts_with('/') {
            return Err(ConfigError::invalid("live.path", "must start with '/'"));
        }
        if self.live.reconnection_attempts > 0 && self.live.reconnection_delay_ms == 0 {
            return Err(ConfigError::invalid(
                "live.reconnection_delay_ms",
                "must be non-zero when reconnection is enabled",
            ));
        }
        if self.live.connect_timeout_ms == 0 {
            return Err(ConfigError::invalid("live.connect_timeout_ms", "must be non-zero"));
        }
        Ok(())
    }

    /// Serialize to TOML, e.g. for `waybill config` style dumps.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::invalid("config", e.to_string()))
    }
}

impl ApiConfig {
    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl LiveConfig {
    /// Reconnection delay as a [`Duration`].
    pub fn reconnection_delay(&self) -> Duration {
        Duration::from_millis(self.reconnection_delay_ms)
    }

    /// Connect timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl FeedConfig {
    /// Polling period, `None` when polling is disabled.
    pub fn poll_interval(&self) -> Option<Duration> {
        (self.poll_interval_secs > 0).then(|| Duration::from_secs(self.poll_interval_secs))
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::invalid(key, e.to_string()))
}

fn parse_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::invalid(key, e.to_string()))
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

//! Client configuration.
//!
//! `ClientConfig` can be built in code, deserialized from JSON, or read from
//! `BOOKING_API_*` environment variables. Missing fields fall back to the
//! defaults of a local development backend.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh-token";
pub const DEFAULT_LOGIN_LOCATION: &str = "/login";
pub const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 30;

const ENV_BASE_URL: &str = "BOOKING_API_BASE_URL";
const ENV_WITH_CREDENTIALS: &str = "BOOKING_API_WITH_CREDENTIALS";
const ENV_REFRESH_PATH: &str = "BOOKING_API_REFRESH_PATH";
const ENV_LOGIN_LOCATION: &str = "BOOKING_API_LOGIN_LOCATION";
const ENV_REFRESH_TIMEOUT_SECS: &str = "BOOKING_API_REFRESH_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// API root every request path is appended to.
    pub base_url: String,
    /// Send credential cookies with every call.
    pub with_credentials: bool,
    /// Session refresh endpoint, relative to `base_url`.
    pub refresh_path: String,
    /// Where the shell is sent once a session cannot be renewed.
    pub login_location: String,
    /// Upper bound for a single refresh call; 0 waits indefinitely.
    pub refresh_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            with_credentials: true,
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            login_location: DEFAULT_LOGIN_LOCATION.to_string(),
            refresh_timeout_secs: DEFAULT_REFRESH_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: normalize_base(base_url),
            ..Self::default()
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_json::from_str(raw)?;
        config.base_url = normalize_base(&config.base_url);
        Ok(config)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup, using the same keys as
    /// `from_env`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(base_url) = lookup(ENV_BASE_URL) {
            config.base_url = normalize_base(&base_url);
        }
        if let Some(raw) = lookup(ENV_WITH_CREDENTIALS) {
            config.with_credentials = parse_value(ENV_WITH_CREDENTIALS, raw)?;
        }
        if let Some(refresh_path) = lookup(ENV_REFRESH_PATH) {
            config.refresh_path = refresh_path;
        }
        if let Some(login_location) = lookup(ENV_LOGIN_LOCATION) {
            config.login_location = login_location;
        }
        if let Some(raw) = lookup(ENV_REFRESH_TIMEOUT_SECS) {
            config.refresh_timeout_secs = parse_value(ENV_REFRESH_TIMEOUT_SECS, raw)?;
        }
        Ok(config)
    }

    pub fn with_credentials(mut self, enabled: bool) -> Self {
        self.with_credentials = enabled;
        self
    }

    pub fn with_refresh_timeout_secs(mut self, secs: u64) -> Self {
        self.refresh_timeout_secs = secs;
        self
    }

    /// Absolute URL for `path`, which should start with `/`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn refresh_url(&self) -> String {
        self.url(&self.refresh_path)
    }

    pub fn refresh_timeout(&self) -> Option<Duration> {
        (self.refresh_timeout_secs > 0).then(|| Duration::from_secs(self.refresh_timeout_secs))
    }
}

fn normalize_base(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

fn parse_value<T: std::str::FromStr>(key: &'static str, raw: String) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { key, value: raw })
}

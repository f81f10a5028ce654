//! Client configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 3;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_CREDENTIAL_FILE: &str = ".triage-session.json";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,
    #[error("invalid base URL '{0}' (expected http:// or https://)")]
    InvalidBaseUrl(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub credential_file: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            credential_file: PathBuf::from(DEFAULT_CREDENTIAL_FILE),
        }
    }
}

impl ClientConfig {
    /// Build typed config from environment variables.
    ///
    /// Optional (defaults in parentheses):
    /// - `TRIAGE_BASE_URL` (`http://127.0.0.1:8000`)
    /// - `TRIAGE_POLL_INTERVAL_SECS` (3)
    /// - `TRIAGE_REQUEST_TIMEOUT_SECS` (15)
    /// - `TRIAGE_CONNECT_TIMEOUT_SECS` (5)
    /// - `TRIAGE_CREDENTIAL_FILE` (`.triage-session.json`)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the resulting config fails [`ClientConfig::validate`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] over an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the resulting config fails validation.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let config = Self::read_lookup(lookup);
        config.validate()?;
        Ok(config)
    }

    /// Read environment variables without validating, so callers can layer
    /// overrides on top before calling [`ClientConfig::validate`].
    #[must_use]
    pub fn read_env() -> Self {
        Self::read_lookup(|key| std::env::var(key).ok())
    }

    /// Non-validating parse over an arbitrary variable source. Missing, blank
    /// or unparsable values fall back to defaults.
    #[must_use]
    pub fn read_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let base_url = lookup("TRIAGE_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        let credential_file = lookup("TRIAGE_CREDENTIAL_FILE")
            .filter(|v| !v.trim().is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_CREDENTIAL_FILE), PathBuf::from);

        Self {
            base_url: normalize_base_url(&base_url),
            poll_interval: Duration::from_secs(env_parse_u64(&lookup, "TRIAGE_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)),
            request_timeout: Duration::from_secs(env_parse_u64(
                &lookup,
                "TRIAGE_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )),
            connect_timeout: Duration::from_secs(env_parse_u64(
                &lookup,
                "TRIAGE_CONNECT_TIMEOUT_SECS",
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )),
            credential_file,
        }
    }

    /// # Errors
    ///
    /// `ZeroPollInterval` or `InvalidBaseUrl`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        let has_scheme = self.base_url.starts_with("http://") || self.base_url.starts_with("https://");
        if !has_scheme {
            return Err(ConfigError::InvalidBaseUrl(self.base_url.clone()));
        }
        Ok(())
    }
}

/// Trim whitespace and trailing slashes so paths can be appended directly.
#[must_use]
pub fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_owned()
}

fn env_parse_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> u64 {
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

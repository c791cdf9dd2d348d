//! Configuration management for the sync client.

use std::env;
use std::time::Duration;

use marginalia_engine::DEFAULT_MUSHAF;

/// Default HTTP request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the sync API, without trailing slash
    pub base_url: String,
    /// Timeout applied to every sync request
    pub request_timeout: Duration,
    /// Mushaf id stamped into outbound bookmark payloads
    pub mushaf_id: u32,
}

impl SyncConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            mushaf_id: DEFAULT_MUSHAF,
        }
    }

    /// Load `.env` if present, then read the environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup("MARGINALIA_SYNC_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::MissingSyncUrl)?;

        let timeout_secs = match lookup("MARGINALIA_SYNC_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::InvalidTimeout(raw))?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let mushaf_id = match lookup("MARGINALIA_MUSHAF_ID") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidMushaf(raw))?,
            None => DEFAULT_MUSHAF,
        };

        let mut config = Self::new(base_url);
        config.request_timeout = Duration::from_secs(timeout_secs);
        config.mushaf_id = mushaf_id;
        Ok(config)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("MARGINALIA_SYNC_URL environment variable is required")]
    MissingSyncUrl,

    #[error("Invalid MARGINALIA_SYNC_TIMEOUT_SECS value: {0}")]
    InvalidTimeout(String),

    #[error("Invalid MARGINALIA_MUSHAF_ID value: {0}")]
    InvalidMushaf(String),
}

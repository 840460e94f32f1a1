//! Run configuration: a TOML file with every key optional, then environment
//! overrides, then validation.
//!
//! ```toml
//! base_url = "https://api.polygon.io/v2"
//! concurrency_limit = 8
//! drop_threshold = 0.1
//! database_url = "/var/lib/bars/bars.db"
//! requests_per_minute = 300
//! ```

use std::{
    fs,
    num::NonZeroU32,
    path::{Path, PathBuf},
    time::Duration,
};

use bar_ingestor::{
    providers::polygon_rest::{PolygonSettings, provider::API_KEY_ENV},
    retry::RetryPolicy,
};
use bar_store::db::pool::PoolSettings;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use shared_utils::env::{
    InvalidEnvVarError, MissingEnvVarError, get_env_var, get_env_var_opt, parse_env_var,
};
use thiserror::Error;

pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
pub const CONCURRENCY_ENV: &str = "BACKFILL_CONCURRENCY_LIMIT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Env(#[from] InvalidEnvVarError),

    #[error("no API key configured: {0}")]
    MissingApiKey(#[from] MissingEnvVarError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    /// Provider API key. Falls back to `POLYGON_API_KEY`.
    #[serde(deserialize_with = "deserialize_secret")]
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub request_timeout_secs: u64,
    /// Attempts per page, counting the first.
    pub retry_budget: u32,
    pub backoff_base_ms: u64,
    pub max_backoff_ms: u64,
    /// Symbols processed at once.
    pub concurrency_limit: usize,
    /// Largest tolerated share of unparseable records per symbol.
    pub drop_threshold: f64,
    pub page_limit: u32,
    pub requests_per_minute: Option<u32>,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_connection_timeout_secs: u64,
    /// Extra attempts for a symbol whose write failed transiently.
    pub symbol_retries: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.polygon.io/v2".to_string(),
            request_timeout_secs: 30,
            retry_budget: 5,
            backoff_base_ms: 500,
            max_backoff_ms: 8_000,
            concurrency_limit: 4,
            drop_threshold: 0.2,
            page_limit: 50_000,
            requests_per_minute: None,
            database_url: "bars.db".to_string(),
            db_max_connections: 4,
            db_connection_timeout_secs: 30,
            symbol_retries: 0,
        }
    }
}

impl IngestConfig {
    /// Loads `path` (or defaults when `None`), applies environment overrides
    /// and validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml_str(&raw)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(DATABASE_URL_ENV, CONCURRENCY_ENV)
    }

    fn apply_overrides_from(&mut self, database_url_var: &str, concurrency_var: &str) -> Result<(), ConfigError> {
        if let Some(url) = get_env_var_opt(database_url_var) {
            self.database_url = url;
        }
        if let Some(limit) = parse_env_var::<usize>(concurrency_var)? {
            self.concurrency_limit = limit;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.concurrency_limit == 0 {
            return invalid("concurrency_limit must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.drop_threshold) {
            return invalid("drop_threshold must be within [0, 1]");
        }
        if self.retry_budget == 0 {
            return invalid("retry_budget must be at least 1");
        }
        if self.backoff_base_ms == 0 || self.max_backoff_ms < self.backoff_base_ms {
            return invalid("backoff_base_ms must be positive and not exceed max_backoff_ms");
        }
        if self.request_timeout_secs == 0 {
            return invalid("request_timeout_secs must be positive");
        }
        if self.page_limit == 0 {
            return invalid("page_limit must be positive");
        }
        if self.requests_per_minute == Some(0) {
            return invalid("requests_per_minute must be positive when set");
        }
        if self.db_max_connections == 0 {
            return invalid("db_max_connections must be at least 1");
        }
        if self.database_url.trim().is_empty() {
            return invalid("database_url must not be empty");
        }
        Ok(())
    }

    /// The configured key, else `POLYGON_API_KEY`.
    pub fn api_key(&self) -> Result<SecretString, ConfigError> {
        match &self.api_key {
            Some(key) => Ok(SecretString::new(key.expose_secret().into())),
            None => Ok(SecretString::new(get_env_var(API_KEY_ENV)?.into())),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_budget,
            Duration::from_millis(self.backoff_base_ms),
            Duration::from_millis(self.max_backoff_ms),
        )
    }

    pub fn polygon_settings(&self) -> PolygonSettings {
        PolygonSettings {
            base_url: self.base_url.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            page_limit: self.page_limit,
            retry: self.retry_policy(),
            requests_per_minute: self.requests_per_minute.and_then(NonZeroU32::new),
        }
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.db_max_connections,
            connection_timeout: Duration::from_secs(self.db_connection_timeout_secs),
            ..PoolSettings::default()
        }
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.map(|key| SecretString::new(key.into())))
}

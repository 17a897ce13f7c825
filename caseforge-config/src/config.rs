// caseforge-config/src/config.rs
// ============================================================================
// Module: Caseforge Configuration
// Description: Environment-driven configuration loading and validation.
// Purpose: Provide strict, fail-closed config assembly with an optional
//          TOML overlay layered under environment overrides.
// Dependencies: caseforge-worker, serde, thiserror, toml
// ============================================================================

//! ## Overview
//! Configuration is assembled once at startup from environment variables,
//! optionally layered over a TOML file named by `CASEFORGE_CONFIG`.
//! Missing or invalid configuration fails closed: [`Config::from_env`]
//! returns a [`ConfigError`] rather than falling back to a silently
//! incomplete configuration. There is no hot reload; callers re-invoke
//! `from_env` explicitly if they need to pick up changes.

use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use caseforge_store_sqlite::SqliteStoreConfig;
use caseforge_store_sqlite::SqliteStoreMode;
use caseforge_store_sqlite::SqliteSyncMode;
use caseforge_worker::RetryPolicy;
use serde::Deserialize;
use thiserror::Error;

/// Environment variable naming an optional TOML config-file overlay.
pub const CONFIG_ENV_VAR: &str = "CASEFORGE_CONFIG";

/// Default HTTP bind address used when `CASEFORGE_BIND_ADDR` is unset.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Errors produced while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("config file io error: {0}")]
    Io(String),
    /// The config file overlay could not be parsed as TOML.
    #[error("config file parse error: {0}")]
    Parse(String),
    /// A required field was missing from the environment and from any
    /// file overlay.
    #[error("missing required configuration: {0}")]
    MissingRequired(String),
    /// A field was present but failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Per-client vendor endpoint configuration. Unused by the mock clients
/// in `caseforge-clients`, but present so a future vendor-backed client
/// can be constructed from the same configuration surface.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ClientEndpointConfig {
    /// Vendor API key, if required.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Vendor base URL override.
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Retry policy overrides layered over [`RetryPolicy::default`].
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RetryConfig {
    /// Override for [`RetryPolicy::max_attempts`].
    #[serde(default)]
    pub max_attempts: Option<u32>,
    /// Override for [`RetryPolicy::initial_interval`], in milliseconds.
    #[serde(default)]
    pub initial_interval_ms: Option<u64>,
    /// Override for [`RetryPolicy::max_interval`], in milliseconds.
    #[serde(default)]
    pub max_interval_ms: Option<u64>,
    /// Override for [`RetryPolicy::multiplier`].
    #[serde(default)]
    pub multiplier: Option<f64>,
}

impl RetryConfig {
    /// Builds a [`RetryPolicy`], falling back to its defaults for any
    /// field left unset.
    #[must_use]
    pub fn to_retry_policy(&self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
            initial_interval: self.initial_interval_ms.map_or(defaults.initial_interval, Duration::from_millis),
            max_interval: self.max_interval_ms.map_or(defaults.max_interval, Duration::from_millis),
            multiplier: self.multiplier.unwrap_or(defaults.multiplier),
        }
    }

    /// Validates that overrides describe a sane backoff curve.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == Some(0) {
            return Err(ConfigError::Invalid("retry.max_attempts must be greater than zero".to_string()));
        }
        if self.multiplier.is_some_and(|m| m < 1.0) {
            return Err(ConfigError::Invalid("retry.multiplier must be >= 1.0".to_string()));
        }
        if let (Some(initial), Some(max)) = (self.initial_interval_ms, self.max_interval_ms)
            && initial > max
        {
            return Err(ConfigError::Invalid("retry.initial_interval_ms must not exceed retry.max_interval_ms".to_string()));
        }
        Ok(())
    }
}

/// Storage backend configuration: connection URL plus access credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Object storage endpoint URL.
    pub url: String,
    /// Access key for the storage backend.
    pub access_key: String,
    /// Secret key for the storage backend.
    pub secret_key: String,
}

impl StorageConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::Invalid("storage.url must be non-empty".to_string()));
        }
        if self.access_key.trim().is_empty() {
            return Err(ConfigError::Invalid("storage.access_key must be non-empty".to_string()));
        }
        if self.secret_key.trim().is_empty() {
            return Err(ConfigError::Invalid("storage.secret_key must be non-empty".to_string()));
        }
        Ok(())
    }
}

/// An optional file overlay merged under environment overrides. Every
/// field is optional: `from_env` only consults this struct for fields
/// not already supplied by an environment variable.
#[derive(Debug, Clone, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    database_path: Option<PathBuf>,
    #[serde(default)]
    bind_addr: Option<String>,
    #[serde(default)]
    storage_url: Option<String>,
    #[serde(default)]
    storage_access_key: Option<String>,
    #[serde(default)]
    storage_secret_key: Option<String>,
    #[serde(default)]
    queue_url: Option<String>,
    #[serde(default)]
    clients: BTreeMap<String, ClientEndpointConfig>,
    #[serde(default)]
    retry: RetryConfig,
    #[serde(default)]
    cors_origins: Vec<String>,
}

/// Assembled CaseForge configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the `SQLite` database file.
    pub database_path: PathBuf,
    /// Address the HTTP API binds to.
    pub bind_addr: String,
    /// Object storage configuration.
    pub storage: StorageConfig,
    /// Message queue URL. Absence selects the in-memory [`caseforge_queue::InMemoryQueue`].
    pub queue_url: Option<String>,
    /// Per-client vendor endpoint configuration, keyed by client name
    /// (`reconstruction`, `scene_analysis`, `reasoning`, `profile`,
    /// `imagegen`, `asset3d`, `replay`).
    pub clients: BTreeMap<String, ClientEndpointConfig>,
    /// Worker retry policy overrides.
    pub retry: RetryConfig,
    /// Origins allowed by the API's CORS layer.
    pub cors_origins: Vec<String>,
}

impl Config {
    /// Loads configuration from the environment, optionally layered over
    /// a TOML file named by [`CONFIG_ENV_VAR`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required field is missing from both
    /// the environment and the file overlay, when the file overlay cannot
    /// be read or parsed, or when validation fails.
    pub fn from_env() -> Result<Self, ConfigError> {
        let file = load_file_overlay()?;

        let database_path = env_path("CASEFORGE_DATABASE_URL")
            .or(file.database_path)
            .ok_or_else(|| ConfigError::MissingRequired("CASEFORGE_DATABASE_URL".to_string()))?;

        let bind_addr = env_string("CASEFORGE_BIND_ADDR")
            .or(file.bind_addr)
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let storage_url = env_string("CASEFORGE_STORAGE_URL")
            .or(file.storage_url)
            .ok_or_else(|| ConfigError::MissingRequired("CASEFORGE_STORAGE_URL".to_string()))?;
        let storage_access_key = env_string("CASEFORGE_STORAGE_ACCESS_KEY")
            .or(file.storage_access_key)
            .ok_or_else(|| ConfigError::MissingRequired("CASEFORGE_STORAGE_ACCESS_KEY".to_string()))?;
        let storage_secret_key = env_string("CASEFORGE_STORAGE_SECRET_KEY")
            .or(file.storage_secret_key)
            .ok_or_else(|| ConfigError::MissingRequired("CASEFORGE_STORAGE_SECRET_KEY".to_string()))?;

        let queue_url = env_string("CASEFORGE_QUEUE_URL").or(file.queue_url);

        let retry = RetryConfig {
            max_attempts: env_parsed("CASEFORGE_RETRY_MAX_ATTEMPTS").or(file.retry.max_attempts),
            initial_interval_ms: env_parsed("CASEFORGE_RETRY_INITIAL_INTERVAL_MS").or(file.retry.initial_interval_ms),
            max_interval_ms: env_parsed("CASEFORGE_RETRY_MAX_INTERVAL_MS").or(file.retry.max_interval_ms),
            multiplier: env_parsed("CASEFORGE_RETRY_MULTIPLIER").or(file.retry.multiplier),
        };

        let cors_origins = env_string("CASEFORGE_CORS_ORIGINS")
            .map(|raw| raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
            .unwrap_or(file.cors_origins);

        let config = Self {
            database_path,
            bind_addr,
            storage: StorageConfig { url: storage_url, access_key: storage_access_key, secret_key: storage_secret_key },
            queue_url,
            clients: file.clients,
            retry,
            cors_origins,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates the assembled configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when any field fails validation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr
            .parse::<std::net::SocketAddr>()
            .map_err(|_| ConfigError::Invalid(format!("bind_addr {:?} is not a valid socket address", self.bind_addr)))?;
        self.storage.validate()?;
        self.retry.validate()?;
        if let Some(queue_url) = &self.queue_url
            && queue_url.trim().is_empty()
        {
            return Err(ConfigError::Invalid("queue_url must not be blank when set".to_string()));
        }
        for origin in &self.cors_origins {
            if origin.trim().is_empty() {
                return Err(ConfigError::Invalid("cors_origins entries must be non-empty".to_string()));
            }
        }
        Ok(())
    }

    /// Builds the `SQLite` store configuration implied by this config,
    /// using the default WAL journal mode.
    #[must_use]
    pub fn sqlite_store_config(&self) -> SqliteStoreConfig {
        SqliteStoreConfig { path: self.database_path.clone(), busy_timeout_ms: 5_000, journal_mode: SqliteStoreMode::Wal, sync_mode: SqliteSyncMode::Full }
    }
}

fn load_file_overlay() -> Result<ConfigFile, ConfigError> {
    let Some(path) = env::var_os(CONFIG_ENV_VAR) else {
        return Ok(ConfigFile::default());
    };
    let content = std::fs::read_to_string(&path).map_err(|err| ConfigError::Io(err.to_string()))?;
    toml::from_str(&content).map_err(|err| ConfigError::Parse(err.to_string()))
}

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env_string(key).map(PathBuf::from)
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|value| value.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_config_falls_back_to_retry_policy_defaults() {
        let config = RetryConfig::default();
        let policy = config.to_retry_policy();
        let defaults = RetryPolicy::default();
        assert_eq!(policy.max_attempts, defaults.max_attempts);
        assert_eq!(policy.multiplier, defaults.multiplier);
    }

    #[test]
    fn retry_config_applies_overrides() {
        let config = RetryConfig { max_attempts: Some(5), initial_interval_ms: Some(100), max_interval_ms: Some(1_000), multiplier: Some(3.0) };
        let policy = config.to_retry_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_interval, Duration::from_millis(100));
        assert_eq!(policy.max_interval, Duration::from_millis(1_000));
        assert_eq!(policy.multiplier, 3.0);
    }

    #[test]
    fn retry_config_rejects_zero_max_attempts() {
        let config = RetryConfig { max_attempts: Some(0), ..RetryConfig::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn retry_config_rejects_initial_interval_above_max_interval() {
        let config = RetryConfig { initial_interval_ms: Some(5_000), max_interval_ms: Some(1_000), ..RetryConfig::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn storage_config_rejects_blank_fields() {
        let storage = StorageConfig { url: String::new(), access_key: "a".to_string(), secret_key: "b".to_string() };
        assert!(matches!(storage.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn config_validate_rejects_blank_cors_origin() {
        let config = Config {
            database_path: PathBuf::from("db.sqlite"),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            storage: StorageConfig { url: "https://storage.example".to_string(), access_key: "a".to_string(), secret_key: "b".to_string() },
            queue_url: None,
            clients: BTreeMap::new(),
            retry: RetryConfig::default(),
            cors_origins: vec![String::new()],
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}

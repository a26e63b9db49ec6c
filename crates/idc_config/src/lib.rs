//! `idc_config` - Configuration parsing and validation for the InfluxDB data collector
//!
//! This crate provides:
//! - TOML configuration parsing
//! - Default value handling
//! - Environment variable overrides
//! - Auto-discovery from standard config paths
//! - Metric descriptor definitions
//! - The per-descriptor settings policy (required keys, defaults, query guard)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub mod policy;

pub use policy::{ConfigPolicy, QuerySettings, Settings, StringRule};

/// Number of path segments every metric namespace must have
pub const NAMESPACE_LEN: usize = 5;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error(
        "the collector is intended to read data, `drop` and `delete` are not allowed in query, query: {0}"
    )]
    ForbiddenQuery(String),
}

/// Top-level configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct IdcConfig {
    /// Global settings
    pub global: GlobalConfig,

    /// Connection pool settings
    pub pool: PoolSettings,

    /// Database client settings
    pub client: ClientSettings,

    /// Requested metrics
    pub metrics: Vec<MetricConfig>,
}

/// Global configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Interval between collection cycles in seconds
    pub poll_interval_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Enable JSON logging
    pub json_logs: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Connection pool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Maximum time a connection may sit unused before it is closed
    pub max_idle_secs: u64,

    /// How often idle connections are checked
    pub reap_interval_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_idle_secs: 30 * 60,
            reap_interval_secs: 15 * 60,
        }
    }
}

/// Database client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Per-query timeout in seconds, 0 disables it
    pub query_timeout_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            query_timeout_secs: 30,
        }
    }
}

/// One requested metric: namespace, static tags and connection/query settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricConfig {
    /// Five namespace segments, `*` allowed at the series position
    pub namespace: Vec<String>,

    /// Tags attached to every record produced for this metric
    #[serde(default)]
    pub tags: BTreeMap<String, String>,

    /// String settings: host, database, user, password, query, data_type
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

impl IdcConfig {
    /// Standard config file paths, in order of precedence
    #[must_use]
    pub fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("idc.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("idc").join("idc.toml"));
        }

        paths.push(PathBuf::from("/etc/idc/idc.toml"));

        paths
    }

    /// Discover and load configuration from standard paths.
    ///
    /// Returns defaults if no config file is found.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if a discovered config file cannot be loaded.
    pub fn discover() -> Result<Self, ConfigError> {
        for path in Self::config_paths() {
            if path.exists() {
                info!(path = %path.display(), "Loading config from");
                return Self::load(&path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Discover config and apply environment variable overrides.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if config discovery or validation fails.
    pub fn discover_with_env() -> Result<Self, ConfigError> {
        let mut config = Self::discover()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific TOML file.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if the text cannot be parsed or validated.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: IdcConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or validated.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("IDC_LOG_LEVEL") {
            self.global.log_level = val;
        }
        if let Ok(val) = std::env::var("IDC_POLL_INTERVAL")
            && let Ok(secs) = val.parse()
        {
            self.global.poll_interval_secs = secs;
        }
        if let Ok(val) = std::env::var("IDC_MAX_IDLE")
            && let Ok(secs) = val.parse()
        {
            self.pool.max_idle_secs = secs;
        }
        if let Ok(val) = std::env::var("IDC_REAP_INTERVAL")
            && let Ok(secs) = val.parse()
        {
            self.pool.reap_interval_secs = secs;
        }
        if let Ok(val) = std::env::var("IDC_QUERY_TIMEOUT")
            && let Ok(secs) = val.parse()
        {
            self.client.query_timeout_secs = secs;
        }
    }

    /// Validate configuration.
    ///
    /// Descriptor settings are not checked here; they are resolved against the
    /// [`ConfigPolicy`] at collection time so a bad descriptor fails its cycle.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] when validation rules are violated.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.global.poll_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "poll_interval_secs must be > 0".to_string(),
            ));
        }

        if self.pool.max_idle_secs == 0 {
            return Err(ConfigError::ValidationError(
                "pool.max_idle_secs must be > 0".to_string(),
            ));
        }

        if self.pool.reap_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "pool.reap_interval_secs must be > 0".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.global.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.global.log_level,
                valid_levels.join(", ")
            )));
        }

        for (idx, metric) in self.metrics.iter().enumerate() {
            if metric.namespace.len() != NAMESPACE_LEN {
                return Err(ConfigError::ValidationError(format!(
                    "metrics[{idx}] namespace must have {NAMESPACE_LEN} segments, got {}",
                    metric.namespace.len()
                )));
            }
        }

        Ok(())
    }

    /// Get poll interval as Duration
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.global.poll_interval_secs)
    }

    /// Get idle threshold as Duration
    #[must_use]
    pub fn max_idle(&self) -> Duration {
        Duration::from_secs(self.pool.max_idle_secs)
    }

    /// Get reaper period as Duration
    #[must_use]
    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.pool.reap_interval_secs)
    }

    /// Get query timeout, `None` when disabled
    #[must_use]
    pub fn query_timeout(&self) -> Option<Duration> {
        match self.client.query_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

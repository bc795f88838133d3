//! Configuration loading and validation.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aggregate::{AggregateOptions, KeyMode};
use crate::query::{EventRanking, DEFAULT_LIMIT};
use crate::storage::StorageConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Aggregation configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Key player statistics by canonical identity or raw display name
    #[serde(default)]
    pub key_mode: KeyMode,

    /// Fixed reference time for time buckets (RFC 3339 string).
    /// The wall clock is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_time: Option<DateTime<Utc>>,

    /// How head-to-head queries rank "recent" events
    #[serde(default)]
    pub event_ranking: EventRanking,
}

impl AggregationConfig {
    /// Options for a run, using `now` when no reference time is configured.
    pub fn options(&self, now: DateTime<Utc>) -> AggregateOptions {
        AggregateOptions::new(self.reference_time.unwrap_or(now)).with_key_mode(self.key_mode)
    }
}

/// Query configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Rows returned when a query does not set a limit
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Minimum sets for a player to appear on the merged leaderboard
    #[serde(default = "default_leaderboard_min_sets")]
    pub leaderboard_min_sets: u32,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

fn default_leaderboard_min_sets() -> u32 {
    50
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            leaderboard_min_sets: default_leaderboard_min_sets(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Alias table (JSON or TOML); defaults to `<data_dir>/aliases.json`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aliases_path: Option<PathBuf>,

    #[serde(default)]
    pub aggregation: AggregationConfig,

    #[serde(default)]
    pub query: QueryConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            aliases_path: None,
            aggregation: AggregationConfig::default(),
            query: QueryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.query.default_limit == 0 {
            return Err(ConfigError::ValidationError(
                "Default query limit must be greater than 0".to_string(),
            ));
        }

        if self.log_level.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Log level must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn storage(&self) -> StorageConfig {
        StorageConfig::new(self.data_dir.clone())
    }

    /// Alias table location, explicit or under the data directory.
    pub fn alias_table_path(&self) -> PathBuf {
        self.aliases_path
            .clone()
            .unwrap_or_else(|| self.storage().aliases_path())
    }
}

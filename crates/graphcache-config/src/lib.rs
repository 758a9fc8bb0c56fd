//! GraphCache Configuration Management
//!
//! Provides configuration loading with support for:
//! - Global config: `~/.graphcache/config.toml`
//! - Local config: `.graphcache/config.toml` (in the working directory)
//! - CLI overrides via `ConfigOverrides`
//!
//! Configuration is merged in order: global → local → CLI overrides.

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Log levels accepted by `[logging] level`.
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Root configuration for GraphCache.
///
/// Represents the fully merged configuration from all sources.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct GraphCacheConfig {
    /// Cache engine behaviour
    pub cache: CacheSettings,

    /// Where snapshots are stored
    pub persistence: PersistenceConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Cache engine settings.
///
/// # Example TOML
///
/// ```toml
/// [cache]
/// strict = true
/// verify_snapshots = false
/// verbose = false
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheSettings {
    /// Track entity ids on reads so unaffected results survive writes
    pub strict: bool,

    /// Check reference symmetry on every commit
    pub verify_snapshots: bool,

    /// Log every read, write and transaction
    pub verbose: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            strict: true,
            verify_snapshots: false,
            verbose: false,
        }
    }
}

/// Snapshot persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Snapshot file used when a command is not given one
    pub snapshot_path: PathBuf,

    /// Pretty-print saved snapshots
    pub pretty: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from(".graphcache/snapshot.json"),
            pretty: true,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON structured logging
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::invalid_value(
                "logging.format",
                format!("unknown format '{}'. Valid values: text, json", s),
            )),
        }
    }
}

/// CLI overrides for configuration values.
///
/// Used to apply command-line arguments over file-based config.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override the default snapshot file
    pub snapshot_path: Option<PathBuf>,

    pub strict: Option<bool>,

    pub verify_snapshots: Option<bool>,

    pub verbose: Option<bool>,

    /// Override log level
    pub log_level: Option<String>,
}

impl GraphCacheConfig {
    /// Apply CLI overrides to this configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref path) = overrides.snapshot_path {
            self.persistence.snapshot_path = path.clone();
        }

        if let Some(strict) = overrides.strict {
            self.cache.strict = strict;
        }

        if let Some(verify) = overrides.verify_snapshots {
            self.cache.verify_snapshots = verify;
        }

        if let Some(verbose) = overrides.verbose {
            self.cache.verbose = verbose;
        }

        if let Some(ref level) = overrides.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::invalid_value(
                "logging.level",
                format!(
                    "unknown level '{}'. Valid values: {}",
                    self.logging.level,
                    LOG_LEVELS.join(", ")
                ),
            ));
        }
        if self.persistence.snapshot_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "persistence.snapshot_path must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the snapshot path against a working directory.
    pub fn snapshot_path(&self, working_dir: &Path) -> PathBuf {
        if self.persistence.snapshot_path.is_absolute() {
            self.persistence.snapshot_path.clone()
        } else {
            working_dir.join(&self.persistence.snapshot_path)
        }
    }
}

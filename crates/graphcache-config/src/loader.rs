//! Configuration loader with inheritance support.
//!
//! Loads configuration from multiple sources and merges them:
//! 1. Global config: `~/.graphcache/config.toml`
//! 2. Local config: `.graphcache/config.toml` (in the working directory)
//! 3. CLI overrides
//!
//! Later sources override earlier ones.

use crate::error::ConfigError;
use crate::{
    CacheSettings, ConfigOverrides, GraphCacheConfig, LoggingConfig, PersistenceConfig,
};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Global configuration directory name.
const GLOBAL_CONFIG_DIR: &str = ".graphcache";

/// Local configuration directory name.
const LOCAL_CONFIG_DIR: &str = ".graphcache";

/// Configuration loader with caching and inheritance support.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Global config directory (e.g., `~/.graphcache`)
    global_config_dir: Option<PathBuf>,

    /// Cached global config
    global_config: Option<GraphCacheConfig>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader.
    ///
    /// Automatically detects the global config directory (`~/.graphcache`).
    pub fn new() -> Self {
        let global_config_dir = dirs::home_dir().map(|h| h.join(GLOBAL_CONFIG_DIR));

        Self {
            global_config_dir,
            global_config: None,
        }
    }

    /// Create a loader with a custom global config directory.
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_config_dir: Some(global_dir.into()),
            global_config: None,
        }
    }

    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_config_dir
            .as_ref()
            .map(|d| d.join(CONFIG_FILE_NAME))
    }

    pub fn local_config_path(&self, working_dir: &Path) -> PathBuf {
        working_dir.join(LOCAL_CONFIG_DIR).join(CONFIG_FILE_NAME)
    }

    /// Load configuration for a working directory with optional CLI overrides.
    ///
    /// Merges config in order: global → local → overrides, then validates
    /// the result.
    pub fn load(
        &mut self,
        working_dir: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<GraphCacheConfig, ConfigError> {
        let mut config = GraphCacheConfig::default();

        if let Some(global_config) = self.load_global()? {
            config = merge_configs(config, global_config);
        }

        if let Some(local_config) = self.load_local(working_dir)? {
            config = merge_configs(config, local_config);
        }

        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load a single explicit config file over the defaults.
    ///
    /// Used for `--config FILE`; global and local files are not consulted.
    pub fn load_file(
        &self,
        path: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<GraphCacheConfig, ConfigError> {
        debug!("Loading config from {:?}", path);
        let mut config = merge_configs(GraphCacheConfig::default(), load_config_file(path)?);

        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load only the global configuration.
    pub fn load_global(&mut self) -> Result<Option<GraphCacheConfig>, ConfigError> {
        if let Some(ref config) = self.global_config {
            return Ok(Some(config.clone()));
        }

        let Some(global_path) = self.global_config_path() else {
            debug!("No home directory found, skipping global config");
            return Ok(None);
        };

        if !global_path.exists() {
            trace!("Global config not found at {:?}", global_path);
            return Ok(None);
        }

        debug!("Loading global config from {:?}", global_path);
        let config = load_config_file(&global_path)?;

        self.global_config = Some(config.clone());

        Ok(Some(config))
    }

    /// Load only the local configuration for a working directory.
    pub fn load_local(&self, working_dir: &Path) -> Result<Option<GraphCacheConfig>, ConfigError> {
        let local_path = self.local_config_path(working_dir);

        if !local_path.exists() {
            trace!("Local config not found at {:?}", local_path);
            return Ok(None);
        }

        debug!("Loading local config from {:?}", local_path);
        load_config_file(&local_path).map(Some)
    }

    /// Save configuration to the global config file.
    pub fn save_global(&self, config: &GraphCacheConfig) -> Result<(), ConfigError> {
        let Some(ref global_dir) = self.global_config_dir else {
            return Err(ConfigError::NoHomeDir);
        };

        save_config_file(&global_dir.join(CONFIG_FILE_NAME), config)
    }

    pub fn save_local(
        &self,
        working_dir: &Path,
        config: &GraphCacheConfig,
    ) -> Result<(), ConfigError> {
        save_config_file(&self.local_config_path(working_dir), config)
    }

    /// Clear cached global configuration.
    ///
    /// Forces reload on next `load_global()` call.
    pub fn clear_cache(&mut self) {
        self.global_config = None;
    }
}

fn load_config_file(path: &Path) -> Result<GraphCacheConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;

    toml::from_str(&content).map_err(|e| ConfigError::parse_toml(path, e))
}

fn save_config_file(path: &Path, config: &GraphCacheConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))
}

/// Merge two configurations, with `overlay` taking precedence.
///
/// A value equal to its default counts as unset, so partial files only
/// override what they name.
fn merge_configs(base: GraphCacheConfig, overlay: GraphCacheConfig) -> GraphCacheConfig {
    GraphCacheConfig {
        cache: merge_cache(base.cache, overlay.cache),
        persistence: merge_persistence(base.persistence, overlay.persistence),
        logging: merge_logging(base.logging, overlay.logging),
    }
}

fn merge_cache(base: CacheSettings, overlay: CacheSettings) -> CacheSettings {
    let defaults = CacheSettings::default();
    CacheSettings {
        strict: if overlay.strict != defaults.strict {
            overlay.strict
        } else {
            base.strict
        },
        verify_snapshots: if overlay.verify_snapshots != defaults.verify_snapshots {
            overlay.verify_snapshots
        } else {
            base.verify_snapshots
        },
        verbose: if overlay.verbose != defaults.verbose {
            overlay.verbose
        } else {
            base.verbose
        },
    }
}

fn merge_persistence(base: PersistenceConfig, overlay: PersistenceConfig) -> PersistenceConfig {
    let defaults = PersistenceConfig::default();
    PersistenceConfig {
        snapshot_path: if overlay.snapshot_path != defaults.snapshot_path {
            overlay.snapshot_path
        } else {
            base.snapshot_path
        },
        pretty: if overlay.pretty != defaults.pretty {
            overlay.pretty
        } else {
            base.pretty
        },
    }
}

fn merge_logging(base: LoggingConfig, overlay: LoggingConfig) -> LoggingConfig {
    let defaults = LoggingConfig::default();
    LoggingConfig {
        level: if overlay.level != defaults.level {
            overlay.level
        } else {
            base.level
        },
        format: if overlay.format != defaults.format {
            overlay.format
        } else {
            base.format
        },
    }
}

//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML configuration
    #[error("failed to parse config file '{path}': {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Failed to serialize a configuration before saving it
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Failed to write a global or local configuration file
    #[error("failed to write config file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create `~/.graphcache` or `<dir>/.graphcache`
    #[error("failed to create config directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Home directory not found
    #[error("could not determine home directory")]
    NoHomeDir,

    /// A key holds a value outside its allowed set (e.g. `logging.level`)
    #[error("invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// The merged configuration is unusable as a whole
    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

impl ConfigError {
    /// Create a new ReadFile error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Create a new ParseToml error.
    pub fn parse_toml(path: impl Into<PathBuf>, source: toml::de::Error) -> Self {
        Self::ParseToml {
            path: path.into(),
            source,
        }
    }

    /// Create a new WriteFile error.
    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::WriteFile {
            path: path.into(),
            source,
        }
    }

    /// Create a new CreateDir error.
    pub fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::CreateDir {
            path: path.into(),
            source,
        }
    }

    /// Create a new InvalidValue error for the dotted `key`.
    pub fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConfigError::NoHomeDir;
        assert_eq!(err.to_string(), "could not determine home directory");

        let err = ConfigError::invalid_value("logging.level", "unknown level 'loud'");
        assert!(err.to_string().contains("logging.level"));
        assert!(err.to_string().contains("unknown level"));
    }

    #[test]
    fn test_read_file_keeps_path() {
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = ConfigError::read_file("/tmp/config.toml", source);
        assert!(err.to_string().contains("/tmp/config.toml"));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_write_errors_keep_path() {
        let source = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = ConfigError::create_dir("/tmp/.graphcache", source);
        assert!(err.to_string().contains("config directory '/tmp/.graphcache'"));

        let source = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = ConfigError::write_file("/tmp/.graphcache/config.toml", source);
        assert!(err.to_string().contains("/tmp/.graphcache/config.toml"));
        assert!(err.to_string().contains("denied"));

        let err = ConfigError::ValidationError("snapshot_path is empty".to_string());
        assert_eq!(
            err.to_string(),
            "configuration validation failed: snapshot_path is empty"
        );
    }
}

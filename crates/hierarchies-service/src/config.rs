//! Service configuration.
//!
//! Configuration is loaded from environment variables with defaults suitable
//! for local use.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },
}

/// Default directory for tenant documents and lock markers.
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Default broadcast buffer of the audit bus.
pub const DEFAULT_AUDIT_CAPACITY: usize = 1024;

/// Default maximum length of one outgoing message, in characters.
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 2000;

/// Hierarchy service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Directory holding `<tenant>.json` and `<tenant>.lck`.
    pub data_dir: PathBuf,

    /// Broadcast buffer size of the in-memory audit bus.
    pub audit_capacity: usize,

    /// Maximum characters per rendered message chunk.
    pub max_message_len: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            audit_capacity: DEFAULT_AUDIT_CAPACITY,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `HIERARCHIES_DATA_DIR`: data directory (default: ./data)
    /// - `HIERARCHIES_AUDIT_CAPACITY`: audit bus buffer (default: 1024)
    /// - `HIERARCHIES_MAX_MESSAGE_LEN`: message chunk length (default: 2000)
    ///
    /// Unparseable numbers fall back to their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let default = Self::default();

        Self {
            data_dir: lookup("HIERARCHIES_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.data_dir),
            audit_capacity: lookup("HIERARCHIES_AUDIT_CAPACITY")
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.audit_capacity),
            max_message_len: lookup("HIERARCHIES_MAX_MESSAGE_LEN")
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.max_message_len),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "HIERARCHIES_DATA_DIR".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.audit_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "HIERARCHIES_AUDIT_CAPACITY".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.max_message_len == 0 {
            return Err(ConfigError::InvalidValue {
                key: "HIERARCHIES_MAX_MESSAGE_LEN".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

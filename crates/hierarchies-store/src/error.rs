//! Store error types

use std::path::PathBuf;
use thiserror::Error;

use hierarchies_core::TenantId;

/// Tenant store error types.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another operation holds the tenant's lock
    #[error("Tenant {tenant} is locked by another operation. Try again in a moment, or run unlock if the lock is stale")]
    AlreadyLocked {
        /// Locked tenant
        tenant: TenantId,
    },

    /// Filesystem failure
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Stored document or lock marker could not be (de)serialized
    #[error("Serialization error for tenant {tenant}: {source}")]
    Serialization {
        /// Tenant whose data failed
        tenant: TenantId,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// Blocking write task did not complete
    #[error("Background write task failed: {0}")]
    Task(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    /// Check if this is lock contention.
    pub fn is_locked(&self) -> bool {
        matches!(self, StoreError::AlreadyLocked { .. })
    }

    /// Get error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            StoreError::AlreadyLocked { .. } => "ALREADY_LOCKED",
            StoreError::Io { .. } => "IO_ERROR",
            StoreError::Serialization { .. } => "SERIALIZATION_ERROR",
            StoreError::Task(_) => "TASK_FAILED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_locked_message_mentions_unlock() {
        let err = StoreError::AlreadyLocked {
            tenant: TenantId(42),
        };
        assert!(err.is_locked());
        assert_eq!(err.error_code(), "ALREADY_LOCKED");
        let message = err.to_string();
        assert!(message.contains("42"));
        assert!(message.contains("unlock"));
    }

    #[test]
    fn test_io_error_names_path() {
        let err = StoreError::io(
            "/tmp/7.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(!err.is_locked());
        assert!(err.to_string().contains("/tmp/7.json"));
    }
}

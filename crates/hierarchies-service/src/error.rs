//! Service error types

use thiserror::Error;

use hierarchies_core::{HierarchyError, UserId};
use hierarchies_store::StoreError;

use crate::config::ConfigError;
use crate::platform::{Permission, PlatformError};

/// Hierarchy service error types.
///
/// Transition refusals are not errors; they are reported through
/// [`TransitionOutcome::Rejected`](crate::TransitionOutcome::Rejected).
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage or lock failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Structural validation or corruption
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),

    /// Actor lacks the required permission
    #[error("You must have the {permission} permission to create, delete and modify hierarchies")]
    PermissionDenied {
        /// Acting user
        user: UserId,
        /// Missing permission
        permission: Permission,
    },

    /// Platform call failed
    #[error(transparent)]
    Platform(#[from] PlatformError),

    /// Rejected configuration
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    /// Get error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::Store(e) => e.error_code(),
            ServiceError::Hierarchy(e) => e.error_code(),
            ServiceError::PermissionDenied { .. } => "PERMISSION_DENIED",
            ServiceError::Platform(_) => "PLATFORM_ERROR",
            ServiceError::Config(_) => "INVALID_CONFIG",
        }
    }

    /// Check whether the error is a problem with the request rather than the system.
    pub fn is_user_error(&self) -> bool {
        match self {
            ServiceError::Store(e) => e.is_locked(),
            ServiceError::Hierarchy(e) => !e.is_corruption(),
            ServiceError::PermissionDenied { .. } => true,
            ServiceError::Platform(_) | ServiceError::Config(_) => false,
        }
    }
}

//! Chat platform collaborator
//!
//! The service never talks to a platform directly. Role membership queries,
//! role changes and permission checks go through [`Platform`], which the
//! embedding application implements for its client library.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use hierarchies_core::{RoleId, TenantId, UserId};

/// Platform error types.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// Platform request failed
    #[error("Platform request failed: {0}")]
    RequestFailed(String),

    /// The bot lacks rights to perform the change
    #[error("Platform refused the change: {0}")]
    Forbidden(String),

    /// User is not a member of the tenant
    #[error("User {0} is not a member of this server")]
    UnknownUser(UserId),
}

/// Result type for platform operations.
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Permissions checked by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Create, delete and restructure hierarchies (the platform's role
    /// management permission)
    ManageHierarchies,
}

impl Permission {
    /// Get string representation of the permission.
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ManageHierarchies => "manage_roles",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations the service needs from the chat platform.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Check whether a role still exists on the tenant.
    async fn role_exists(&self, tenant: TenantId, role: RoleId) -> PlatformResult<bool>;

    /// Check whether a user holds a role.
    async fn has_role(&self, tenant: TenantId, user: UserId, role: RoleId) -> PlatformResult<bool>;

    /// Grant a role. Granting a held role is not an error.
    async fn add_role(&self, tenant: TenantId, user: UserId, role: RoleId) -> PlatformResult<()>;

    /// Revoke a role. Revoking a role that is not held is not an error.
    async fn remove_role(&self, tenant: TenantId, user: UserId, role: RoleId) -> PlatformResult<()>;

    /// Check whether a user holds a permission.
    async fn check_permission(
        &self,
        tenant: TenantId,
        user: UserId,
        permission: Permission,
    ) -> PlatformResult<bool>;
}

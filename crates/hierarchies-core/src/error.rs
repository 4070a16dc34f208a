//! Error types for structural hierarchy operations
//!
//! Validation errors describe a request that cannot be applied to a healthy
//! document. Corruption errors describe a document whose role index and trees
//! disagree; they are reported, never repaired.

use thiserror::Error;

use crate::ids::RoleId;

/// Structural operation error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HierarchyError {
    /// Hierarchy name is empty
    #[error("Hierarchy name cannot be empty")]
    NameEmpty,

    /// Hierarchy name contains whitespace
    #[error("Hierarchy name \"{name}\" cannot contain spaces")]
    NameHasSpaces {
        /// Rejected name
        name: String,
    },

    /// Hierarchy name is longer than the limit
    #[error("Hierarchy name \"{name}\" cannot exceed 32 characters")]
    NameTooLong {
        /// Rejected name
        name: String,
    },

    /// A hierarchy with this name already exists
    #[error("Hierarchy \"{name}\" already exists")]
    NameExists {
        /// Existing name
        name: String,
    },

    /// Hierarchy does not exist
    #[error("Hierarchy \"{name}\" does not exist")]
    NotFound {
        /// Requested name
        name: String,
    },

    /// Role id 0 is reserved for the root-parent sentinel
    #[error("Role id {role} is reserved")]
    ReservedRoleId {
        /// Rejected role
        role: RoleId,
    },

    /// Role already belongs to a hierarchy
    #[error("Role {role} already exists in hierarchy \"{hierarchy}\"")]
    RoleAlreadyInHierarchy {
        /// Role being added
        role: RoleId,
        /// Hierarchy that owns it
        hierarchy: String,
    },

    /// Role does not belong to any hierarchy
    #[error("Role {role} does not belong to a hierarchy")]
    RoleNotIndexed {
        /// Requested role
        role: RoleId,
    },

    /// Parent role does not belong to any hierarchy
    #[error("Parent role {parent} does not exist in a hierarchy")]
    ParentNotIndexed {
        /// Requested parent
        parent: RoleId,
    },

    /// Reparent target lives in another hierarchy
    #[error("Cannot move role {role} under {parent}: parent belongs to \"{parent_hierarchy}\", not \"{hierarchy}\"")]
    CrossHierarchyReparent {
        /// Role being modified
        role: RoleId,
        /// Requested parent
        parent: RoleId,
        /// Hierarchy of the role
        hierarchy: String,
        /// Hierarchy of the parent
        parent_hierarchy: String,
    },

    /// Root tiers cannot acquire a parent
    #[error("Role {role} is the root tier of hierarchy \"{hierarchy}\" and cannot be reparented")]
    RootCannotBeReparented {
        /// Root role
        role: RoleId,
        /// Hierarchy name
        hierarchy: String,
    },

    /// Root tiers cannot be removed individually
    #[error("Cannot remove root tier {role} of hierarchy \"{hierarchy}\"; delete and recreate the hierarchy instead")]
    RootCannotBeRemoved {
        /// Root role
        role: RoleId,
        /// Hierarchy name
        hierarchy: String,
    },

    /// Reparenting would make the role its own ancestor
    #[error("Moving role {role} under {parent} would create a cycle in hierarchy \"{hierarchy}\"")]
    WouldCreateCycle {
        /// Role being modified
        role: RoleId,
        /// Requested parent
        parent: RoleId,
        /// Hierarchy name
        hierarchy: String,
    },

    /// Corruption: the role index names a hierarchy that no longer exists
    #[error("Corruption: role {role} is indexed under hierarchy \"{hierarchy}\", which no longer exists")]
    HierarchyMissing {
        /// Indexed role
        role: RoleId,
        /// Missing hierarchy
        hierarchy: String,
    },

    /// Corruption: the parent role is indexed but absent from its tree
    #[error("Corruption: parent role {parent} is indexed under \"{hierarchy}\" but missing from its tree")]
    ParentMissingFromTree {
        /// Parent role
        parent: RoleId,
        /// Hierarchy name
        hierarchy: String,
    },

    /// Corruption: the role is indexed but absent from its tree
    #[error("Corruption: role {role} is indexed under \"{hierarchy}\" but missing from its tree")]
    TierMissingFromTree {
        /// Role
        role: RoleId,
        /// Hierarchy name
        hierarchy: String,
    },
}

/// Result type for structural operations.
pub type HierarchyResult<T> = Result<T, HierarchyError>;

impl HierarchyError {
    /// Check whether this error reports an index/tree mismatch rather than a bad request.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            HierarchyError::HierarchyMissing { .. }
                | HierarchyError::ParentMissingFromTree { .. }
                | HierarchyError::TierMissingFromTree { .. }
        )
    }

    /// Get error code for command responses and audit records.
    pub fn error_code(&self) -> &'static str {
        match self {
            HierarchyError::NameEmpty => "NAME_EMPTY",
            HierarchyError::NameHasSpaces { .. } => "NAME_HAS_SPACES",
            HierarchyError::NameTooLong { .. } => "NAME_TOO_LONG",
            HierarchyError::NameExists { .. } => "NAME_EXISTS",
            HierarchyError::NotFound { .. } => "NOT_FOUND",
            HierarchyError::ReservedRoleId { .. } => "RESERVED_ROLE_ID",
            HierarchyError::RoleAlreadyInHierarchy { .. } => "ROLE_ALREADY_IN_HIERARCHY",
            HierarchyError::RoleNotIndexed { .. } => "ROLE_NOT_INDEXED",
            HierarchyError::ParentNotIndexed { .. } => "PARENT_NOT_INDEXED",
            HierarchyError::CrossHierarchyReparent { .. } => "CROSS_HIERARCHY_REPARENT",
            HierarchyError::RootCannotBeReparented { .. } => "ROOT_CANNOT_BE_REPARENTED",
            HierarchyError::RootCannotBeRemoved { .. } => "ROOT_CANNOT_BE_REMOVED",
            HierarchyError::WouldCreateCycle { .. } => "WOULD_CREATE_CYCLE",
            HierarchyError::HierarchyMissing { .. } => "CORRUPTION_HIERARCHY_MISSING",
            HierarchyError::ParentMissingFromTree { .. } => "CORRUPTION_PARENT_MISSING",
            HierarchyError::TierMissingFromTree { .. } => "CORRUPTION_TIER_MISSING",
        }
    }
}

//! # Hierarchies Service
//!
//! Command service for per-tenant role hierarchies.
//!
//! ## Overview
//!
//! [`HierarchyService`] binds together:
//! - a [`TenantStore`](hierarchies_store::TenantStore) for documents and locks
//! - a [`Platform`] for role membership, role changes and permission checks
//! - an [`AuditSink`](hierarchies_events::AuditSink) for the audit trail
//! - a [`HookRegistry`] of per-tenant [`TransitionHooks`]
//!
//! ## Commands
//!
//! | Command | Lock | Permission | Audit |
//! |---------|------|------------|-------|
//! | `list`, `show` | no | manage | no |
//! | `create`, `delete`, `add`, `modify`, `remove`, `set_log_channel` | yes | manage | yes |
//! | `unlock` | clears it | manage | yes |
//! | `promote`, `demote`, `assign`, `unassign` | no | depth window | yes |
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hierarchies_core::{RoleId, TenantId, UserId};
//! use hierarchies_service::{HierarchyService, Platform, ServiceConfig};
//!
//! async fn run(platform: Arc<dyn Platform>) -> hierarchies_service::ServiceResult<()> {
//!     let config = ServiceConfig::from_env();
//!     let (service, _audit) = HierarchyService::from_config(config, platform)?;
//!
//!     let tenant = TenantId(1);
//!     let admin = UserId(10);
//!     service.create_hierarchy(tenant, admin, "Guild", RoleId(100)).await?;
//!
//!     let outcome = service.promote(tenant, admin, UserId(20), RoleId(100)).await?;
//!     if let Some(reply) = outcome.reply(UserId(20)) {
//!         println!("{reply}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod hooks;
pub mod platform;
pub mod render;
pub mod service;

pub use config::{ConfigError, ServiceConfig};
pub use error::{ServiceError, ServiceResult};
pub use hooks::{
    DefaultHooks, DefaultMutation, HookContext, HookRegistry, RoleMutation, TransitionHooks,
};
pub use platform::{Permission, Platform, PlatformError, PlatformResult};
pub use service::{HierarchyService, TransitionOutcome};

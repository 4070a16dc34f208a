//! # Hierarchies Core
//!
//! Data model and decision logic for per-tenant role hierarchies.
//!
//! ## Overview
//!
//! A tenant defines independent promotion chains ("hierarchies") made of ranks
//! ("tiers"), each bound to a platform role. This crate handles:
//! - **Documents**: the persisted per-tenant state and its role index
//! - **Tree maintenance**: create, add, modify, splice-remove, depth rebuild
//! - **Transitions**: promote/demote/assign/unassign authorization by depth window
//!
//! Everything here is synchronous and free of I/O. Persistence lives in
//! `hierarchies-store`, platform effects in `hierarchies-service`.
//!
//! ## Architecture
//!
//! ```text
//! TenantDocument
//!   ├─ hierarchies: name ─→ Hierarchy
//!   │                         └─ tiers (root first, parent-linked, derived depth)
//!   ├─ roleIndex: role ─→ hierarchy name
//!   └─ logChannel
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use hierarchies_core::{
//!     decide, DepthWindow, Membership, RoleId, TenantDocument, TierRules, TransitionKind,
//! };
//!
//! let mut doc = TenantDocument::new();
//! doc.create_hierarchy("Guild", RoleId(100)).unwrap();
//! let rules = TierRules::new(DepthWindow::new(0, 1), DepthWindow::DISABLED);
//! doc.add_tier(RoleId(101), RoleId(100), rules.clone()).unwrap();
//! doc.add_tier(RoleId(102), RoleId(101), rules).unwrap();
//!
//! // A holder of the root promotes a member from R2 to R1
//! let membership = Membership::new()
//!     .with_author_roles([RoleId(100)])
//!     .with_member_roles([RoleId(102)]);
//! let plan = decide(&doc, TransitionKind::Promote, RoleId(101), &membership).unwrap();
//! assert_eq!(plan.source, Some(RoleId(102)));
//! ```

pub mod document;
pub mod error;
pub mod hierarchy;
pub mod ids;
pub mod tier;
pub mod transition;
pub mod tree;

// Re-export main types for convenience
pub use document::{IndexMismatch, TenantDocument};
pub use error::{HierarchyError, HierarchyResult};
pub use hierarchy::{recompute_depths, validate_name, Hierarchy, MAX_NAME_LEN};
pub use ids::{ChannelId, RoleId, TenantId, UserId};
pub use tier::{Capability, DepthWindow, Tier, TierRules, DISABLED_BOUND, OPEN_WINDOW_MAX};
pub use transition::{
    authorize, decide, resolve, Membership, Rejection, TransitionKind, TransitionPlan,
};

//! # Hierarchies Events
//!
//! Audit trail for hierarchy commands.
//!
//! ## Overview
//!
//! - **Event Types**: [`AuditEvent`] envelope and the typed [`HierarchyEvent`]
//! - **Sinks**: the [`AuditSink`] trait, an in-memory broadcast bus and a
//!   sink that forwards to `tracing`
//!
//! Topics are `{tenant}.{event_type}`, e.g. `42.transition.rejected`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hierarchies_core::{RoleId, TenantId, UserId};
//! use hierarchies_events::{AuditSink, HierarchyEvent, MemoryAuditBus};
//!
//! async fn publish_example() {
//!     let bus = MemoryAuditBus::new();
//!     let mut sub = bus.subscribe("42.tier.*").await;
//!
//!     let event = HierarchyEvent::TierRemoved {
//!         hierarchy: "Guild".to_string(),
//!         role: RoleId(101),
//!     };
//!     bus.log_event(event.to_event(TenantId(42), UserId(1))).await.unwrap();
//!
//!     let received = sub.recv().await.unwrap();
//!     println!("{}", received.message);
//! }
//! ```

pub mod sink;
pub mod types;

pub use sink::{
    AuditError, AuditResult, AuditSink, AuditStats, AuditSubscription, MemoryAuditBus,
    TracingAuditSink,
};
pub use types::{AuditEvent, HierarchyEvent};

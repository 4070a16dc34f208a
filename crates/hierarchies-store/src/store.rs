//! Tenant store abstraction
//!
//! A tenant store persists one [`TenantDocument`] per tenant and guards it
//! with an exclusive, non-blocking advisory lock. Structural changes follow
//! acquire, load, mutate, save, release; reads take no lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use hierarchies_core::{TenantDocument, TenantId};

use crate::error::StoreResult;

/// Proof that the caller acquired a tenant's lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHandle {
    /// Locked tenant
    pub tenant: TenantId,
    /// Token written into the lock marker
    pub token: Uuid,
    /// When the lock was taken
    pub acquired_at: DateTime<Utc>,
}

impl LockHandle {
    /// Create a handle with a fresh token.
    pub fn new(tenant: TenantId) -> Self {
        Self {
            tenant,
            token: Uuid::now_v7(),
            acquired_at: Utc::now(),
        }
    }
}

/// Contents of a lock marker, kept for diagnosing stale locks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockMarker {
    /// Token of the owning handle
    pub token: Uuid,
    /// Host that took the lock
    pub hostname: String,
    /// Process that took the lock
    pub pid: u32,
    /// When the lock was taken
    pub acquired_at: DateTime<Utc>,
}

impl LockMarker {
    /// Describe the current process as the holder of `handle`.
    pub fn for_handle(handle: &LockHandle) -> Self {
        Self {
            token: handle.token,
            hostname: hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "unknown".to_string()),
            pid: std::process::id(),
            acquired_at: handle.acquired_at,
        }
    }
}

/// Persistence and locking for tenant documents.
#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Take the tenant's lock without waiting.
    ///
    /// Fails with `AlreadyLocked` if any holder, including this process, has
    /// not released it.
    async fn acquire_lock(&self, tenant: TenantId) -> StoreResult<LockHandle>;

    /// Release a lock taken by `handle`.
    ///
    /// Returns `false` without touching the lock when it is gone or its marker
    /// carries another token, e.g. after an operator cleared it and another
    /// writer took it. A marker whose token cannot be read is released.
    async fn release(&self, handle: &LockHandle) -> StoreResult<bool>;

    /// Clear the tenant's lock whoever holds it. Returns whether a lock was held.
    async fn release_lock(&self, tenant: TenantId) -> StoreResult<bool>;

    /// Check whether the tenant is locked.
    async fn is_locked(&self, tenant: TenantId) -> StoreResult<bool>;

    /// Read the current lock marker, if any.
    async fn lock_marker(&self, tenant: TenantId) -> StoreResult<Option<LockMarker>>;

    /// Load the tenant's document, or an empty document if none was saved.
    async fn load(&self, tenant: TenantId) -> StoreResult<TenantDocument>;

    /// Replace the tenant's document atomically.
    async fn save(&self, tenant: TenantId, doc: &TenantDocument) -> StoreResult<()>;
}

//! In-memory tenant store
//!
//! Suitable for tests and for embedding in a single process.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use hierarchies_core::{TenantDocument, TenantId};

use crate::error::{StoreError, StoreResult};
use crate::store::{LockHandle, LockMarker, TenantStore};

/// Tenant store held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryTenantStore {
    documents: Arc<RwLock<HashMap<TenantId, TenantDocument>>>,
    locks: Arc<RwLock<HashMap<TenantId, LockMarker>>>,
}

impl MemoryTenantStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with one document.
    pub async fn with_document(tenant: TenantId, doc: TenantDocument) -> Self {
        let store = Self::new();
        store.documents.write().await.insert(tenant, doc);
        store
    }
}

#[async_trait]
impl TenantStore for MemoryTenantStore {
    async fn acquire_lock(&self, tenant: TenantId) -> StoreResult<LockHandle> {
        let mut locks = self.locks.write().await;
        if locks.contains_key(&tenant) {
            warn!(tenant = %tenant, "Lock already held");
            return Err(StoreError::AlreadyLocked { tenant });
        }

        let handle = LockHandle::new(tenant);
        locks.insert(tenant, LockMarker::for_handle(&handle));
        debug!(tenant = %tenant, token = %handle.token, "Lock acquired");
        Ok(handle)
    }

    async fn release(&self, handle: &LockHandle) -> StoreResult<bool> {
        let mut locks = self.locks.write().await;
        match locks.get(&handle.tenant) {
            Some(marker) if marker.token == handle.token => {
                locks.remove(&handle.tenant);
                debug!(tenant = %handle.tenant, token = %handle.token, "Lock released");
                Ok(true)
            }
            Some(marker) => {
                warn!(
                    tenant = %handle.tenant,
                    token = %handle.token,
                    holder = %marker.token,
                    "Lock is held by another token, leaving it in place"
                );
                Ok(false)
            }
            None => Ok(false),
        }
    }

    async fn release_lock(&self, tenant: TenantId) -> StoreResult<bool> {
        Ok(self.locks.write().await.remove(&tenant).is_some())
    }

    async fn is_locked(&self, tenant: TenantId) -> StoreResult<bool> {
        Ok(self.locks.read().await.contains_key(&tenant))
    }

    async fn lock_marker(&self, tenant: TenantId) -> StoreResult<Option<LockMarker>> {
        Ok(self.locks.read().await.get(&tenant).cloned())
    }

    async fn load(&self, tenant: TenantId) -> StoreResult<TenantDocument> {
        Ok(self
            .documents
            .read()
            .await
            .get(&tenant)
            .cloned()
            .unwrap_or_default())
    }

    async fn save(&self, tenant: TenantId, doc: &TenantDocument) -> StoreResult<()> {
        self.documents.write().await.insert(tenant, doc.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hierarchies_core::RoleId;

    #[tokio::test]
    async fn test_lock_cycle() {
        let store = MemoryTenantStore::new();
        let tenant = TenantId(1);

        store.acquire_lock(tenant).await.unwrap();
        assert!(store.acquire_lock(tenant).await.unwrap_err().is_locked());
        assert!(store.lock_marker(tenant).await.unwrap().is_some());

        assert!(store.release_lock(tenant).await.unwrap());
        assert!(!store.release_lock(tenant).await.unwrap());
        store.acquire_lock(tenant).await.unwrap();
    }

    #[tokio::test]
    async fn test_release_ignores_lock_taken_after_unlock() {
        let store = MemoryTenantStore::new();
        let tenant = TenantId(3);

        let stale = store.acquire_lock(tenant).await.unwrap();
        assert!(store.release_lock(tenant).await.unwrap());
        let current = store.acquire_lock(tenant).await.unwrap();

        assert!(!store.release(&stale).await.unwrap());
        assert!(store.is_locked(tenant).await.unwrap());

        assert!(store.release(&current).await.unwrap());
        assert!(!store.is_locked(tenant).await.unwrap());
        assert!(!store.release(&current).await.unwrap());
    }

    #[tokio::test]
    async fn test_documents_are_isolated_per_tenant() {
        let mut doc = TenantDocument::new();
        doc.create_hierarchy("Guild", RoleId(10)).unwrap();
        let store = MemoryTenantStore::with_document(TenantId(1), doc.clone()).await;

        assert_eq!(store.load(TenantId(1)).await.unwrap(), doc);
        assert!(store.load(TenantId(2)).await.unwrap().is_empty());

        store.save(TenantId(2), &doc).await.unwrap();
        assert_eq!(store.load(TenantId(2)).await.unwrap(), doc);
    }

    #[tokio::test]
    async fn test_concurrent_acquire_has_one_winner() {
        let store = MemoryTenantStore::new();
        let tenant = TenantId(9);

        let attempts: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.acquire_lock(tenant).await.is_ok() })
            })
            .collect();

        let mut winners = 0;
        for attempt in attempts {
            if attempt.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}

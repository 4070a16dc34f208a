//! File-backed tenant store
//!
//! Layout under the data directory:
//! - `<tenant>.json`: the tenant document
//! - `<tenant>.lck`: lock marker, present while the tenant is locked
//!
//! The marker is created with create-new semantics, so two processes racing
//! for the same tenant cannot both succeed. Documents are written to a
//! temporary file in the same directory and renamed over the old one.

use async_trait::async_trait;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use hierarchies_core::{TenantDocument, TenantId};

use crate::error::{StoreError, StoreResult};
use crate::store::{LockHandle, LockMarker, TenantStore};

/// Tenant store over a directory of JSON files.
#[derive(Debug, Clone)]
pub struct FileTenantStore {
    data_dir: PathBuf,
}

impl FileTenantStore {
    /// Create a store rooted at `data_dir`. The directory is created on first write.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Get the data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of a tenant's document.
    pub fn document_path(&self, tenant: TenantId) -> PathBuf {
        self.data_dir.join(format!("{tenant}.json"))
    }

    /// Path of a tenant's lock marker.
    pub fn lock_path(&self, tenant: TenantId) -> PathBuf {
        self.data_dir.join(format!("{tenant}.lck"))
    }

    async fn ensure_dir(&self) -> StoreResult<()> {
        tokio::fs::create_dir_all(&self.data_dir)
            .await
            .map_err(|e| StoreError::io(&self.data_dir, e))
    }
}

#[async_trait]
impl TenantStore for FileTenantStore {
    async fn acquire_lock(&self, tenant: TenantId) -> StoreResult<LockHandle> {
        self.ensure_dir().await?;
        let path = self.lock_path(tenant);

        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                warn!(tenant = %tenant, path = %path.display(), "Lock already held");
                return Err(StoreError::AlreadyLocked { tenant });
            }
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        let handle = LockHandle::new(tenant);
        let marker = serde_json::to_vec(&LockMarker::for_handle(&handle))
            .map_err(|source| StoreError::Serialization { tenant, source })?;

        // The marker's presence is the lock; its token scopes `release`.
        if let Err(e) = file.write_all(&marker).await {
            warn!(tenant = %tenant, error = %e, "Failed to write lock marker contents");
        }

        debug!(tenant = %tenant, token = %handle.token, "Lock acquired");
        Ok(handle)
    }

    async fn release(&self, handle: &LockHandle) -> StoreResult<bool> {
        let tenant = handle.tenant;
        let path = self.lock_path(tenant);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        if let Ok(marker) = serde_json::from_slice::<LockMarker>(&bytes) {
            if marker.token != handle.token {
                warn!(
                    tenant = %tenant,
                    token = %handle.token,
                    holder = %marker.token,
                    "Lock is held by another token, leaving it in place"
                );
                return Ok(false);
            }
        }

        self.release_lock(tenant).await
    }

    async fn release_lock(&self, tenant: TenantId) -> StoreResult<bool> {
        let path = self.lock_path(tenant);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(tenant = %tenant, "Lock released");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    async fn is_locked(&self, tenant: TenantId) -> StoreResult<bool> {
        let path = self.lock_path(tenant);
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| StoreError::io(&path, e))
    }

    async fn lock_marker(&self, tenant: TenantId) -> StoreResult<Option<LockMarker>> {
        let path = self.lock_path(tenant);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        // An unreadable marker gives no holder record, but the tenant stays locked.
        match serde_json::from_slice(&bytes) {
            Ok(marker) => Ok(Some(marker)),
            Err(e) => {
                warn!(tenant = %tenant, error = %e, "Unreadable lock marker");
                Ok(None)
            }
        }
    }

    async fn load(&self, tenant: TenantId) -> StoreResult<TenantDocument> {
        let path = self.document_path(tenant);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(tenant = %tenant, "No stored document, using empty document");
                return Ok(TenantDocument::default());
            }
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        serde_json::from_str(&contents).map_err(|source| StoreError::Serialization { tenant, source })
    }

    async fn save(&self, tenant: TenantId, doc: &TenantDocument) -> StoreResult<()> {
        self.ensure_dir().await?;
        let json = serde_json::to_string_pretty(doc)
            .map_err(|source| StoreError::Serialization { tenant, source })?;

        let dir = self.data_dir.clone();
        let path = self.document_path(tenant);
        tokio::task::spawn_blocking(move || write_atomic(&dir, &path, json.as_bytes()))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))??;

        debug!(tenant = %tenant, hierarchies = doc.hierarchies.len(), "Document saved");
        Ok(())
    }
}

fn write_atomic(dir: &Path, path: &Path, contents: &[u8]) -> StoreResult<()> {
    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
    temp.write_all(contents)
        .map_err(|e| StoreError::io(temp.path(), e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| StoreError::io(temp.path(), e))?;
    temp.persist(path)
        .map_err(|e| StoreError::io(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hierarchies_core::{ChannelId, RoleId, TierRules};
    use tempfile::TempDir;

    const TENANT: TenantId = TenantId(4242);

    fn store() -> (TempDir, FileTenantStore) {
        let dir = TempDir::new().unwrap();
        let store = FileTenantStore::new(dir.path().join("data"));
        (dir, store)
    }

    #[test]
    fn test_paths() {
        let store = FileTenantStore::new("/srv/hierarchies");
        assert_eq!(
            store.document_path(TENANT),
            PathBuf::from("/srv/hierarchies/4242.json")
        );
        assert_eq!(
            store.lock_path(TENANT),
            PathBuf::from("/srv/hierarchies/4242.lck")
        );
    }

    #[tokio::test]
    async fn test_lock_is_exclusive() {
        let (_dir, store) = store();

        let handle = store.acquire_lock(TENANT).await.unwrap();
        assert_eq!(handle.tenant, TENANT);
        assert!(store.is_locked(TENANT).await.unwrap());

        let err = store.acquire_lock(TENANT).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyLocked { tenant } if tenant == TENANT));

        // other tenants are unaffected
        store.acquire_lock(TenantId(1)).await.unwrap();

        assert!(store.release_lock(TENANT).await.unwrap());
        assert!(!store.is_locked(TENANT).await.unwrap());
        store.acquire_lock(TENANT).await.unwrap();
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let (_dir, store) = store();
        assert!(!store.release_lock(TENANT).await.unwrap());

        store.acquire_lock(TENANT).await.unwrap();
        assert!(store.release_lock(TENANT).await.unwrap());
        assert!(!store.release_lock(TENANT).await.unwrap());
    }

    #[tokio::test]
    async fn test_lock_marker_records_holder() {
        let (_dir, store) = store();
        assert_eq!(store.lock_marker(TENANT).await.unwrap(), None);

        let handle = store.acquire_lock(TENANT).await.unwrap();
        let marker = store.lock_marker(TENANT).await.unwrap().unwrap();
        assert_eq!(marker.token, handle.token);
        assert_eq!(marker.pid, std::process::id());
    }

    #[tokio::test]
    async fn test_foreign_marker_counts_as_locked() {
        let (_dir, store) = store();
        std::fs::create_dir_all(store.data_dir()).unwrap();
        std::fs::write(store.lock_path(TENANT), b"").unwrap();

        assert!(store.is_locked(TENANT).await.unwrap());
        assert!(store.acquire_lock(TENANT).await.unwrap_err().is_locked());
        assert_eq!(store.lock_marker(TENANT).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_release_only_drops_own_lock() {
        let (_dir, store) = store();

        let stale = store.acquire_lock(TENANT).await.unwrap();
        assert!(store.release_lock(TENANT).await.unwrap());
        let current = store.acquire_lock(TENANT).await.unwrap();

        assert!(!store.release(&stale).await.unwrap());
        assert!(store.is_locked(TENANT).await.unwrap());
        assert_eq!(
            store.lock_marker(TENANT).await.unwrap().unwrap().token,
            current.token
        );

        assert!(store.release(&current).await.unwrap());
        assert!(!store.is_locked(TENANT).await.unwrap());
        assert!(!store.release(&current).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_clears_unreadable_marker() {
        let (_dir, store) = store();
        let handle = store.acquire_lock(TENANT).await.unwrap();
        std::fs::write(store.lock_path(TENANT), b"{").unwrap();

        assert!(store.release(&handle).await.unwrap());
        assert!(!store.is_locked(TENANT).await.unwrap());
    }

    #[tokio::test]
    async fn test_load_missing_document_is_empty() {
        let (_dir, store) = store();
        let doc = store.load(TENANT).await.unwrap();
        assert_eq!(doc, TenantDocument::default());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let (_dir, store) = store();
        let mut doc = TenantDocument::new();
        doc.create_hierarchy("Guild", RoleId(100)).unwrap();
        doc.add_tier(RoleId(101), RoleId(100), TierRules::default())
            .unwrap();
        doc.set_log_channel(Some(ChannelId(7)));

        store.save(TENANT, &doc).await.unwrap();
        assert_eq!(store.load(TENANT).await.unwrap(), doc);

        // overwrite leaves no temporary files behind
        doc.delete_hierarchy("Guild").unwrap();
        store.save(TENANT, &doc).await.unwrap();
        assert_eq!(store.load(TENANT).await.unwrap(), doc);
        let entries = std::fs::read_dir(store.data_dir()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[tokio::test]
    async fn test_load_legacy_document() {
        let (_dir, store) = store();
        std::fs::create_dir_all(store.data_dir()).unwrap();
        std::fs::write(
            store.document_path(TENANT),
            r#"{
                "hierarchies": {
                    "Guild": {
                        "tiers": [{
                            "role_id": 100,
                            "parent_role_id": 0,
                            "depth": 0,
                            "promotion_min_depth": 0,
                            "promotion_max_depth": 500,
                            "demotion_min_depth": 0,
                            "demotion_max_depth": 500
                        }],
                        "maximum_depth": 0
                    }
                },
                "roles": { "100": "Guild" }
            }"#,
        )
        .unwrap();

        let doc = store.load(TENANT).await.unwrap();
        assert_eq!(doc.hierarchy_of(RoleId(100)), Some("Guild"));
        assert_eq!(doc.log_channel, None);
        assert!(doc.index_mismatches().is_empty());
    }

    #[tokio::test]
    async fn test_load_corrupt_document_fails() {
        let (_dir, store) = store();
        std::fs::create_dir_all(store.data_dir()).unwrap();
        std::fs::write(store.document_path(TENANT), b"{ not json").unwrap();

        let err = store.load(TENANT).await.unwrap_err();
        assert_eq!(err.error_code(), "SERIALIZATION_ERROR");
    }
}

//! # Hierarchies Store
//!
//! Persistence for per-tenant hierarchy documents, with a single-writer
//! advisory lock per tenant.
//!
//! ## Backends
//!
//! - [`FileTenantStore`]: `<tenant>.json` documents and `<tenant>.lck` markers
//!   in a data directory, atomic replace-on-write
//! - [`MemoryTenantStore`]: in-process maps, for tests and embedding
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hierarchies_core::{RoleId, TenantId};
//! use hierarchies_store::{FileTenantStore, TenantStore};
//!
//! # async fn example() -> hierarchies_store::StoreResult<()> {
//! let store = FileTenantStore::new("./data");
//! let tenant = TenantId(1);
//!
//! store.acquire_lock(tenant).await?;
//! let mut doc = store.load(tenant).await?;
//! if doc.create_hierarchy("Guild", RoleId(100)).is_ok() {
//!     store.save(tenant, &doc).await?;
//! }
//! store.release_lock(tenant).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod file;
pub mod memory;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use file::FileTenantStore;
pub use memory::MemoryTenantStore;
pub use store::{LockHandle, LockMarker, TenantStore};

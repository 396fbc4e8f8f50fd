//! logstore Storage - External Collaborator Seams
//!
//! The schema reconciler talks to three systems it does not own: the column
//! store, the tenant directory and the cluster lock service. Each is a trait
//! here; production drivers implement them in the host service. The
//! `memory` module provides in-process implementations for single-node
//! development and for tests.

pub mod directory;
pub mod lock;
pub mod memory;
pub mod store;

pub use directory::{TenantDirectory, TenantPage};
pub use lock::{LockHandle, LockProvider};
pub use memory::{
    MemoryLockHandle, MemoryLockProvider, MemorySchemaStore, MemorySession,
    MemoryTenantDirectory, StoreCall, SYSTEM_KEYSPACE,
};
pub use store::{SchemaSession, SchemaStore};

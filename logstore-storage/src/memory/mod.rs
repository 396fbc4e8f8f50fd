//! In-memory collaborators.
//!
//! Each backend keeps its state behind an `Arc`, so clones share state: a
//! test keeps one clone for inspection and failure injection and hands the
//! other to the reconciler.

mod directory;
mod lock;
mod store;

pub use directory::MemoryTenantDirectory;
pub use lock::{MemoryLockHandle, MemoryLockProvider};
pub use store::{MemorySchemaStore, MemorySession, StoreCall, SYSTEM_KEYSPACE};

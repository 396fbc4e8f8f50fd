//! Column store seam.

use async_trait::async_trait;
use logstore_core::{KeyspaceConfig, KeyspaceMetadata, SessionConfig, Statement, StoreError};

/// Driver entry point: opens sessions and creates keyspaces.
#[async_trait]
pub trait SchemaStore: Send + Sync {
    /// Open a session against the configured keyspace at the configured
    /// consistency level.
    async fn session(&self, config: &SessionConfig) -> Result<Box<dyn SchemaSession>, StoreError>;

    /// Create a keyspace. Must succeed when the keyspace already exists.
    async fn create_keyspace(&self, config: &KeyspaceConfig) -> Result<(), StoreError>;
}

/// An open session. Dropping it releases the underlying connection.
#[async_trait]
pub trait SchemaSession: Send + Sync {
    /// Look up keyspace metadata.
    ///
    /// `Ok(None)` and `Err(_)` both mean the caller cannot see the keyspace;
    /// callers that only need existence treat them the same.
    async fn keyspace_metadata(&self, keyspace: &str)
        -> Result<Option<KeyspaceMetadata>, StoreError>;

    /// Execute one schema statement at the statement's consistency level.
    ///
    /// Per-statement resources are released before returning, whatever the
    /// outcome.
    async fn execute(&self, statement: &Statement) -> Result<(), StoreError>;
}

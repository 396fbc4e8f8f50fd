//! Reconciler errors

use logstore_core::{ConfigError, DirectoryError, StoreError};
use thiserror::Error;

/// Why a reconciler operation failed.
///
/// Every variant names the step that failed so a single log line is enough
/// to tell a directory outage from a DDL rejection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("Invalid reconciler configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to open system session: {0}")]
    Session(#[source] StoreError),

    #[error("Bootstrap statement failed on {target}: {source}")]
    Bootstrap {
        target: String,
        #[source]
        source: StoreError,
    },

    #[error("Failed to fetch tenants: {0}")]
    TenantFetch(#[from] DirectoryError),

    #[error("Failed to create keyspace {keyspace}: {source}")]
    CreateKeyspace {
        keyspace: String,
        #[source]
        source: StoreError,
    },

    #[error("Failed to create tables in {keyspace}: {source}")]
    CreateTables {
        keyspace: String,
        #[source]
        source: StoreError,
    },
}

impl ReconcileError {
    /// Keyspace the failure is attributed to, if any.
    pub fn keyspace(&self) -> Option<&str> {
        match self {
            ReconcileError::CreateKeyspace { keyspace, .. }
            | ReconcileError::CreateTables { keyspace, .. } => Some(keyspace),
            _ => None,
        }
    }
}

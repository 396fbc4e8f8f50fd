//! Error types for logstore operations

use thiserror::Error;

/// Column-store errors: sessions, metadata lookups and DDL execution.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Keyspace {keyspace} does not exist")]
    KeyspaceNotFound { keyspace: String },

    #[error("Table {keyspace}.{table} does not exist")]
    TableNotFound { keyspace: String, table: String },

    #[error("Session for keyspace {keyspace} unavailable: {reason}")]
    SessionUnavailable { keyspace: String, reason: String },

    #[error("Metadata query for keyspace {keyspace} failed: {reason}")]
    MetadataQueryFailed { keyspace: String, reason: String },

    #[error("Statement execution failed: {reason}")]
    ExecutionFailed { reason: String },

    #[error("Keyspace creation failed for {keyspace}: {reason}")]
    KeyspaceCreationFailed { keyspace: String, reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Tenant directory errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("Tenant directory unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Invalid tenant page request: page {page_no} of size {page_size}")]
    InvalidPage { page_no: u64, page_size: i64 },

    #[error("Directory lock poisoned")]
    LockPoisoned,
}

/// Distributed lock errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LockError {
    /// The wait was abandoned because the caller is shutting down.
    #[error("Lock operation cancelled")]
    Cancelled,

    #[error("Lock backend failure for {key}: {reason}")]
    Backend { key: String, reason: String },

    #[error("Lock {key} is not held by this handle")]
    NotHeld { key: String },

    #[error("Lock handle for {key} is closed")]
    Closed { key: String },

    /// The lease ran out before it was renewed; another handle may hold
    /// the lock now.
    #[error("Lease on {key} expired")]
    LeaseExpired { key: String },

    #[error("Lock table poisoned")]
    Poisoned,
}

impl LockError {
    /// Cancellation is a shutdown signal, not a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LockError::Cancelled)
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

// =============================================================================
// TESTS
// =============================================================================

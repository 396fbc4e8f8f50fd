//! logstore Core - Domain Types
//!
//! Pure data structures shared by the storage seams and the schema
//! reconciler. Nothing in this crate performs I/O.

pub mod error;
pub mod lock;
pub mod retry;

pub use error::{ConfigError, DirectoryError, LockError, StoreError};
pub use lock::{LeaseInfo, LockSpec};
pub use retry::RetryPolicy;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

// ============================================================================
// TENANT IDENTITY
// ============================================================================

/// Opaque identifier of an organization.
///
/// The tenant directory is the source of truth; the reconciler never
/// interprets the contents beyond deriving a keyspace name from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TenantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// KEYSPACE CONFIGURATION
// ============================================================================

/// Replica placement strategy for a keyspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReplicationClass {
    SimpleStrategy,
}

impl ReplicationClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplicationClass::SimpleStrategy => "SimpleStrategy",
        }
    }
}

impl fmt::Display for ReplicationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Replication settings applied when a keyspace is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationConfig {
    pub class: ReplicationClass,
    pub factor: u32,
}

/// Everything the store needs to create (or open) a keyspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyspaceConfig {
    pub name: String,
    /// Whether opening a session may implicitly create the keyspace.
    pub auto_create: bool,
    pub replication: ReplicationConfig,
}

// ============================================================================
// CONSISTENCY
// ============================================================================

/// Consistency level for a session or a single statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Consistency {
    Any,
    One,
    LocalOne,
    Quorum,
    LocalQuorum,
    EachQuorum,
    All,
}

impl Consistency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Consistency::Any => "ANY",
            Consistency::One => "ONE",
            Consistency::LocalOne => "LOCAL_ONE",
            Consistency::Quorum => "QUORUM",
            Consistency::LocalQuorum => "LOCAL_QUORUM",
            Consistency::EachQuorum => "EACH_QUORUM",
            Consistency::All => "ALL",
        }
    }
}

impl fmt::Display for Consistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error when parsing an invalid consistency level string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyParseError(pub String);

impl fmt::Display for ConsistencyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid consistency level: {}", self.0)
    }
}

impl std::error::Error for ConsistencyParseError {}

impl FromStr for Consistency {
    type Err = ConsistencyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ANY" => Ok(Consistency::Any),
            "ONE" => Ok(Consistency::One),
            "LOCAL_ONE" => Ok(Consistency::LocalOne),
            "QUORUM" => Ok(Consistency::Quorum),
            "LOCAL_QUORUM" => Ok(Consistency::LocalQuorum),
            "EACH_QUORUM" => Ok(Consistency::EachQuorum),
            "ALL" => Ok(Consistency::All),
            _ => Err(ConsistencyParseError(s.to_string())),
        }
    }
}

/// Parameters for opening a session against a keyspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub keyspace: KeyspaceConfig,
    pub consistency: Consistency,
}

// ============================================================================
// SCHEMA METADATA
// ============================================================================

/// Metadata of one table as reported by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub name: String,
    pub indexes: BTreeSet<String>,
    pub gc_grace_seconds: Option<u32>,
}

/// Metadata of one keyspace as reported by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyspaceMetadata {
    pub name: String,
    pub tables: BTreeMap<String, TableMetadata>,
}

impl KeyspaceMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: BTreeMap::new(),
        }
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    /// True when every named table is present.
    pub fn has_tables(&self, tables: &[&str]) -> bool {
        tables.iter().all(|t| self.has_table(t))
    }
}

// ============================================================================
// SCHEMA STATEMENTS
// ============================================================================

/// The schema object a DDL statement targets.
///
/// Carried alongside the statement text so backends and logs can tell what
/// a statement does without parsing CQL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaObject {
    Table {
        keyspace: String,
        table: String,
    },
    TableRetention {
        keyspace: String,
        table: String,
        gc_grace_seconds: u32,
    },
    Index {
        keyspace: String,
        table: String,
        index: String,
    },
}

impl SchemaObject {
    pub fn keyspace(&self) -> &str {
        match self {
            SchemaObject::Table { keyspace, .. }
            | SchemaObject::TableRetention { keyspace, .. }
            | SchemaObject::Index { keyspace, .. } => keyspace,
        }
    }

    pub fn table(&self) -> &str {
        match self {
            SchemaObject::Table { table, .. }
            | SchemaObject::TableRetention { table, .. }
            | SchemaObject::Index { table, .. } => table,
        }
    }
}

impl fmt::Display for SchemaObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaObject::Table { keyspace, table } => write!(f, "table {keyspace}.{table}"),
            SchemaObject::TableRetention {
                keyspace,
                table,
                gc_grace_seconds,
            } => write!(f, "retention {keyspace}.{table} ({gc_grace_seconds}s)"),
            SchemaObject::Index {
                keyspace,
                table,
                index,
            } => write!(f, "index {index} on {keyspace}.{table}"),
        }
    }
}

/// A single schema-changing statement.
///
/// Statements carry no driver retry policy: a failure surfaces to the caller
/// on the first attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub cql: String,
    pub target: SchemaObject,
    pub consistency: Consistency,
}

impl Statement {
    pub fn new(cql: impl Into<String>, target: SchemaObject) -> Self {
        Self {
            cql: cql.into(),
            target,
            consistency: Consistency::All,
        }
    }

    pub fn with_consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = consistency;
        self
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cql)
    }
}

// ============================================================================
// TESTS
// ============================================================================

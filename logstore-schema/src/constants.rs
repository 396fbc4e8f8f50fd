//! Constants for the schema reconciler
//!
//! Naming, retention and scheduling values in one place.

use logstore_core::ReplicationClass;
use std::time::Duration;

// ============================================================================
// KEYSPACES
// ============================================================================

/// Keyspace holding logs that belong to no tenant.
pub const DEFAULT_KEYSPACE: &str = "spot_prod";

/// Keyspace the reconciler's long-lived session is opened against.
pub const SYSTEM_KEYSPACE: &str = "system";

/// Tenant keyspaces are named `spot_<tenant>_prod`.
pub const TENANT_KEYSPACE_PREFIX: &str = "spot_";
pub const TENANT_KEYSPACE_SUFFIX: &str = "_prod";

/// Replica placement of every keyspace the reconciler creates.
pub const REPLICATION_CLASS: ReplicationClass = ReplicationClass::SimpleStrategy;

/// Replication factor of every keyspace the reconciler creates.
pub const REPLICATION_FACTOR: u32 = 2;

// ============================================================================
// TABLES
// ============================================================================

pub const BASE_LOG_TABLE: &str = "base_log";
pub const BASE_LOG_INDEX: &str = "base_log_request_id_idx";
pub const LOG_META_TABLE: &str = "base_log_meta";
pub const LOG_META_INDEX: &str = "base_log_meta_tags_idx";

/// Tables whose presence marks a tenant keyspace as provisioned.
pub const TENANT_REQUIRED_TABLES: &[&str] = &[BASE_LOG_TABLE];

/// Tombstone retention for log tables (24 hours).
pub const GC_GRACE_SECONDS: u32 = 86_400;

// ============================================================================
// TENANT DIRECTORY
// ============================================================================

/// Page size that makes one page hold every tenant.
pub const UNBOUNDED_PAGE_SIZE: i64 = i64::MAX;

// ============================================================================
// DAEMON
// ============================================================================

/// Default reconcile interval in seconds.
pub const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 60;

/// Lower bound applied to the reconcile interval.
pub const MIN_RECONCILE_INTERVAL: Duration = Duration::from_millis(100);

/// Well-known key every instance contends on.
pub const DEFAULT_LOCK_KEY: &str = "/logs_store";

/// Default lease TTL of the election lock in seconds.
pub const DEFAULT_LOCK_TTL_SECS: u64 = 30;

/// Name reported by the reconciler's `SchemaManager` implementation.
pub const SCHEMA_MANAGER_NAME: &str = "schema with Cassandra";

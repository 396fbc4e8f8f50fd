//! Reconciler Metrics

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for reconciler activity since startup.
#[derive(Debug, Default)]
pub struct ReconcilerMetrics {
    /// Passes started, changed or not
    pub passes: AtomicU64,

    /// Passes that stopped at the snapshot comparison
    pub passes_unchanged: AtomicU64,

    /// Passes that ended in an error
    pub passes_failed: AtomicU64,

    /// Tenants whose keyspace was checked
    pub tenants_checked: AtomicU64,

    /// Keyspace metadata lookups issued
    pub metadata_lookups: AtomicU64,

    /// Keyspaces created for tenants
    pub keyspaces_created: AtomicU64,

    /// Tenant keyspaces whose tables were created
    pub tables_created: AtomicU64,

    /// DDL statements executed, bootstrap included
    pub ddl_statements: AtomicU64,

    /// Times this instance became leader
    pub leadership_terms: AtomicU64,
}

impl ReconcilerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current snapshot of all metrics.
    pub fn snapshot(&self) -> ReconcilerMetricsSnapshot {
        ReconcilerMetricsSnapshot {
            passes: self.passes.load(Ordering::Relaxed),
            passes_unchanged: self.passes_unchanged.load(Ordering::Relaxed),
            passes_failed: self.passes_failed.load(Ordering::Relaxed),
            tenants_checked: self.tenants_checked.load(Ordering::Relaxed),
            metadata_lookups: self.metadata_lookups.load(Ordering::Relaxed),
            keyspaces_created: self.keyspaces_created.load(Ordering::Relaxed),
            tables_created: self.tables_created.load(Ordering::Relaxed),
            ddl_statements: self.ddl_statements.load(Ordering::Relaxed),
            leadership_terms: self.leadership_terms.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of reconciler metrics at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcilerMetricsSnapshot {
    pub passes: u64,
    pub passes_unchanged: u64,
    pub passes_failed: u64,
    pub tenants_checked: u64,
    pub metadata_lookups: u64,
    pub keyspaces_created: u64,
    pub tables_created: u64,
    pub ddl_statements: u64,
    pub leadership_terms: u64,
}

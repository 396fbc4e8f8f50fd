//! logstore Test Utilities
//!
//! Shared test infrastructure for the logstore workspace:
//! - Proptest generators for tenant names and lists
//! - A harness wiring a reconciler to in-memory collaborators
//! - A directory wrapper that observes overlapping passes
//! - Assertions over the in-memory store

pub use logstore_core::{DirectoryError, LockError, StoreError, TenantId};
pub use logstore_storage::{
    MemoryLockProvider, MemorySchemaStore, MemoryTenantDirectory, StoreCall, TenantDirectory,
    TenantPage,
};

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// CONCURRENCY PROBE
// ============================================================================

#[derive(Debug, Default)]
struct ProbeState {
    in_flight: AtomicU64,
    max_in_flight: AtomicU64,
}

struct InFlight<'a>(&'a ProbeState);

impl<'a> InFlight<'a> {
    fn enter(state: &'a ProbeState) -> Self {
        let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(state)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// [`TenantDirectory`] wrapper that records how many listings overlap.
///
/// Instances made with [`instance`](Self::instance) share the overlap
/// counters but count their own calls, so several simulated service
/// instances can be compared.
#[derive(Clone)]
pub struct ConcurrencyProbe {
    inner: Arc<dyn TenantDirectory>,
    state: Arc<ProbeState>,
    calls: Arc<AtomicU64>,
    hold: Duration,
}

impl ConcurrencyProbe {
    pub fn new(inner: Arc<dyn TenantDirectory>) -> Self {
        Self {
            inner,
            state: Arc::new(ProbeState::default()),
            calls: Arc::new(AtomicU64::new(0)),
            hold: Duration::ZERO,
        }
    }

    /// Keep each listing in flight for `hold` before delegating.
    pub fn with_hold(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    /// Another probe over the same directory and overlap counters.
    pub fn instance(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            state: Arc::clone(&self.state),
            calls: Arc::new(AtomicU64::new(0)),
            hold: self.hold,
        }
    }

    /// Listings served by this instance.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Largest number of listings ever in flight at once across instances.
    pub fn max_in_flight(&self) -> u64 {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TenantDirectory for ConcurrencyProbe {
    async fn list_tenants(
        &self,
        page_no: u64,
        page_size: i64,
    ) -> Result<TenantPage, DirectoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _in_flight = InFlight::enter(&self.state);
        if !self.hold.is_zero() {
            tokio::time::sleep(self.hold).await;
        }
        self.inner.list_tenants(page_no, page_size).await
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    use super::*;
    use proptest::prelude::*;

    /// Tenant names whose keyspace names never collide with each other.
    pub fn arb_tenant_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9-]{0,11}"
    }

    /// Distinct tenants in arbitrary order.
    pub fn arb_tenant_list(max: usize) -> impl Strategy<Value = Vec<TenantId>> {
        prop::collection::btree_set(arb_tenant_name(), 0..=max)
            .prop_map(|names| names.into_iter().map(TenantId::new).collect::<Vec<_>>())
            .prop_shuffle()
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    use super::*;
    use logstore_schema::{ReconcileError, ReconcilerConfig, SchemaReconciler};
    use logstore_storage::LockProvider;

    pub fn tenants(names: &[&str]) -> Vec<TenantId> {
        names.iter().map(|n| TenantId::from(*n)).collect()
    }

    /// In-memory store, directory and lock service for one simulated cluster.
    #[derive(Clone, Default)]
    pub struct Harness {
        pub store: MemorySchemaStore,
        pub directory: MemoryTenantDirectory,
        pub locks: MemoryLockProvider,
    }

    impl Harness {
        pub fn new(names: &[&str]) -> Self {
            Self {
                store: MemorySchemaStore::new(),
                directory: MemoryTenantDirectory::new(tenants(names)),
                locks: MemoryLockProvider::new(),
            }
        }

        pub fn set_tenants(&self, names: &[&str]) {
            self.directory.set_tenants(tenants(names));
        }

        pub fn locks(&self) -> Arc<dyn LockProvider> {
            Arc::new(self.locks.clone())
        }

        pub async fn reconciler(
            &self,
            config: ReconcilerConfig,
        ) -> Result<SchemaReconciler, ReconcileError> {
            self.reconciler_with(Arc::new(self.directory.clone()), config)
                .await
        }

        /// Reconciler over the shared store but a caller-supplied directory.
        pub async fn reconciler_with(
            &self,
            directory: Arc<dyn TenantDirectory>,
            config: ReconcilerConfig,
        ) -> Result<SchemaReconciler, ReconcileError> {
            SchemaReconciler::new(Arc::new(self.store.clone()), directory, config).await
        }
    }

    /// Config with a one-second interval for paused-time daemon tests.
    pub fn fast_config() -> ReconcilerConfig {
        ReconcilerConfig {
            interval: Duration::from_secs(1),
            ..ReconcilerConfig::default()
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    use super::*;
    use logstore_schema::constants::{
        BASE_LOG_INDEX, BASE_LOG_TABLE, DEFAULT_KEYSPACE, GC_GRACE_SECONDS, LOG_META_INDEX,
        LOG_META_TABLE,
    };
    use logstore_schema::keyspace_for_tenant;

    /// Assert the tenant's keyspace has its table, retention and index.
    pub fn assert_tenant_provisioned(store: &MemorySchemaStore, tenant: &str) {
        let keyspace = keyspace_for_tenant(&TenantId::from(tenant));
        let meta = store
            .metadata(&keyspace)
            .unwrap_or_else(|| panic!("keyspace {keyspace} missing for tenant {tenant}"));
        let table = meta
            .tables
            .get(BASE_LOG_TABLE)
            .unwrap_or_else(|| panic!("{keyspace}.{BASE_LOG_TABLE} missing"));
        assert_eq!(table.gc_grace_seconds, Some(GC_GRACE_SECONDS));
        assert!(
            table.indexes.contains(BASE_LOG_INDEX),
            "{BASE_LOG_INDEX} missing on {keyspace}"
        );
    }

    /// Assert no keyspace exists for the tenant.
    pub fn assert_tenant_missing(store: &MemorySchemaStore, tenant: &str) {
        let keyspace = keyspace_for_tenant(&TenantId::from(tenant));
        assert!(
            !store.keyspace_exists(&keyspace),
            "expected {keyspace} to be absent"
        );
    }

    /// Assert the default keyspace holds every object bootstrap creates.
    pub fn assert_default_schema(store: &MemorySchemaStore) {
        let meta = store
            .metadata(DEFAULT_KEYSPACE)
            .unwrap_or_else(|| panic!("default keyspace {DEFAULT_KEYSPACE} missing"));
        assert!(meta.has_tables(&[BASE_LOG_TABLE, LOG_META_TABLE]));
        assert!(meta.tables[BASE_LOG_TABLE].indexes.contains(BASE_LOG_INDEX));
        assert!(meta.tables[LOG_META_TABLE].indexes.contains(LOG_META_INDEX));
        assert_eq!(
            meta.tables[BASE_LOG_TABLE].gc_grace_seconds,
            Some(GC_GRACE_SECONDS)
        );
    }

    /// DDL calls (keyspace creation and statements) issued for a tenant.
    pub fn tenant_ddl(store: &MemorySchemaStore, tenant: &str) -> Vec<StoreCall> {
        store.ddl_calls_for(&keyspace_for_tenant(&TenantId::from(tenant)))
    }
}

#[cfg(test)]
mod tests {
    use super::generators::*;
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    proptest! {
        #[test]
        fn prop_tenant_lists_have_distinct_keyspaces(list in arb_tenant_list(8)) {
            let keyspaces: HashSet<String> =
                list.iter().map(logstore_schema::keyspace_for_tenant).collect();
            prop_assert_eq!(keyspaces.len(), list.len());
        }
    }

    #[tokio::test]
    async fn test_probe_counts_per_instance() {
        let directory = MemoryTenantDirectory::new(fixtures::tenants(&["a"]));
        let first = ConcurrencyProbe::new(Arc::new(directory));
        let second = first.instance();

        first.list_tenants(1, 10).await.unwrap();
        first.list_tenants(1, 10).await.unwrap();
        second.list_tenants(1, 10).await.unwrap();

        assert_eq!(first.calls(), 2);
        assert_eq!(second.calls(), 1);
        assert_eq!(first.max_in_flight(), 1);
    }
}

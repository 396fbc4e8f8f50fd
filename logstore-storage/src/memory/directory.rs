//! In-memory tenant directory.

use crate::directory::{TenantDirectory, TenantPage};
use async_trait::async_trait;
use logstore_core::{DirectoryError, TenantId};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Default)]
struct DirectoryState {
    tenants: Vec<TenantId>,
    failure: Option<DirectoryError>,
    latency: Duration,
    calls: u64,
}

/// In-memory [`TenantDirectory`] serving a mutable tenant list in order.
#[derive(Debug, Clone, Default)]
pub struct MemoryTenantDirectory {
    state: Arc<Mutex<DirectoryState>>,
}

impl MemoryTenantDirectory {
    pub fn new<I, T>(tenants: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TenantId>,
    {
        let directory = Self::default();
        directory.set_tenants(tenants);
        directory
    }

    fn inspect(&self) -> MutexGuard<'_, DirectoryState> {
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }

    /// Replace the tenant list, keeping the given order.
    pub fn set_tenants<I, T>(&self, tenants: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<TenantId>,
    {
        self.inspect().tenants = tenants.into_iter().map(Into::into).collect();
    }

    pub fn tenants(&self) -> Vec<TenantId> {
        self.inspect().tenants.clone()
    }

    /// Fail every listing with `error` until [`clear_failure`](Self::clear_failure).
    pub fn fail_with(&self, error: DirectoryError) {
        self.inspect().failure = Some(error);
    }

    pub fn clear_failure(&self) {
        self.inspect().failure = None;
    }

    /// Simulated round-trip time for each listing.
    pub fn set_latency(&self, latency: Duration) {
        self.inspect().latency = latency;
    }

    /// Number of `list_tenants` calls served, failed ones included.
    pub fn calls(&self) -> u64 {
        self.inspect().calls
    }
}

#[async_trait]
impl TenantDirectory for MemoryTenantDirectory {
    async fn list_tenants(
        &self,
        page_no: u64,
        page_size: i64,
    ) -> Result<TenantPage, DirectoryError> {
        if page_no == 0 || page_size <= 0 {
            return Err(DirectoryError::InvalidPage { page_no, page_size });
        }

        let latency = {
            let mut state = self.state.lock().map_err(|_| DirectoryError::LockPoisoned)?;
            state.calls += 1;
            state.latency
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let state = self.state.lock().map_err(|_| DirectoryError::LockPoisoned)?;
        if let Some(err) = &state.failure {
            return Err(err.clone());
        }

        let size = usize::try_from(page_size).unwrap_or(usize::MAX);
        let offset = usize::try_from(page_no - 1)
            .unwrap_or(usize::MAX)
            .saturating_mul(size);
        let tenants = state
            .tenants
            .iter()
            .skip(offset)
            .take(size)
            .cloned()
            .collect();

        Ok(TenantPage {
            total: state.tenants.len() as u64,
            tenants,
        })
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;
    use tokio::runtime::Runtime;

    fn test_runtime() -> Result<Runtime, TestCaseError> {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
    }

    fn arb_names() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-z][a-z0-9-]{0,7}", 0..24)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// One unbounded page returns the whole list in its stored order.
        #[test]
        fn prop_unbounded_page_is_whole_list(names in arb_names()) {
            let rt = test_runtime()?;
            let directory = MemoryTenantDirectory::new(names.clone());
            let page = rt
                .block_on(directory.list_tenants(1, i64::MAX))
                .map_err(|e| TestCaseError::fail(e.to_string()))?;

            let expected: Vec<TenantId> = names.into_iter().map(TenantId::from).collect();
            prop_assert_eq!(page.total, expected.len() as u64);
            prop_assert_eq!(page.tenants, expected);
        }

        /// Walking pages of any size visits every tenant once, in order.
        #[test]
        fn prop_pages_concatenate_to_whole_list(names in arb_names(), size in 1i64..8) {
            let rt = test_runtime()?;
            let directory = MemoryTenantDirectory::new(names.clone());

            let mut seen = Vec::new();
            let mut page_no = 1;
            loop {
                let page = rt
                    .block_on(directory.list_tenants(page_no, size))
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;
                prop_assert_eq!(page.total, names.len() as u64);
                prop_assert!(page.tenants.len() <= size as usize);
                if page.tenants.is_empty() {
                    break;
                }
                seen.extend(page.tenants);
                page_no += 1;
            }

            let expected: Vec<TenantId> = names.into_iter().map(TenantId::from).collect();
            prop_assert_eq!(seen, expected);
        }
    }
}

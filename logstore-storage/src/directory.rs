//! Tenant directory seam.

use async_trait::async_trait;
use logstore_core::{DirectoryError, TenantId};

/// One page of tenants, in directory order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantPage {
    /// Total number of tenants known to the directory.
    pub total: u64,
    pub tenants: Vec<TenantId>,
}

/// Source of truth for active tenants.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// List tenants. `page_no` is 1-based.
    async fn list_tenants(&self, page_no: u64, page_size: i64)
        -> Result<TenantPage, DirectoryError>;
}

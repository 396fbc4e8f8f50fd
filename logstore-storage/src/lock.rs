//! Cluster-wide named lock seam.
//!
//! ```text
//! new_handle() ──→ Handle ─── lock() ──→ Held ─── unlock() ──→ Handle ─── close()
//!                                         │  ▲
//!                                         └──┘ keep_alive()
//! ```
//!
//! At most one handle across the fleet is `Held` for a given key. A held
//! lock lives on a lease of `LockSpec::lease_ttl`; a holder that stops
//! renewing loses it once the lease runs out.

use async_trait::async_trait;
use logstore_core::{LeaseInfo, LockError, LockSpec};

/// Creates handles onto named locks.
#[async_trait]
pub trait LockProvider: Send + Sync {
    async fn new_handle(&self, spec: &LockSpec) -> Result<Box<dyn LockHandle>, LockError>;
}

/// Ownership token for one named lock.
///
/// Callers race `lock()` against their own shutdown signal; dropping the
/// `lock()` future abandons the wait without acquiring.
#[async_trait]
pub trait LockHandle: Send + Sync {
    fn spec(&self) -> &LockSpec;

    /// Block until the lock is held.
    async fn lock(&self) -> Result<LeaseInfo, LockError>;

    /// Renew the held lease for another `lease_ttl`.
    ///
    /// Fails with [`LockError::LeaseExpired`] once the lease ran out and with
    /// [`LockError::NotHeld`] when another handle holds the key.
    async fn keep_alive(&self) -> Result<LeaseInfo, LockError>;

    async fn unlock(&self) -> Result<(), LockError>;

    /// Release backend resources (sessions, leases). Further calls fail with
    /// [`LockError::Closed`].
    async fn close(&self) -> Result<(), LockError>;
}

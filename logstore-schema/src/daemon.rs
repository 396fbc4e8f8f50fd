//! Leader-elected daemon around the reconciler.
//!
//! ```text
//! Idle ──→ AcquiringLock ──→ Leader (passes every tick) ──→ ShuttingDown ──→ Idle
//!               │                    │
//!               └──→ Failed (exit)   └──→ LeaseLost (exit)
//! ```
//!
//! Only the holder of the election lock runs passes. The lock is held for
//! the whole leadership term and released (unlock, then close) on every
//! exit path after it was acquired. While leader the daemon renews its lease
//! every third of the lease TTL, also while a pass is running. Shutdown is
//! cooperative: it is observed while waiting for the lock and between
//! passes, never in the middle of one.

use crate::constants::{MIN_RECONCILE_INTERVAL, SCHEMA_MANAGER_NAME};
use crate::error::ReconcileError;
use crate::metrics::ReconcilerMetrics;
use crate::reconciler::{PassOutcome, SchemaReconciler};
use crate::retry::run_with_retry;
use async_trait::async_trait;
use logstore_core::{LockError, LockSpec, RetryPolicy};
use logstore_storage::{LockHandle, LockProvider};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, interval_at, Instant, Interval, MissedTickBehavior};

/// Why [`SchemaManager::run_daemon`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DaemonExit {
    /// Shutdown was requested while leader.
    Shutdown,
    /// The election lock could not be obtained for a reason other than
    /// shutdown. Restarting the daemon is up to the host.
    LockUnavailable,
    /// Shutdown was requested before leadership was acquired.
    Cancelled,
    /// The lease could not be renewed; another instance may be leader now.
    LeadershipLost,
}

/// A schema maintainer the host service runs in the background.
#[async_trait]
pub trait SchemaManager: Send {
    fn name(&self) -> &'static str;

    /// Contend for leadership and, once leader, reconcile every `interval`
    /// (the configured interval when `None`) until `shutdown` turns true.
    /// A closed shutdown channel counts as shutdown.
    async fn run_daemon(
        self,
        interval: Option<Duration>,
        locks: Arc<dyn LockProvider>,
        shutdown: watch::Receiver<bool>,
    ) -> DaemonExit;
}

#[async_trait]
impl SchemaManager for SchemaReconciler {
    fn name(&self) -> &'static str {
        SCHEMA_MANAGER_NAME
    }

    async fn run_daemon(
        mut self,
        interval: Option<Duration>,
        locks: Arc<dyn LockProvider>,
        mut shutdown: watch::Receiver<bool>,
    ) -> DaemonExit {
        let interval = effective_interval(interval.unwrap_or(self.config().interval));
        let spec = self.config().lock.clone();
        let lock_retry = self.config().lock_retry.clone();

        tracing::info!(
            name = self.name(),
            interval_ms = interval.as_millis() as u64,
            lock = %spec,
            "Schema daemon started"
        );

        let handle =
            match acquire_leadership(locks.as_ref(), &spec, &lock_retry, &mut shutdown).await {
                Ok(handle) => handle,
                Err(exit) => return exit,
            };
        ReconcilerMetrics::incr(&self.metrics().leadership_terms);

        let exit = reconcile_loop(&mut self, handle.as_ref(), interval, &mut shutdown).await;
        release_leadership(handle.as_ref()).await;

        let snapshot = self.metrics().snapshot();
        tracing::info!(
            passes = snapshot.passes,
            passes_unchanged = snapshot.passes_unchanged,
            passes_failed = snapshot.passes_failed,
            keyspaces_created = snapshot.keyspaces_created,
            tables_created = snapshot.tables_created,
            "Schema daemon stopped"
        );
        exit
    }
}

fn effective_interval(requested: Duration) -> Duration {
    if requested < MIN_RECONCILE_INTERVAL {
        tracing::warn!(
            requested_ms = requested.as_millis() as u64,
            min_ms = MIN_RECONCILE_INTERVAL.as_millis() as u64,
            "Reconcile interval too small, clamping"
        );
        MIN_RECONCILE_INTERVAL
    } else {
        requested
    }
}

/// True once shutdown was signalled or the sender is gone.
pub fn shutdown_requested(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow() || shutdown.has_changed().is_err()
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

async fn acquire_leadership(
    locks: &dyn LockProvider,
    spec: &LockSpec,
    retry: &RetryPolicy,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<Box<dyn LockHandle>, DaemonExit> {
    if shutdown_requested(shutdown) {
        return Err(DaemonExit::Cancelled);
    }

    let created = tokio::select! {
        biased;
        _ = wait_for_shutdown(shutdown) => Err(LockError::Cancelled),
        result = locks.new_handle(spec) => result,
    };
    let handle = match created {
        Ok(handle) => handle,
        Err(e) if e.is_cancelled() => return Err(DaemonExit::Cancelled),
        Err(e) => {
            tracing::error!(key = %spec.key, error = %e, "Failed to create election lock handle");
            return Err(DaemonExit::LockUnavailable);
        }
    };

    let locked = {
        let lock_handle = handle.as_ref();
        tokio::select! {
            biased;
            _ = wait_for_shutdown(shutdown) => Err(LockError::Cancelled),
            result = run_with_retry(
                retry,
                "acquire_lock",
                |e: &LockError| !e.is_cancelled(),
                move || lock_handle.lock(),
            ) => result,
        }
    };

    match locked {
        Ok(lease) => {
            tracing::info!(
                key = %lease.key,
                holder = %lease.holder_id,
                expires_at = %lease.expires_at,
                "Schema leadership acquired"
            );
            Ok(handle)
        }
        Err(e) => {
            let exit = if e.is_cancelled() {
                tracing::info!(key = %spec.key, "Shutdown while waiting for schema leadership");
                DaemonExit::Cancelled
            } else {
                tracing::error!(key = %spec.key, error = %e, "Failed to acquire election lock");
                DaemonExit::LockUnavailable
            };
            if let Err(e) = handle.close().await {
                tracing::warn!(key = %spec.key, error = %e, "Failed to close election lock handle");
            }
            Err(exit)
        }
    }
}

/// Lease renewal period for a lease of `ttl`.
fn renew_period(ttl: Duration) -> Duration {
    (ttl / 3).max(Duration::from_millis(1))
}

async fn renew_lease(handle: &dyn LockHandle) -> Result<(), LockError> {
    let lease = handle.keep_alive().await?;
    tracing::trace!(key = %lease.key, expires_at = %lease.expires_at, "Schema lease renewed");
    Ok(())
}

/// Run one pass to completion, renewing the lease meanwhile. Returns the
/// pass result and the renewal error, if the lease was lost during it.
async fn pass_with_renewal(
    reconciler: &mut SchemaReconciler,
    handle: &dyn LockHandle,
    renew: &mut Interval,
) -> (Result<PassOutcome, ReconcileError>, Option<LockError>) {
    let mut lost = None;
    let pass = reconciler.reconcile_once();
    tokio::pin!(pass);

    loop {
        tokio::select! {
            biased;
            result = &mut pass => return (result, lost),
            _ = renew.tick(), if lost.is_none() => {
                if let Err(e) = renew_lease(handle).await {
                    lost = Some(e);
                }
            }
        }
    }
}

enum Wake {
    Tick,
    Shutdown,
    LeaseLost(LockError),
}

/// Wait for the next tick, renewing the lease meanwhile.
async fn idle_until_tick(
    ticker: &mut Interval,
    renew: &mut Interval,
    handle: &dyn LockHandle,
    shutdown: &mut watch::Receiver<bool>,
) -> Wake {
    loop {
        tokio::select! {
            biased;
            _ = wait_for_shutdown(shutdown) => return Wake::Shutdown,
            _ = ticker.tick() => return Wake::Tick,
            _ = renew.tick() => {
                if let Err(e) = renew_lease(handle).await {
                    return Wake::LeaseLost(e);
                }
            }
        }
    }
}

async fn reconcile_loop(
    reconciler: &mut SchemaReconciler,
    handle: &dyn LockHandle,
    period: Duration,
    shutdown: &mut watch::Receiver<bool>,
) -> DaemonExit {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; the first pass runs right away.
    ticker.tick().await;

    let renew_every = renew_period(handle.spec().lease_ttl);
    let mut renew = interval_at(Instant::now() + renew_every, renew_every);
    renew.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let lost = loop {
        if shutdown_requested(shutdown) {
            break None;
        }

        let (result, lost) = pass_with_renewal(reconciler, handle, &mut renew).await;
        if let Err(e) = result {
            tracing::error!(error = %e, "Reconcile pass failed");
        }
        if lost.is_some() {
            break lost;
        }

        match idle_until_tick(&mut ticker, &mut renew, handle, shutdown).await {
            Wake::Tick => {}
            Wake::Shutdown => break None,
            Wake::LeaseLost(e) => break Some(e),
        }
    };

    match lost {
        Some(e) => {
            tracing::error!(key = %handle.spec().key, error = %e, "Schema leadership lost");
            DaemonExit::LeadershipLost
        }
        None => {
            tracing::info!("Schema daemon shutting down");
            DaemonExit::Shutdown
        }
    }
}

async fn release_leadership(handle: &dyn LockHandle) {
    let key = &handle.spec().key;
    if let Err(e) = handle.unlock().await {
        tracing::warn!(key = %key, error = %e, "Failed to unlock election lock");
    }
    if let Err(e) = handle.close().await {
        tracing::warn!(key = %key, error = %e, "Failed to close election lock handle");
    }
}

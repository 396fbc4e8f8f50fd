//! In-process named locks on leases.
//!
//! Every handle created from the same provider (or a clone of it) contends
//! on the same lease table, which makes the provider usable as a single-node
//! election backend and as a multi-instance simulation in tests. A lease
//! that is not renewed within its TTL can be taken over by a waiting handle.

use crate::lock::{LockHandle, LockProvider};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use logstore_core::{LeaseInfo, LockError, LockSpec, Timestamp};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use uuid::Uuid;

/// Wall-clock timestamps that advance with tokio's clock, so leases also
/// expire under paused test time.
#[derive(Debug, Clone, Copy)]
struct LeaseClock {
    wall: Timestamp,
    started: Instant,
}

impl LeaseClock {
    fn start() -> Self {
        Self {
            wall: Utc::now(),
            started: Instant::now(),
        }
    }

    fn now(&self) -> Timestamp {
        chrono::Duration::from_std(self.started.elapsed())
            .ok()
            .and_then(|elapsed| self.wall.checked_add_signed(elapsed))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[derive(Debug, Default)]
struct LockTable {
    leases: HashMap<String, LeaseInfo>,
    handle_failure: Option<LockError>,
    lock_failure: Option<LockError>,
    acquisitions: u64,
    releases: u64,
    takeovers: u64,
}

/// In-memory [`LockProvider`].
#[derive(Debug, Clone)]
pub struct MemoryLockProvider {
    table: Arc<Mutex<LockTable>>,
    released: Arc<Notify>,
    clock: LeaseClock,
}

impl Default for MemoryLockProvider {
    fn default() -> Self {
        Self {
            table: Arc::new(Mutex::new(LockTable::default())),
            released: Arc::new(Notify::new()),
            clock: LeaseClock::start(),
        }
    }
}

impl MemoryLockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn inspect(&self) -> MutexGuard<'_, LockTable> {
        self.table.lock().unwrap_or_else(|err| err.into_inner())
    }

    /// Current unexpired lease on `key`, if any.
    pub fn holder(&self, key: &str) -> Option<LeaseInfo> {
        let now = self.clock.now();
        self.inspect()
            .leases
            .get(key)
            .filter(|lease| !lease.is_expired(now))
            .cloned()
    }

    pub fn acquisitions(&self) -> u64 {
        self.inspect().acquisitions
    }

    pub fn releases(&self) -> u64 {
        self.inspect().releases
    }

    /// Acquisitions that replaced an expired lease of another holder.
    pub fn takeovers(&self) -> u64 {
        self.inspect().takeovers
    }

    /// Drop the lease on `key` as if the backend revoked it.
    pub fn revoke(&self, key: &str) -> Option<LeaseInfo> {
        let revoked = self.inspect().leases.remove(key);
        if revoked.is_some() {
            self.released.notify_waiters();
        }
        revoked
    }

    /// Make `new_handle` fail with `error`.
    pub fn fail_new_handle(&self, error: LockError) {
        self.inspect().handle_failure = Some(error);
    }

    /// Make `lock` fail with `error` on every handle.
    pub fn fail_lock(&self, error: LockError) {
        self.inspect().lock_failure = Some(error);
    }

    pub fn clear_failures(&self) {
        let mut table = self.inspect();
        table.handle_failure = None;
        table.lock_failure = None;
    }
}

#[async_trait]
impl LockProvider for MemoryLockProvider {
    async fn new_handle(&self, spec: &LockSpec) -> Result<Box<dyn LockHandle>, LockError> {
        let table = self.table.lock().map_err(|_| LockError::Poisoned)?;
        if let Some(err) = &table.handle_failure {
            return Err(err.clone());
        }

        Ok(Box::new(MemoryLockHandle {
            spec: spec.clone(),
            holder_id: Uuid::now_v7(),
            closed: AtomicBool::new(false),
            table: Arc::clone(&self.table),
            released: Arc::clone(&self.released),
            clock: self.clock,
        }))
    }
}

/// Handle onto one key of a [`MemoryLockProvider`].
pub struct MemoryLockHandle {
    spec: LockSpec,
    holder_id: Uuid,
    closed: AtomicBool,
    table: Arc<Mutex<LockTable>>,
    released: Arc<Notify>,
    clock: LeaseClock,
}

impl MemoryLockHandle {
    fn ensure_open(&self) -> Result<(), LockError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(LockError::Closed {
                key: self.spec.key.clone(),
            });
        }
        Ok(())
    }

    fn table(&self) -> Result<MutexGuard<'_, LockTable>, LockError> {
        self.table.lock().map_err(|_| LockError::Poisoned)
    }

    fn not_held(&self) -> LockError {
        LockError::NotHeld {
            key: self.spec.key.clone(),
        }
    }

    /// Take the lease if it is free or expired, otherwise report how long
    /// the current holder keeps it.
    fn try_acquire(&self) -> Result<Result<LeaseInfo, Duration>, LockError> {
        let mut table = self.table()?;
        if let Some(err) = &table.lock_failure {
            return Err(err.clone());
        }

        let now = self.clock.now();
        match table.leases.get(&self.spec.key).cloned() {
            Some(lease) if !lease.is_expired(now) => {
                if lease.holder_id == self.holder_id {
                    return Ok(Ok(lease));
                }
                return Ok(Err(lease.remaining(now).unwrap_or(Duration::ZERO)));
            }
            Some(expired) => {
                tracing::warn!(
                    key = %self.spec.key,
                    previous = %expired.holder_id,
                    expired_at = %expired.expires_at,
                    "Taking over expired lease"
                );
                if expired.holder_id != self.holder_id {
                    table.takeovers += 1;
                }
            }
            None => {}
        }

        let lease = LeaseInfo::grant(&self.spec, self.holder_id, now);
        table.leases.insert(self.spec.key.clone(), lease.clone());
        table.acquisitions += 1;
        tracing::debug!(key = %self.spec.key, holder = %self.holder_id, "Memory lock acquired");
        Ok(Ok(lease))
    }

    /// Drop our lease, expired or not. Returns whether we had one.
    fn release(&self) -> Result<bool, LockError> {
        let mut table = self.table()?;
        let ours = table
            .leases
            .get(&self.spec.key)
            .is_some_and(|lease| lease.holder_id == self.holder_id);
        if ours {
            table.leases.remove(&self.spec.key);
            table.releases += 1;
        }
        drop(table);

        if ours {
            self.released.notify_waiters();
        }
        Ok(ours)
    }
}

#[async_trait]
impl LockHandle for MemoryLockHandle {
    fn spec(&self) -> &LockSpec {
        &self.spec
    }

    async fn lock(&self) -> Result<LeaseInfo, LockError> {
        loop {
            self.ensure_open()?;

            let released = self.released.notified();
            tokio::pin!(released);
            released.as_mut().enable();

            match self.try_acquire()? {
                Ok(lease) => return Ok(lease),
                Err(remaining) => {
                    tokio::select! {
                        _ = released => {}
                        _ = tokio::time::sleep(remaining) => {}
                    }
                }
            }
        }
    }

    async fn keep_alive(&self) -> Result<LeaseInfo, LockError> {
        self.ensure_open()?;
        let mut table = self.table()?;
        let now = self.clock.now();

        let lease = match table.leases.get_mut(&self.spec.key) {
            Some(lease) if lease.holder_id == self.holder_id => lease,
            _ => return Err(self.not_held()),
        };
        if lease.is_expired(now) {
            return Err(LockError::LeaseExpired {
                key: self.spec.key.clone(),
            });
        }
        lease.renew(now, self.spec.lease_ttl);
        Ok(lease.clone())
    }

    async fn unlock(&self) -> Result<(), LockError> {
        self.ensure_open()?;
        if self.release()? {
            Ok(())
        } else {
            Err(self.not_held())
        }
    }

    async fn close(&self) -> Result<(), LockError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.release()?;
        // Wake our own pending lock() so it observes the close.
        self.released.notify_waiters();
        Ok(())
    }
}

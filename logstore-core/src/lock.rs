//! Named-lock descriptors for leader election.
//!
//! A [`LockSpec`] names the cluster-wide mutex and the lease it is held
//! under; a [`LeaseInfo`] describes a successful acquisition. The election
//! backend itself (etcd, consensus, in-memory) lives behind the
//! `LockProvider` seam in `logstore-storage`.

use crate::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Key and lease parameters of a cluster-wide lock.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockSpec {
    pub key: String,
    /// How long the backend keeps the lock alive without renewal from the
    /// holder. Backends without leases ignore it.
    pub lease_ttl: Duration,
}

impl LockSpec {
    pub fn new(key: impl Into<String>, lease_ttl: Duration) -> Self {
        Self {
            key: key.into(),
            lease_ttl,
        }
    }
}

impl fmt::Display for LockSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (lease {}s)", self.key, self.lease_ttl.as_secs())
    }
}

/// A granted lease on a named lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseInfo {
    pub key: String,
    pub holder_id: Uuid,
    pub acquired_at: Timestamp,
    pub expires_at: Timestamp,
}

impl LeaseInfo {
    /// Grant a lease starting at `now`.
    pub fn grant(spec: &LockSpec, holder_id: Uuid, now: Timestamp) -> Self {
        Self {
            key: spec.key.clone(),
            holder_id,
            acquired_at: now,
            expires_at: now + chrono_duration(spec.lease_ttl),
        }
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    /// Remaining lease time, or `None` once expired.
    pub fn remaining(&self, now: Timestamp) -> Option<Duration> {
        if now >= self.expires_at {
            None
        } else {
            (self.expires_at - now).to_std().ok()
        }
    }

    /// Extend the lease to `now + ttl`.
    pub fn renew(&mut self, now: Timestamp, ttl: Duration) {
        self.expires_at = now + chrono_duration(ttl);
    }
}

fn chrono_duration(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d)
        .unwrap_or_else(|_| chrono::Duration::milliseconds(d.as_millis() as i64))
}

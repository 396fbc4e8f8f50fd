//! Reconciler Configuration
//!
//! ```rust
//! use logstore_schema::{ChangeDetection, ReconcilerConfig, SnapshotCommit};
//! use logstore_core::{LockSpec, RetryPolicy};
//! use std::time::Duration;
//!
//! let config = ReconcilerConfig {
//!     interval: Duration::from_secs(60),
//!     lock: LockSpec::new("/logs_store", Duration::from_secs(30)),
//!     lock_retry: RetryPolicy::exponential(3),
//!     ddl_retry: RetryPolicy::none(),
//!     change_detection: ChangeDetection::Positional,
//!     snapshot_commit: SnapshotCommit::Eager,
//! };
//! assert!(config.validate().is_ok());
//! ```

use crate::constants::{
    DEFAULT_LOCK_KEY, DEFAULT_LOCK_TTL_SECS, DEFAULT_RECONCILE_INTERVAL_SECS,
};
use crate::snapshot::ChangeDetection;
use logstore_core::{ConfigError, LockSpec, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// When a pass records the fetched tenant list as the new snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnapshotCommit {
    /// Before any tenant is provisioned. A pass that fails part-way leaves
    /// the remaining tenants unprovisioned until the list changes again.
    #[default]
    Eager,
    /// Only after every tenant in the pass was verified or provisioned. A
    /// failed pass is retried on the next tick.
    AfterSuccess,
}

impl SnapshotCommit {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotCommit::Eager => "eager",
            SnapshotCommit::AfterSuccess => "after_success",
        }
    }
}

impl fmt::Display for SnapshotCommit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SnapshotCommit {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "eager" => Ok(SnapshotCommit::Eager),
            "after_success" => Ok(SnapshotCommit::AfterSuccess),
            _ => Err(ConfigError::InvalidValue {
                field: "snapshot_commit".to_string(),
                value: s.to_string(),
                reason: "expected 'eager' or 'after_success'".to_string(),
            }),
        }
    }
}

/// Configuration for the schema reconciler and its daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Time between reconcile passes while leader (default: 60 seconds)
    pub interval: Duration,

    /// Election lock key and lease
    pub lock: LockSpec,

    /// Retries around acquiring the election lock (default: none)
    pub lock_retry: RetryPolicy,

    /// Retries around each keyspace creation and DDL statement (default: none)
    pub ddl_retry: RetryPolicy,

    /// How a fetched tenant list is compared with the snapshot
    pub change_detection: ChangeDetection,

    /// When the snapshot is replaced during a pass
    pub snapshot_commit: SnapshotCommit,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_RECONCILE_INTERVAL_SECS),
            lock: LockSpec::new(DEFAULT_LOCK_KEY, Duration::from_secs(DEFAULT_LOCK_TTL_SECS)),
            lock_retry: RetryPolicy::none(),
            ddl_retry: RetryPolicy::none(),
            change_detection: ChangeDetection::default(),
            snapshot_commit: SnapshotCommit::default(),
        }
    }
}

impl ReconcilerConfig {
    /// Create ReconcilerConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `LOGSTORE_SCHEMA_INTERVAL_SECS`: Seconds between passes (default: 60)
    /// - `LOGSTORE_SCHEMA_LOCK_KEY`: Election lock key (default: `/logs_store`)
    /// - `LOGSTORE_SCHEMA_LOCK_TTL_SECS`: Election lease TTL (default: 30)
    /// - `LOGSTORE_SCHEMA_LOCK_RETRIES`: Retries when acquiring the lock (default: 0)
    /// - `LOGSTORE_SCHEMA_DDL_RETRIES`: Retries per DDL statement (default: 0)
    /// - `LOGSTORE_SCHEMA_CHANGE_DETECTION`: `positional` or `set` (default: positional)
    /// - `LOGSTORE_SCHEMA_SNAPSHOT_COMMIT`: `eager` or `after_success` (default: eager)
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let interval = Duration::from_secs(
            std::env::var("LOGSTORE_SCHEMA_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_RECONCILE_INTERVAL_SECS),
        );

        let lock_key = std::env::var("LOGSTORE_SCHEMA_LOCK_KEY")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOCK_KEY.to_string());

        let lock_ttl = Duration::from_secs(
            std::env::var("LOGSTORE_SCHEMA_LOCK_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_LOCK_TTL_SECS),
        );

        let lock_retry = std::env::var("LOGSTORE_SCHEMA_LOCK_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .map(retry_policy)
            .unwrap_or_default();

        let ddl_retry = std::env::var("LOGSTORE_SCHEMA_DDL_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .map(retry_policy)
            .unwrap_or_default();

        let change_detection = std::env::var("LOGSTORE_SCHEMA_CHANGE_DETECTION")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();

        let snapshot_commit = std::env::var("LOGSTORE_SCHEMA_SNAPSHOT_COMMIT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();

        Self {
            interval,
            lock: LockSpec::new(lock_key, lock_ttl),
            lock_retry,
            ddl_retry,
            change_detection,
            snapshot_commit,
        }
    }

    /// Create a configuration for development with a short interval.
    pub fn development() -> Self {
        Self {
            interval: Duration::from_secs(5),
            lock: LockSpec::new(DEFAULT_LOCK_KEY, Duration::from_secs(10)),
            ..Self::default()
        }
    }

    /// Create a configuration for production: bounded retries at every
    /// external boundary and a snapshot that only advances on success.
    pub fn production() -> Self {
        Self {
            lock_retry: RetryPolicy::exponential(5),
            ddl_retry: RetryPolicy::exponential(3),
            snapshot_commit: SnapshotCommit::AfterSuccess,
            ..Self::default()
        }
    }

    /// Reject configurations the daemon cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "interval".to_string(),
                value: format!("{:?}", self.interval),
                reason: "must be positive".to_string(),
            });
        }
        if self.lock.key.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "lock.key".to_string(),
            });
        }
        if self.lock.lease_ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "lock.lease_ttl".to_string(),
                value: format!("{:?}", self.lock.lease_ttl),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

fn retry_policy(max_retries: u32) -> RetryPolicy {
    if max_retries == 0 {
        RetryPolicy::none()
    } else {
        RetryPolicy::exponential(max_retries)
    }
}

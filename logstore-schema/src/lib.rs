//! logstore Schema - Tenant Keyspace Reconciler
//!
//! Keeps a multi-tenant column store's schema in step with the tenant
//! directory. One instance across the fleet wins the election lock and
//! then, on every tick, provisions a keyspace, log table, retention setting
//! and index for every tenant that lacks them.
//!
//! ```ignore
//! use logstore_schema::{ReconcilerConfig, SchemaManager, SchemaReconciler};
//! use tokio::sync::watch;
//!
//! let config = ReconcilerConfig::from_env();
//! let reconciler = SchemaReconciler::new(store, directory, config).await?;
//! let metrics = reconciler.metrics();
//!
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! // `None` runs at the configured interval.
//! let daemon = tokio::spawn(reconciler.run_daemon(None, locks, shutdown_rx));
//!
//! // Later
//! let _ = shutdown_tx.send(true);
//! let exit = daemon.await?;
//! ```

pub mod config;
pub mod constants;
pub mod daemon;
pub mod ddl;
pub mod error;
pub mod keyspace;
pub mod metrics;
pub mod reconciler;
pub mod retry;
pub mod snapshot;
pub mod telemetry;

pub use config::{ReconcilerConfig, SnapshotCommit};
pub use daemon::{shutdown_requested, DaemonExit, SchemaManager};
pub use error::ReconcileError;
pub use keyspace::{keyspace_for_tenant, tenant_keyspace_config};
pub use metrics::{ReconcilerMetrics, ReconcilerMetricsSnapshot};
pub use reconciler::{PassOutcome, PassReport, SchemaReconciler};
pub use snapshot::{ChangeDetection, TenantSnapshot};
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig};

//! Schema reconciler: bootstrap and provisioning passes.
//!
//! A pass fetches the full tenant list, compares it with the snapshot and,
//! when it changed, re-verifies every tenant in directory order:
//!
//! ```text
//! list_tenants(1, MAX) ──→ unchanged? ──yes──→ done
//!                              │no
//!                              ▼
//!        for each tenant: metadata ──missing──→ create keyspace ─┐
//!                              │ present                          ▼
//!                              └──tables missing──→ table → retention → index
//! ```
//!
//! The first failing creation aborts the pass. With the default
//! [`SnapshotCommit::Eager`] the snapshot was already replaced at that point,
//! so the tenants after the failure are not revisited until the list changes.

use crate::config::{ReconcilerConfig, SnapshotCommit};
use crate::constants::{TENANT_REQUIRED_TABLES, UNBOUNDED_PAGE_SIZE};
use crate::ddl::{create_keyspace_cql, default_schema_statements, tenant_table_statements};
use crate::error::ReconcileError;
use crate::keyspace::{default_keyspace_config, system_keyspace_config, tenant_keyspace_config};
use crate::metrics::ReconcilerMetrics;
use crate::retry::run_with_retry;
use crate::snapshot::TenantSnapshot;
use logstore_core::{
    Consistency, KeyspaceConfig, KeyspaceMetadata, SessionConfig, Statement, StoreError, TenantId,
};
use logstore_storage::{SchemaSession, SchemaStore, TenantDirectory};
use serde::Serialize;
use std::sync::Arc;

/// What one provisioning pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub tenants_checked: usize,
    pub keyspaces_created: usize,
    pub tables_created: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PassOutcome {
    /// The tenant list matched the snapshot; nothing was queried.
    Unchanged,
    Reconciled(PassReport),
}

/// Keeps per-tenant keyspaces in line with the tenant directory.
pub struct SchemaReconciler {
    store: Arc<dyn SchemaStore>,
    session: Box<dyn SchemaSession>,
    directory: Arc<dyn TenantDirectory>,
    snapshot: TenantSnapshot,
    config: ReconcilerConfig,
    metrics: Arc<ReconcilerMetrics>,
}

impl SchemaReconciler {
    /// Open the system session and create the default schema.
    ///
    /// A reconciler is only returned once the default keyspace and all of
    /// its objects exist.
    pub async fn new(
        store: Arc<dyn SchemaStore>,
        directory: Arc<dyn TenantDirectory>,
        config: ReconcilerConfig,
    ) -> Result<Self, ReconcileError> {
        config.validate()?;

        let session = store
            .session(&SessionConfig {
                keyspace: system_keyspace_config(),
                consistency: Consistency::LocalOne,
            })
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to open system session");
                ReconcileError::Session(e)
            })?;

        let reconciler = Self {
            store,
            session,
            directory,
            snapshot: TenantSnapshot::new(),
            config,
            metrics: Arc::new(ReconcilerMetrics::new()),
        };

        if let Err(e) = reconciler.bootstrap().await {
            tracing::error!(error = %e, "Default schema bootstrap failed");
            return Err(e);
        }

        Ok(reconciler)
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    pub fn snapshot(&self) -> &TenantSnapshot {
        &self.snapshot
    }

    pub fn metrics(&self) -> Arc<ReconcilerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Create the default keyspace and its objects. Safe to repeat.
    pub async fn bootstrap(&self) -> Result<(), ReconcileError> {
        let default = default_keyspace_config();
        self.create_keyspace(&default)
            .await
            .map_err(|source| ReconcileError::Bootstrap {
                target: format!("keyspace {}", default.name),
                source,
            })?;

        for stmt in default_schema_statements() {
            self.execute(&stmt)
                .await
                .map_err(|source| ReconcileError::Bootstrap {
                    target: stmt.target.to_string(),
                    source,
                })?;
        }

        tracing::info!(keyspace = %default.name, "Default schema ready");
        Ok(())
    }

    /// Run one provisioning pass.
    pub async fn reconcile_once(&mut self) -> Result<PassOutcome, ReconcileError> {
        ReconcilerMetrics::incr(&self.metrics.passes);

        let result = self.run_pass().await;
        match &result {
            Ok(PassOutcome::Unchanged) => {
                ReconcilerMetrics::incr(&self.metrics.passes_unchanged);
            }
            Ok(PassOutcome::Reconciled(_)) => {}
            Err(_) => ReconcilerMetrics::incr(&self.metrics.passes_failed),
        }
        result
    }

    async fn run_pass(&mut self) -> Result<PassOutcome, ReconcileError> {
        let page = self
            .directory
            .list_tenants(1, UNBOUNDED_PAGE_SIZE)
            .await?;
        let tenants = page.tenants;

        if !self
            .snapshot
            .differs_from(&tenants, self.config.change_detection)
        {
            tracing::trace!(tenants = tenants.len(), "Tenant list unchanged");
            return Ok(PassOutcome::Unchanged);
        }

        if self.config.snapshot_commit == SnapshotCommit::Eager {
            self.snapshot.replace(tenants.clone());
        }

        let mut report = PassReport::default();
        for tenant in &tenants {
            self.ensure_tenant(tenant, &mut report).await?;
        }

        if self.config.snapshot_commit == SnapshotCommit::AfterSuccess {
            self.snapshot.replace(tenants);
        }

        if report.keyspaces_created > 0 || report.tables_created > 0 {
            tracing::info!(
                tenants = report.tenants_checked,
                keyspaces_created = report.keyspaces_created,
                tables_created = report.tables_created,
                "Tenant keyspaces reconciled"
            );
        } else {
            tracing::debug!(
                tenants = report.tenants_checked,
                "Tenant keyspaces verified"
            );
        }

        Ok(PassOutcome::Reconciled(report))
    }

    async fn ensure_tenant(
        &self,
        tenant: &TenantId,
        report: &mut PassReport,
    ) -> Result<(), ReconcileError> {
        let keyspace = tenant_keyspace_config(tenant);
        report.tenants_checked += 1;
        ReconcilerMetrics::incr(&self.metrics.tenants_checked);

        let (keyspace_exists, tables_exist) = match self.lookup(&keyspace.name).await {
            Some(meta) => (true, meta.has_tables(TENANT_REQUIRED_TABLES)),
            None => (false, false),
        };
        tracing::debug!(
            tenant = %tenant,
            keyspace = %keyspace.name,
            keyspace_exists,
            tables_exist,
            "Checked tenant keyspace"
        );

        if !keyspace_exists {
            self.create_keyspace(&keyspace)
                .await
                .map_err(|source| ReconcileError::CreateKeyspace {
                    keyspace: keyspace.name.clone(),
                    source,
                })?;
            report.keyspaces_created += 1;
            ReconcilerMetrics::incr(&self.metrics.keyspaces_created);
        }

        if !tables_exist {
            for stmt in tenant_table_statements(&keyspace.name) {
                self.execute(&stmt)
                    .await
                    .map_err(|source| ReconcileError::CreateTables {
                        keyspace: keyspace.name.clone(),
                        source,
                    })?;
            }
            report.tables_created += 1;
            ReconcilerMetrics::incr(&self.metrics.tables_created);
        }

        Ok(())
    }

    /// Metadata for `keyspace`. A failed lookup reads as "not found".
    async fn lookup(&self, keyspace: &str) -> Option<KeyspaceMetadata> {
        ReconcilerMetrics::incr(&self.metrics.metadata_lookups);
        match self.session.keyspace_metadata(keyspace).await {
            Ok(meta) => meta,
            Err(e) => {
                tracing::debug!(keyspace, error = %e, "Metadata lookup failed, treating as missing");
                None
            }
        }
    }

    async fn create_keyspace(&self, config: &KeyspaceConfig) -> Result<(), StoreError> {
        tracing::info!(cql = %create_keyspace_cql(config), "Creating keyspace");
        run_with_retry(&self.config.ddl_retry, "create_keyspace", is_retryable, || {
            self.store.create_keyspace(config)
        })
        .await
    }

    async fn execute(&self, stmt: &Statement) -> Result<(), StoreError> {
        let session = &self.session;
        run_with_retry(&self.config.ddl_retry, "execute", is_retryable, move || {
            session.execute(stmt)
        })
        .await?;
        ReconcilerMetrics::incr(&self.metrics.ddl_statements);
        tracing::info!(target_object = %stmt.target, cql = %stmt.cql, "Schema statement applied");
        Ok(())
    }
}

fn is_retryable(err: &StoreError) -> bool {
    !matches!(err, StoreError::LockPoisoned)
}

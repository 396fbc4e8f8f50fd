//! In-memory column store catalog.

use crate::store::{SchemaSession, SchemaStore};
use async_trait::async_trait;
use logstore_core::{
    Consistency, KeyspaceConfig, KeyspaceMetadata, ReplicationClass, ReplicationConfig,
    SchemaObject, SessionConfig, Statement, StoreError, TableMetadata,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// Keyspace every store has before anything is created.
pub const SYSTEM_KEYSPACE: &str = "system";

/// One recorded interaction with the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    OpenSession {
        keyspace: String,
        consistency: Consistency,
    },
    KeyspaceMetadata {
        keyspace: String,
    },
    CreateKeyspace {
        keyspace: String,
    },
    Execute {
        target: SchemaObject,
        consistency: Consistency,
    },
}

impl StoreCall {
    /// Keyspace creation or statement execution.
    pub fn is_ddl(&self) -> bool {
        matches!(self, StoreCall::CreateKeyspace { .. } | StoreCall::Execute { .. })
    }

    pub fn keyspace(&self) -> &str {
        match self {
            StoreCall::OpenSession { keyspace, .. }
            | StoreCall::KeyspaceMetadata { keyspace }
            | StoreCall::CreateKeyspace { keyspace } => keyspace,
            StoreCall::Execute { target, .. } => target.keyspace(),
        }
    }
}

#[derive(Debug)]
struct KeyspaceState {
    config: KeyspaceConfig,
    metadata: KeyspaceMetadata,
}

#[derive(Debug, Default)]
struct InjectedFailures {
    create_keyspace: BTreeSet<String>,
    statements: BTreeSet<String>,
    metadata: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct StoreState {
    keyspaces: BTreeMap<String, KeyspaceState>,
    calls: Vec<StoreCall>,
    failures: InjectedFailures,
}

impl StoreState {
    fn insert_keyspace(&mut self, config: &KeyspaceConfig) {
        self.keyspaces
            .entry(config.name.clone())
            .or_insert_with(|| KeyspaceState {
                config: config.clone(),
                metadata: KeyspaceMetadata::new(config.name.clone()),
            });
    }

    fn table_mut(&mut self, keyspace: &str, table: &str) -> Result<&mut TableMetadata, StoreError> {
        let ks = self
            .keyspaces
            .get_mut(keyspace)
            .ok_or_else(|| StoreError::KeyspaceNotFound {
                keyspace: keyspace.to_string(),
            })?;
        ks.metadata
            .tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound {
                keyspace: keyspace.to_string(),
                table: table.to_string(),
            })
    }

    fn apply(&mut self, target: &SchemaObject) -> Result<(), StoreError> {
        match target {
            SchemaObject::Table { keyspace, table } => {
                let ks = self
                    .keyspaces
                    .get_mut(keyspace)
                    .ok_or_else(|| StoreError::KeyspaceNotFound {
                        keyspace: keyspace.clone(),
                    })?;
                ks.metadata
                    .tables
                    .entry(table.clone())
                    .or_insert_with(|| TableMetadata {
                        name: table.clone(),
                        ..Default::default()
                    });
            }
            SchemaObject::TableRetention {
                keyspace,
                table,
                gc_grace_seconds,
            } => {
                self.table_mut(keyspace, table)?.gc_grace_seconds = Some(*gc_grace_seconds);
            }
            SchemaObject::Index {
                keyspace,
                table,
                index,
            } => {
                self.table_mut(keyspace, table)?.indexes.insert(index.clone());
            }
        }
        Ok(())
    }
}

/// In-memory [`SchemaStore`] that records every call.
///
/// Statements are applied by their [`SchemaObject`] target with
/// create-if-not-exists semantics, so replaying DDL is harmless.
#[derive(Debug, Clone)]
pub struct MemorySchemaStore {
    state: Arc<Mutex<StoreState>>,
}

impl Default for MemorySchemaStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySchemaStore {
    /// Create a store that only contains the system keyspace.
    pub fn new() -> Self {
        let mut state = StoreState::default();
        state.insert_keyspace(&KeyspaceConfig {
            name: SYSTEM_KEYSPACE.to_string(),
            auto_create: false,
            replication: ReplicationConfig {
                class: ReplicationClass::SimpleStrategy,
                factor: 1,
            },
        });
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, StoreState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn inspect(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }

    /// Create a keyspace without recording a call.
    pub fn seed_keyspace(&self, config: &KeyspaceConfig) {
        self.inspect().insert_keyspace(config);
    }

    pub fn keyspace_exists(&self, keyspace: &str) -> bool {
        self.inspect().keyspaces.contains_key(keyspace)
    }

    pub fn keyspace_config(&self, keyspace: &str) -> Option<KeyspaceConfig> {
        self.inspect()
            .keyspaces
            .get(keyspace)
            .map(|ks| ks.config.clone())
    }

    pub fn metadata(&self, keyspace: &str) -> Option<KeyspaceMetadata> {
        self.inspect()
            .keyspaces
            .get(keyspace)
            .map(|ks| ks.metadata.clone())
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.inspect().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inspect().calls.clear();
    }

    pub fn metadata_lookups(&self) -> usize {
        self.inspect()
            .calls
            .iter()
            .filter(|c| matches!(c, StoreCall::KeyspaceMetadata { .. }))
            .count()
    }

    pub fn ddl_calls(&self) -> usize {
        self.inspect().calls.iter().filter(|c| c.is_ddl()).count()
    }

    pub fn ddl_calls_for(&self, keyspace: &str) -> Vec<StoreCall> {
        self.inspect()
            .calls
            .iter()
            .filter(|c| c.is_ddl() && c.keyspace() == keyspace)
            .cloned()
            .collect()
    }

    /// Make every `create_keyspace` for `keyspace` fail.
    pub fn fail_keyspace_creation(&self, keyspace: &str) {
        self.inspect()
            .failures
            .create_keyspace
            .insert(keyspace.to_string());
    }

    /// Make every statement targeting `keyspace` fail.
    pub fn fail_statements_for(&self, keyspace: &str) {
        self.inspect().failures.statements.insert(keyspace.to_string());
    }

    /// Make metadata lookups for `keyspace` fail.
    pub fn fail_metadata_for(&self, keyspace: &str) {
        self.inspect().failures.metadata.insert(keyspace.to_string());
    }

    pub fn clear_failures(&self) {
        self.inspect().failures = InjectedFailures::default();
    }
}

#[async_trait]
impl SchemaStore for MemorySchemaStore {
    async fn session(&self, config: &SessionConfig) -> Result<Box<dyn SchemaSession>, StoreError> {
        let mut state = self.state()?;
        state.calls.push(StoreCall::OpenSession {
            keyspace: config.keyspace.name.clone(),
            consistency: config.consistency,
        });

        if !state.keyspaces.contains_key(&config.keyspace.name) {
            if !config.keyspace.auto_create {
                return Err(StoreError::SessionUnavailable {
                    keyspace: config.keyspace.name.clone(),
                    reason: "keyspace does not exist".to_string(),
                });
            }
            state.insert_keyspace(&config.keyspace);
        }

        Ok(Box::new(MemorySession {
            store: self.clone(),
            keyspace: config.keyspace.name.clone(),
            consistency: config.consistency,
        }))
    }

    async fn create_keyspace(&self, config: &KeyspaceConfig) -> Result<(), StoreError> {
        let mut state = self.state()?;
        state.calls.push(StoreCall::CreateKeyspace {
            keyspace: config.name.clone(),
        });

        if state.failures.create_keyspace.contains(&config.name) {
            return Err(StoreError::KeyspaceCreationFailed {
                keyspace: config.name.clone(),
                reason: "injected failure".to_string(),
            });
        }

        state.insert_keyspace(config);
        Ok(())
    }
}

/// Session onto a [`MemorySchemaStore`].
#[derive(Debug, Clone)]
pub struct MemorySession {
    store: MemorySchemaStore,
    keyspace: String,
    consistency: Consistency,
}

impl MemorySession {
    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    pub fn consistency(&self) -> Consistency {
        self.consistency
    }
}

#[async_trait]
impl SchemaSession for MemorySession {
    async fn keyspace_metadata(
        &self,
        keyspace: &str,
    ) -> Result<Option<KeyspaceMetadata>, StoreError> {
        let mut state = self.store.state()?;
        state.calls.push(StoreCall::KeyspaceMetadata {
            keyspace: keyspace.to_string(),
        });

        if state.failures.metadata.contains(keyspace) {
            return Err(StoreError::MetadataQueryFailed {
                keyspace: keyspace.to_string(),
                reason: "injected failure".to_string(),
            });
        }

        Ok(state.keyspaces.get(keyspace).map(|ks| ks.metadata.clone()))
    }

    async fn execute(&self, statement: &Statement) -> Result<(), StoreError> {
        let mut state = self.store.state()?;
        state.calls.push(StoreCall::Execute {
            target: statement.target.clone(),
            consistency: statement.consistency,
        });

        if state.failures.statements.contains(statement.target.keyspace()) {
            return Err(StoreError::ExecutionFailed {
                reason: format!("injected failure: {}", statement.cql),
            });
        }

        state.apply(&statement.target)
    }
}

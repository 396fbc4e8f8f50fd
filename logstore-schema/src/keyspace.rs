//! Keyspace naming and configuration.

use crate::constants::{
    DEFAULT_KEYSPACE, REPLICATION_CLASS, REPLICATION_FACTOR, SYSTEM_KEYSPACE,
    TENANT_KEYSPACE_PREFIX, TENANT_KEYSPACE_SUFFIX,
};
use logstore_core::{KeyspaceConfig, ReplicationConfig, TenantId};

/// Deterministic keyspace name for a tenant.
///
/// Characters outside `[A-Za-z0-9_]` become `_` and letters are lowercased,
/// since unquoted CQL identifiers are case-insensitive. Tenants that differ
/// only in those characters share a keyspace.
pub fn keyspace_for_tenant(tenant: &TenantId) -> String {
    let normalized: String = tenant
        .as_str()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{TENANT_KEYSPACE_PREFIX}{normalized}{TENANT_KEYSPACE_SUFFIX}")
}

/// Keyspace config used for every keyspace the reconciler creates.
///
/// Replication is fixed policy, not tenant-configurable.
pub fn keyspace_config(name: impl Into<String>) -> KeyspaceConfig {
    KeyspaceConfig {
        name: name.into(),
        auto_create: false,
        replication: ReplicationConfig {
            class: REPLICATION_CLASS,
            factor: REPLICATION_FACTOR,
        },
    }
}

pub fn tenant_keyspace_config(tenant: &TenantId) -> KeyspaceConfig {
    keyspace_config(keyspace_for_tenant(tenant))
}

pub fn default_keyspace_config() -> KeyspaceConfig {
    keyspace_config(DEFAULT_KEYSPACE)
}

pub fn system_keyspace_config() -> KeyspaceConfig {
    keyspace_config(SYSTEM_KEYSPACE)
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Keyspace names are stable and always valid unquoted identifiers.
        #[test]
        fn prop_keyspace_name_is_valid_identifier(raw in "\\PC{0,24}") {
            let tenant = TenantId::new(raw);
            let name = keyspace_for_tenant(&tenant);

            prop_assert_eq!(&name, &keyspace_for_tenant(&tenant));
            prop_assert!(name.starts_with(TENANT_KEYSPACE_PREFIX));
            prop_assert!(name.ends_with(TENANT_KEYSPACE_SUFFIX));
            prop_assert!(name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
        }
    }
}

//! Last-seen tenant list and change detection.
//!
//! The snapshot only answers "did the tenant list change since the last
//! pass"; it says nothing about whether a tenant was provisioned.

use logstore_core::{ConfigError, TenantId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// How a freshly fetched tenant list is compared to the snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeDetection {
    /// Same tenants in the same order. A reordering counts as a change and
    /// triggers a full re-verification pass.
    #[default]
    Positional,
    /// Same set of tenants, order ignored.
    Set,
}

impl ChangeDetection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeDetection::Positional => "positional",
            ChangeDetection::Set => "set",
        }
    }

    /// Whether `next` differs from `previous` under this policy.
    pub fn has_changed(&self, previous: &[TenantId], next: &[TenantId]) -> bool {
        match self {
            ChangeDetection::Positional => previous != next,
            ChangeDetection::Set => {
                let previous: HashSet<&TenantId> = previous.iter().collect();
                let next: HashSet<&TenantId> = next.iter().collect();
                previous != next
            }
        }
    }
}

impl fmt::Display for ChangeDetection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeDetection {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "positional" => Ok(ChangeDetection::Positional),
            "set" => Ok(ChangeDetection::Set),
            _ => Err(ConfigError::InvalidValue {
                field: "change_detection".to_string(),
                value: s.to_string(),
                reason: "expected 'positional' or 'set'".to_string(),
            }),
        }
    }
}

/// The tenant list observed by the most recent pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantSnapshot {
    tenants: Vec<TenantId>,
}

impl TenantSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tenants(&self) -> &[TenantId] {
        &self.tenants
    }

    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }

    pub fn differs_from(&self, next: &[TenantId], detection: ChangeDetection) -> bool {
        detection.has_changed(&self.tenants, next)
    }

    pub fn replace(&mut self, tenants: Vec<TenantId>) {
        self.tenants = tenants;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<TenantId> {
        names.iter().map(|n| TenantId::from(*n)).collect()
    }

    #[test]
    fn test_positional_detects_reorder() {
        let detection = ChangeDetection::Positional;
        assert!(!detection.has_changed(&ids(&["a", "b"]), &ids(&["a", "b"])));
        assert!(detection.has_changed(&ids(&["a", "b"]), &ids(&["b", "a"])));
        assert!(detection.has_changed(&ids(&["a"]), &ids(&["a", "b"])));
        assert!(!detection.has_changed(&[], &[]));
    }

    #[test]
    fn test_set_ignores_order() {
        let detection = ChangeDetection::Set;
        assert!(!detection.has_changed(&ids(&["a", "b"]), &ids(&["b", "a"])));
        assert!(detection.has_changed(&ids(&["a", "b"]), &ids(&["a", "c"])));
    }

    #[test]
    fn test_empty_snapshot_vs_empty_list_is_unchanged() {
        let snapshot = TenantSnapshot::new();
        assert!(snapshot.is_empty());
        assert!(!snapshot.differs_from(&[], ChangeDetection::Positional));
        assert!(snapshot.differs_from(&ids(&["a"]), ChangeDetection::Positional));
    }

    #[test]
    fn test_replace() {
        let mut snapshot = TenantSnapshot::new();
        snapshot.replace(ids(&["a", "b"]));
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.tenants(), ids(&["a", "b"]).as_slice());
    }

    #[test]
    fn test_parse_change_detection() {
        assert_eq!("Positional".parse(), Ok(ChangeDetection::Positional));
        assert_eq!("set".parse(), Ok(ChangeDetection::Set));
        assert!("fuzzy".parse::<ChangeDetection>().is_err());
    }
}

//! Tenant documents
//!
//! Each tenant persists a single document holding all of its hierarchies, the
//! role index that maps every tier role back to its hierarchy, and the optional
//! audit channel.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::hierarchy::Hierarchy;
use crate::ids::{ChannelId, RoleId};

/// The persisted state of one tenant.
///
/// Any of the three top-level fields may be missing from a stored document;
/// missing fields load as empty. The legacy keys `roles` and `log_channel` are
/// accepted in place of `roleIndex` and `logChannel`.
///
/// # Examples
///
/// ```
/// use hierarchies_core::{RoleId, TenantDocument};
///
/// let mut doc = TenantDocument::default();
/// doc.create_hierarchy("Guild", RoleId(100)).unwrap();
/// assert_eq!(doc.hierarchy_of(RoleId(100)), Some("Guild"));
/// assert!(doc.index_mismatches().is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantDocument {
    /// Hierarchies by name
    #[serde(default)]
    pub hierarchies: BTreeMap<String, Hierarchy>,

    /// Owning hierarchy name for every tier role
    #[serde(default, alias = "roles")]
    pub role_index: BTreeMap<RoleId, String>,

    /// Channel that receives audit messages
    #[serde(default, alias = "log_channel")]
    pub log_channel: Option<ChannelId>,
}

/// A disagreement between the role index and the hierarchy trees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexMismatch {
    /// Index entry whose hierarchy does not exist
    MissingHierarchy {
        /// Indexed role
        role: RoleId,
        /// Name stored in the index
        hierarchy: String,
    },

    /// Index entry whose hierarchy exists but has no tier for the role
    MissingTier {
        /// Indexed role
        role: RoleId,
        /// Name stored in the index
        hierarchy: String,
    },

    /// Tier role with no index entry
    Unindexed {
        /// Tier role
        role: RoleId,
        /// Hierarchy that contains the tier
        hierarchy: String,
    },

    /// Tier role indexed under a different hierarchy
    WrongHierarchy {
        /// Tier role
        role: RoleId,
        /// Name stored in the index
        indexed: String,
        /// Hierarchy that contains the tier
        actual: String,
    },
}

impl TenantDocument {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a hierarchy by name.
    pub fn hierarchy(&self, name: &str) -> Option<&Hierarchy> {
        self.hierarchies.get(name)
    }

    /// Get the name of the hierarchy a role is indexed under.
    pub fn hierarchy_of(&self, role: RoleId) -> Option<&str> {
        self.role_index.get(&role).map(String::as_str)
    }

    /// Iterate hierarchy names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.hierarchies.keys().map(String::as_str)
    }

    /// Check whether the document has no hierarchies.
    pub fn is_empty(&self) -> bool {
        self.hierarchies.is_empty()
    }

    /// List every disagreement between the role index and the trees.
    ///
    /// Read-only diagnostic. An empty result means index and trees are in 1:1
    /// correspondence.
    pub fn index_mismatches(&self) -> Vec<IndexMismatch> {
        let mut mismatches = Vec::new();

        for (role, name) in &self.role_index {
            match self.hierarchies.get(name) {
                None => mismatches.push(IndexMismatch::MissingHierarchy {
                    role: *role,
                    hierarchy: name.clone(),
                }),
                Some(hierarchy) if !hierarchy.contains(*role) => {
                    mismatches.push(IndexMismatch::MissingTier {
                        role: *role,
                        hierarchy: name.clone(),
                    })
                }
                Some(_) => {}
            }
        }

        for (name, hierarchy) in &self.hierarchies {
            for role in hierarchy.role_ids() {
                match self.role_index.get(&role) {
                    None => mismatches.push(IndexMismatch::Unindexed {
                        role,
                        hierarchy: name.clone(),
                    }),
                    Some(indexed) if indexed != name => {
                        mismatches.push(IndexMismatch::WrongHierarchy {
                            role,
                            indexed: indexed.clone(),
                            actual: name.clone(),
                        })
                    }
                    Some(_) => {}
                }
            }
        }

        mismatches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tier::{Tier, TierRules};

    #[test]
    fn test_missing_fields_default() {
        let doc: TenantDocument = serde_json::from_str("{}").unwrap();
        assert!(doc.hierarchies.is_empty());
        assert!(doc.role_index.is_empty());
        assert!(doc.log_channel.is_none());

        let doc: TenantDocument = serde_json::from_str(r#"{"hierarchies": {}}"#).unwrap();
        assert!(doc.role_index.is_empty());
    }

    #[test]
    fn test_reads_legacy_keys() {
        let json = r#"{
            "hierarchies": {
                "Guild": {
                    "tiers": [{
                        "role_id": 10,
                        "parent_role_id": 0,
                        "depth": 0,
                        "promotion_min_depth": 0,
                        "promotion_max_depth": 500,
                        "demotion_min_depth": 0,
                        "demotion_max_depth": 500
                    }],
                    "maximum_depth": 0
                }
            },
            "roles": { "10": "Guild" },
            "log_channel": 77
        }"#;

        let doc: TenantDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.hierarchy_of(RoleId(10)), Some("Guild"));
        assert_eq!(doc.log_channel, Some(ChannelId(77)));
        assert!(doc.index_mismatches().is_empty());
    }

    #[test]
    fn test_serializes_current_keys() {
        let mut doc = TenantDocument::new();
        doc.hierarchies
            .insert("Guild".to_string(), Hierarchy::new(RoleId(10)));
        doc.role_index.insert(RoleId(10), "Guild".to_string());

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["roleIndex"]["10"], "Guild");
        assert!(value["logChannel"].is_null());
        assert_eq!(value["hierarchies"]["Guild"]["maximumDepth"], 0);
    }

    #[test]
    fn test_index_mismatches_reported() {
        let mut doc = TenantDocument::new();
        let mut guild = Hierarchy::new(RoleId(1));
        guild
            .tiers
            .push(Tier::new(RoleId(2), RoleId(1), TierRules::default()));
        doc.hierarchies.insert("Guild".to_string(), guild);
        doc.hierarchies
            .insert("Army".to_string(), Hierarchy::new(RoleId(5)));

        doc.role_index.insert(RoleId(1), "Guild".to_string());
        doc.role_index.insert(RoleId(2), "Army".to_string());
        doc.role_index.insert(RoleId(3), "Guild".to_string());
        doc.role_index.insert(RoleId(4), "Navy".to_string());

        let mismatches = doc.index_mismatches();
        assert!(mismatches.contains(&IndexMismatch::MissingHierarchy {
            role: RoleId(4),
            hierarchy: "Navy".to_string(),
        }));
        assert!(mismatches.contains(&IndexMismatch::MissingTier {
            role: RoleId(3),
            hierarchy: "Guild".to_string(),
        }));
        assert!(mismatches.contains(&IndexMismatch::Unindexed {
            role: RoleId(5),
            hierarchy: "Army".to_string(),
        }));
        assert!(mismatches.contains(&IndexMismatch::WrongHierarchy {
            role: RoleId(2),
            indexed: "Army".to_string(),
            actual: "Guild".to_string(),
        }));
    }
}

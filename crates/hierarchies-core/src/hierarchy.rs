//! Hierarchies and depth recomputation
//!
//! A hierarchy is stored as a flat tier list linked by parent role ids. Depths
//! are cached on each tier but always rebuilt from the parent links after a
//! structural change, since moving one tier shifts its whole subtree.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{HierarchyError, HierarchyResult};
use crate::ids::RoleId;
use crate::tier::Tier;

/// Maximum length of a hierarchy name, in characters.
pub const MAX_NAME_LEN: usize = 32;

/// Validate a hierarchy name.
///
/// Names must be non-empty, contain no whitespace and be at most
/// [`MAX_NAME_LEN`] characters long.
///
/// # Examples
///
/// ```
/// use hierarchies_core::validate_name;
///
/// assert!(validate_name("Guild").is_ok());
/// assert!(validate_name("Royal Guard").is_err());
/// assert!(validate_name(&"a".repeat(33)).is_err());
/// ```
pub fn validate_name(name: &str) -> HierarchyResult<()> {
    if name.is_empty() {
        return Err(HierarchyError::NameEmpty);
    }
    if name.chars().any(char::is_whitespace) {
        return Err(HierarchyError::NameHasSpaces {
            name: name.to_string(),
        });
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(HierarchyError::NameTooLong {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// A named tree of tiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hierarchy {
    /// Tiers in root-first traversal order
    #[serde(default)]
    pub tiers: Vec<Tier>,

    /// Largest tier depth (informational)
    #[serde(default, alias = "maximum_depth")]
    pub maximum_depth: u32,
}

impl Hierarchy {
    /// Create a hierarchy holding only its root tier.
    pub fn new(root_role: RoleId) -> Self {
        Self {
            tiers: vec![Tier::root(root_role)],
            maximum_depth: 0,
        }
    }

    /// Get the root tier.
    pub fn root(&self) -> Option<&Tier> {
        self.tiers.iter().find(|t| t.is_root())
    }

    /// Find the tier bound to a role.
    pub fn tier(&self, role: RoleId) -> Option<&Tier> {
        self.tiers.iter().find(|t| t.role_id == role)
    }

    /// Find the tier bound to a role, mutably.
    pub fn tier_mut(&mut self, role: RoleId) -> Option<&mut Tier> {
        self.tiers.iter_mut().find(|t| t.role_id == role)
    }

    /// Check whether a role is bound to a tier of this hierarchy.
    pub fn contains(&self, role: RoleId) -> bool {
        self.tier(role).is_some()
    }

    /// Iterate the direct children of a role.
    pub fn children(&self, role: RoleId) -> impl Iterator<Item = &Tier> {
        self.tiers.iter().filter(move |t| t.parent_role_id == role)
    }

    /// Iterate all role ids of this hierarchy.
    pub fn role_ids(&self) -> impl Iterator<Item = RoleId> + '_ {
        self.tiers.iter().map(|t| t.role_id)
    }

    /// Check whether `ancestor` is `role` itself or appears on its parent chain.
    ///
    /// The walk stops after as many steps as there are tiers, so a corrupted
    /// chain cannot loop forever.
    pub fn is_ancestor_or_self(&self, ancestor: RoleId, role: RoleId) -> bool {
        let mut current = role;
        for _ in 0..=self.tiers.len() {
            if current == ancestor {
                return true;
            }
            match self.tier(current) {
                Some(tier) if !tier.is_root() => current = tier.parent_role_id,
                _ => return false,
            }
        }
        false
    }

    /// Rebuild depths and the cached maximum depth from the parent links.
    ///
    /// Returns the roles of tiers that were unreachable from the root and have
    /// been dropped from the tier list.
    pub fn rebuild(&mut self) -> Vec<RoleId> {
        let before: Vec<RoleId> = self.role_ids().collect();
        self.tiers = recompute_depths(std::mem::take(&mut self.tiers));
        self.maximum_depth = self.tiers.iter().map(|t| t.depth).max().unwrap_or(0);

        before
            .into_iter()
            .filter(|role| !self.contains(*role))
            .collect()
    }
}

/// Recompute every tier's depth by traversal from the root sentinel.
///
/// Tiers are returned in root-first order: each tier is followed by its
/// subtree, siblings keep their relative order. Tiers not reachable from the
/// root sentinel are dropped, and each input tier is emitted at most once.
pub fn recompute_depths(tiers: Vec<Tier>) -> Vec<Tier> {
    let mut children: HashMap<RoleId, Vec<usize>> = HashMap::new();
    for (idx, tier) in tiers.iter().enumerate() {
        children.entry(tier.parent_role_id).or_default().push(idx);
    }

    let mut slots: Vec<Option<Tier>> = tiers.into_iter().map(Some).collect();
    let mut ordered = Vec::with_capacity(slots.len());
    collect_subtree(RoleId::ROOT_PARENT, 0, &children, &mut slots, &mut ordered);
    ordered
}

fn collect_subtree(
    parent: RoleId,
    depth: u32,
    children: &HashMap<RoleId, Vec<usize>>,
    slots: &mut [Option<Tier>],
    ordered: &mut Vec<Tier>,
) {
    let Some(indices) = children.get(&parent) else {
        return;
    };

    for &idx in indices {
        let Some(mut tier) = slots[idx].take() else {
            continue;
        };
        tier.depth = depth;
        let role = tier.role_id;
        ordered.push(tier);
        collect_subtree(role, depth + 1, children, slots, ordered);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tier::TierRules;

    fn child(role: u64, parent: u64) -> Tier {
        Tier::new(RoleId(role), RoleId(parent), TierRules::default())
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Guild").is_ok());
        assert!(validate_name(&"a".repeat(32)).is_ok());
        assert!(matches!(validate_name(""), Err(HierarchyError::NameEmpty)));
        assert!(matches!(
            validate_name("two words"),
            Err(HierarchyError::NameHasSpaces { .. })
        ));
        assert!(matches!(
            validate_name("tab\there"),
            Err(HierarchyError::NameHasSpaces { .. })
        ));
        assert!(matches!(
            validate_name(&"a".repeat(33)),
            Err(HierarchyError::NameTooLong { .. })
        ));
    }

    #[test]
    fn test_name_length_counts_characters() {
        // 32 two-byte characters is still within the limit
        assert!(validate_name(&"é".repeat(32)).is_ok());
    }

    #[test]
    fn test_recompute_depths_root_first() {
        let tiers = vec![
            child(3, 2),
            child(2, 1),
            Tier::root(RoleId(1)),
            child(4, 1),
        ];

        let rebuilt = recompute_depths(tiers);
        let order: Vec<(u64, u32)> = rebuilt.iter().map(|t| (t.role_id.0, t.depth)).collect();
        assert_eq!(order, vec![(1, 0), (2, 1), (3, 2), (4, 1)]);
    }

    #[test]
    fn test_recompute_ignores_stale_depths() {
        let mut stale = child(2, 1);
        stale.depth = 17;
        let rebuilt = recompute_depths(vec![Tier::root(RoleId(1)), stale]);
        assert_eq!(rebuilt[1].depth, 1);
    }

    #[test]
    fn test_recompute_drops_unreachable_and_cycles() {
        let tiers = vec![
            Tier::root(RoleId(1)),
            child(2, 1),
            // orphan whose parent does not exist
            child(3, 99),
            // two-node cycle detached from the root
            child(4, 5),
            child(5, 4),
        ];

        let rebuilt = recompute_depths(tiers);
        let roles: Vec<u64> = rebuilt.iter().map(|t| t.role_id.0).collect();
        assert_eq!(roles, vec![1, 2]);
    }

    #[test]
    fn test_rebuild_updates_maximum_depth() {
        let mut hierarchy = Hierarchy::new(RoleId(1));
        hierarchy.tiers.push(child(2, 1));
        hierarchy.tiers.push(child(3, 2));
        let dropped = hierarchy.rebuild();
        assert!(dropped.is_empty());
        assert_eq!(hierarchy.maximum_depth, 2);

        hierarchy.tiers.retain(|t| t.role_id != RoleId(3));
        hierarchy.rebuild();
        assert_eq!(hierarchy.maximum_depth, 1);
    }

    #[test]
    fn test_rebuild_reports_dropped_roles() {
        let mut hierarchy = Hierarchy::new(RoleId(1));
        hierarchy.tiers.push(child(7, 8));
        assert_eq!(hierarchy.rebuild(), vec![RoleId(7)]);
    }

    #[test]
    fn test_is_ancestor_or_self() {
        let mut hierarchy = Hierarchy::new(RoleId(1));
        hierarchy.tiers.push(child(2, 1));
        hierarchy.tiers.push(child(3, 2));
        hierarchy.rebuild();

        assert!(hierarchy.is_ancestor_or_self(RoleId(3), RoleId(3)));
        assert!(hierarchy.is_ancestor_or_self(RoleId(1), RoleId(3)));
        assert!(hierarchy.is_ancestor_or_self(RoleId(2), RoleId(3)));
        assert!(!hierarchy.is_ancestor_or_self(RoleId(3), RoleId(1)));
    }
}

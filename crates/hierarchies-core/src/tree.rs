//! Tree maintenance
//!
//! Structural operations on a tenant document. Each operation validates the
//! whole request before touching the document, so a returned error always
//! leaves the document exactly as it was. Successful operations rebuild the
//! affected hierarchy's depths from scratch.

use tracing::warn;

use crate::document::TenantDocument;
use crate::error::{HierarchyError, HierarchyResult};
use crate::hierarchy::{validate_name, Hierarchy};
use crate::ids::{ChannelId, RoleId};
use crate::tier::{Tier, TierRules};

impl TenantDocument {
    /// Create a hierarchy whose root tier is bound to `root_role`.
    ///
    /// # Errors
    ///
    /// `NameEmpty`, `NameHasSpaces`, `NameTooLong`, `ReservedRoleId`,
    /// `NameExists` or `RoleAlreadyInHierarchy`.
    pub fn create_hierarchy(&mut self, name: &str, root_role: RoleId) -> HierarchyResult<()> {
        validate_name(name)?;
        ensure_assignable(root_role)?;

        if self.hierarchies.contains_key(name) {
            return Err(HierarchyError::NameExists {
                name: name.to_string(),
            });
        }
        if let Some(existing) = self.role_index.get(&root_role) {
            return Err(HierarchyError::RoleAlreadyInHierarchy {
                role: root_role,
                hierarchy: existing.clone(),
            });
        }

        self.hierarchies
            .insert(name.to_string(), Hierarchy::new(root_role));
        self.role_index.insert(root_role, name.to_string());
        Ok(())
    }

    /// Delete a hierarchy together with every index entry pointing at it.
    ///
    /// Returns the removed hierarchy.
    pub fn delete_hierarchy(&mut self, name: &str) -> HierarchyResult<Hierarchy> {
        let removed = self
            .hierarchies
            .remove(name)
            .ok_or_else(|| HierarchyError::NotFound {
                name: name.to_string(),
            })?;
        self.role_index.retain(|_, owner| owner != name);
        Ok(removed)
    }

    /// Add a tier under an existing parent tier.
    ///
    /// The owning hierarchy is resolved from the parent's index entry. Returns
    /// the hierarchy name.
    pub fn add_tier(
        &mut self,
        role: RoleId,
        parent: RoleId,
        rules: TierRules,
    ) -> HierarchyResult<String> {
        ensure_assignable(role)?;
        if let Some(existing) = self.role_index.get(&role) {
            return Err(HierarchyError::RoleAlreadyInHierarchy {
                role,
                hierarchy: existing.clone(),
            });
        }

        let name = self
            .role_index
            .get(&parent)
            .cloned()
            .ok_or(HierarchyError::ParentNotIndexed { parent })?;
        let hierarchy =
            self.hierarchies
                .get_mut(&name)
                .ok_or_else(|| HierarchyError::HierarchyMissing {
                    role: parent,
                    hierarchy: name.clone(),
                })?;
        if !hierarchy.contains(parent) {
            return Err(HierarchyError::ParentMissingFromTree {
                parent,
                hierarchy: name,
            });
        }

        hierarchy.tiers.push(Tier::new(role, parent, rules));
        report_dropped(&name, hierarchy.rebuild());
        self.role_index.insert(role, name.clone());
        Ok(name)
    }

    /// Move a tier under a new parent and replace its rules.
    ///
    /// The tier and its new parent must belong to the same hierarchy, the tier
    /// must not be the root, and the new parent must not be the tier itself or
    /// one of its descendants. Returns the hierarchy name.
    pub fn modify_tier(
        &mut self,
        role: RoleId,
        new_parent: RoleId,
        rules: TierRules,
    ) -> HierarchyResult<String> {
        let name = self
            .role_index
            .get(&role)
            .cloned()
            .ok_or(HierarchyError::RoleNotIndexed { role })?;
        let parent_name = self
            .role_index
            .get(&new_parent)
            .cloned()
            .ok_or(HierarchyError::ParentNotIndexed { parent: new_parent })?;
        if name != parent_name {
            return Err(HierarchyError::CrossHierarchyReparent {
                role,
                parent: new_parent,
                hierarchy: name,
                parent_hierarchy: parent_name,
            });
        }

        let hierarchy =
            self.hierarchies
                .get_mut(&name)
                .ok_or_else(|| HierarchyError::HierarchyMissing {
                    role,
                    hierarchy: name.clone(),
                })?;
        let tier = hierarchy
            .tier(role)
            .ok_or_else(|| HierarchyError::TierMissingFromTree {
                role,
                hierarchy: name.clone(),
            })?;
        if tier.is_root() {
            return Err(HierarchyError::RootCannotBeReparented {
                role,
                hierarchy: name,
            });
        }
        if !hierarchy.contains(new_parent) {
            return Err(HierarchyError::ParentMissingFromTree {
                parent: new_parent,
                hierarchy: name,
            });
        }
        if hierarchy.is_ancestor_or_self(role, new_parent) {
            return Err(HierarchyError::WouldCreateCycle {
                role,
                parent: new_parent,
                hierarchy: name,
            });
        }

        if let Some(tier) = hierarchy.tier_mut(role) {
            tier.parent_role_id = new_parent;
            tier.rules = rules;
        }
        report_dropped(&name, hierarchy.rebuild());
        Ok(name)
    }

    /// Remove a non-root tier, reattaching its children to its parent.
    ///
    /// Returns the hierarchy name.
    pub fn remove_tier(&mut self, role: RoleId) -> HierarchyResult<String> {
        let name = self
            .role_index
            .get(&role)
            .cloned()
            .ok_or(HierarchyError::RoleNotIndexed { role })?;
        let hierarchy =
            self.hierarchies
                .get_mut(&name)
                .ok_or_else(|| HierarchyError::HierarchyMissing {
                    role,
                    hierarchy: name.clone(),
                })?;
        let tier = hierarchy
            .tier(role)
            .ok_or_else(|| HierarchyError::TierMissingFromTree {
                role,
                hierarchy: name.clone(),
            })?;
        if tier.is_root() {
            return Err(HierarchyError::RootCannotBeRemoved {
                role,
                hierarchy: name,
            });
        }

        let grandparent = tier.parent_role_id;
        hierarchy.tiers.retain(|t| t.role_id != role);
        for child in hierarchy
            .tiers
            .iter_mut()
            .filter(|t| t.parent_role_id == role)
        {
            child.parent_role_id = grandparent;
        }
        report_dropped(&name, hierarchy.rebuild());
        self.role_index.remove(&role);
        Ok(name)
    }

    /// Set or clear the audit channel. Returns the previous channel.
    pub fn set_log_channel(&mut self, channel: Option<ChannelId>) -> Option<ChannelId> {
        std::mem::replace(&mut self.log_channel, channel)
    }
}

fn ensure_assignable(role: RoleId) -> HierarchyResult<()> {
    if role.is_sentinel() {
        return Err(HierarchyError::ReservedRoleId { role });
    }
    Ok(())
}

fn report_dropped(hierarchy: &str, dropped: Vec<RoleId>) {
    if !dropped.is_empty() {
        warn!(
            hierarchy = %hierarchy,
            dropped = ?dropped,
            "Tiers unreachable from the root were dropped during depth rebuild"
        );
    }
}

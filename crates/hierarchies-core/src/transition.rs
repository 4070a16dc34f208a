//! Transition authorization
//!
//! Decides whether an actor may move a member to a destination tier with
//! promote, demote, assign or unassign. The decision is pure: callers supply a
//! snapshot of which hierarchy roles the actor and the member currently hold,
//! and receive either a [`TransitionPlan`] describing the role changes to apply
//! or a [`Rejection`] explaining why nothing may change.
//!
//! A holder of tier `A` may act on destination tier `D` when
//! `min < D.depth - A.depth <= max` for the window of `A` that matches the
//! command. Promote and assign consult the promotion window, demote and
//! unassign the demotion window.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;
use tracing::debug;

use crate::document::TenantDocument;
use crate::hierarchy::Hierarchy;
use crate::ids::RoleId;
use crate::tier::{Capability, DepthWindow, Tier};

/// Member transition commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    /// Replace the member's tier with its parent tier
    Promote,

    /// Replace the member's tier with one of its child tiers
    Demote,

    /// Grant a tier without removing another
    Assign,

    /// Revoke a tier without granting another
    Unassign,
}

impl TransitionKind {
    /// All transition kinds.
    pub const ALL: [TransitionKind; 4] = [
        TransitionKind::Promote,
        TransitionKind::Demote,
        TransitionKind::Assign,
        TransitionKind::Unassign,
    ];

    /// Window consulted by this command.
    pub fn capability(&self) -> Capability {
        match self {
            TransitionKind::Promote | TransitionKind::Assign => Capability::Promotion,
            TransitionKind::Demote | TransitionKind::Unassign => Capability::Demotion,
        }
    }

    /// Get string representation of the command.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::Promote => "promote",
            TransitionKind::Demote => "demote",
            TransitionKind::Assign => "assign",
            TransitionKind::Unassign => "unassign",
        }
    }

    /// Past tense used in outcome messages.
    pub fn past_tense(&self) -> &'static str {
        match self {
            TransitionKind::Promote => "promoted",
            TransitionKind::Demote => "demoted",
            TransitionKind::Assign => "assigned",
            TransitionKind::Unassign => "unassigned",
        }
    }

    /// Whether the member must hold an adjacent source tier.
    pub fn requires_source(&self) -> bool {
        matches!(self, TransitionKind::Promote | TransitionKind::Demote)
    }

    /// Whether the destination tier's flag permits this command.
    pub fn permitted_by(&self, tier: &Tier) -> bool {
        if self.requires_source() {
            tier.rules.allow_promote_demote
        } else {
            tier.rules.allow_assign_unassign
        }
    }

    /// Parse a command name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "promote" => Some(TransitionKind::Promote),
            "demote" => Some(TransitionKind::Demote),
            "assign" => Some(TransitionKind::Assign),
            "unassign" => Some(TransitionKind::Unassign),
            _ => None,
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Roles of one hierarchy held by the actor and by the member.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Membership {
    /// Roles held by the acting user
    pub author: HashSet<RoleId>,

    /// Roles held by the member being moved
    pub member: HashSet<RoleId>,
}

impl Membership {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add roles held by the actor.
    pub fn with_author_roles(mut self, roles: impl IntoIterator<Item = RoleId>) -> Self {
        self.author.extend(roles);
        self
    }

    /// Add roles held by the member.
    pub fn with_member_roles(mut self, roles: impl IntoIterator<Item = RoleId>) -> Self {
        self.member.extend(roles);
        self
    }
}

/// An authorized transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionPlan {
    /// Command that was authorized
    pub kind: TransitionKind,

    /// Hierarchy the destination belongs to
    pub hierarchy: String,

    /// Tier the member leaves (promote and demote only)
    pub source: Option<RoleId>,

    /// Destination tier
    pub target: RoleId,

    /// Actor tier whose window admitted the transition
    pub authorized_by: RoleId,

    /// Destination depth minus the authorizing tier's depth
    pub delta: i64,
}

/// Reasons a transition is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// Destination role is not part of any hierarchy
    #[error("Role {role} does not belong to a hierarchy")]
    NotInHierarchy {
        /// Destination role
        role: RoleId,
    },

    /// Role index points at a hierarchy or tier that does not exist
    #[error("Hierarchy \"{hierarchy}\" is corrupted: role {role} exists in the role index but not in the hierarchy tree")]
    CorruptIndex {
        /// Destination role
        role: RoleId,
        /// Hierarchy named by the index
        hierarchy: String,
    },

    /// A tier or parent role no longer exists on the platform
    #[error("Role {role} was deleted but still exists in hierarchy \"{hierarchy}\"")]
    DeletedRole {
        /// Missing role
        role: RoleId,
        /// Hierarchy referencing it
        hierarchy: String,
    },

    /// Actor holds no tier with the relevant window enabled
    #[error("You have no roles in hierarchy \"{hierarchy}\" that can {kind} members")]
    NoEligibleRole {
        /// Hierarchy of the destination
        hierarchy: String,
        /// Attempted command
        kind: TransitionKind,
    },

    /// Member does not hold the tier adjacent to the destination
    #[error("Cannot {kind} to role {target}: the member does not hold an adjacent role in \"{hierarchy}\"")]
    MissingAdjacentRole {
        /// Destination role
        target: RoleId,
        /// Hierarchy of the destination
        hierarchy: String,
        /// Attempted command
        kind: TransitionKind,
    },

    /// Member holds several tiers adjacent to the destination
    #[error("The member holds 2 or more roles at the same level of \"{hierarchy}\" and cannot be moved with {kind}")]
    AmbiguousMultipleTiers {
        /// Adjacent roles held by the member
        roles: Vec<RoleId>,
        /// Hierarchy of the destination
        hierarchy: String,
        /// Attempted command
        kind: TransitionKind,
    },

    /// Destination tier does not allow this command family
    #[error("Role {target} does not allow {kind}")]
    TransitionDisabled {
        /// Destination role
        target: RoleId,
        /// Attempted command
        kind: TransitionKind,
    },

    /// No actor tier's window admits the depth difference
    #[error(
        "Your role {tier} can only {kind} between {} and {} roles down, not {delta}",
        .window.min,
        .window.max
    )]
    OutOfWindow {
        /// First disqualifying actor tier
        tier: RoleId,
        /// Its window
        window: DepthWindow,
        /// Computed depth difference
        delta: i64,
        /// Attempted command
        kind: TransitionKind,
    },
}

impl Rejection {
    /// Check whether the rejection reveals a corrupted document.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Rejection::CorruptIndex { .. })
    }

    /// Get a stable reason code for audit records.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Rejection::NotInHierarchy { .. } => "NOT_IN_HIERARCHY",
            Rejection::CorruptIndex { .. } => "CORRUPT_INDEX",
            Rejection::DeletedRole { .. } => "DELETED_ROLE",
            Rejection::NoEligibleRole { .. } => "NO_ELIGIBLE_ROLE",
            Rejection::MissingAdjacentRole { .. } => "MISSING_ADJACENT_ROLE",
            Rejection::AmbiguousMultipleTiers { .. } => "AMBIGUOUS_MULTIPLE_TIERS",
            Rejection::TransitionDisabled { .. } => "TRANSITION_DISABLED",
            Rejection::OutOfWindow { .. } => "OUT_OF_WINDOW",
        }
    }
}

/// Resolve the hierarchy owning a destination role.
///
/// # Errors
///
/// `NotInHierarchy` when the role is not indexed, `CorruptIndex` when the
/// index names a hierarchy that does not exist.
pub fn resolve(doc: &TenantDocument, target: RoleId) -> Result<(&str, &Hierarchy), Rejection> {
    let name = doc
        .hierarchy_of(target)
        .ok_or(Rejection::NotInHierarchy { role: target })?;
    let hierarchy = doc.hierarchy(name).ok_or_else(|| Rejection::CorruptIndex {
        role: target,
        hierarchy: name.to_string(),
    })?;
    Ok((name, hierarchy))
}

/// Decide a transition within an already resolved hierarchy.
///
/// Checks run in a fixed order: destination tier present, actor eligibility,
/// member adjacency (promote and demote), destination allow flag, then the
/// depth window of each actor tier in tree order.
pub fn authorize(
    name: &str,
    hierarchy: &Hierarchy,
    kind: TransitionKind,
    target: RoleId,
    membership: &Membership,
) -> Result<TransitionPlan, Rejection> {
    let capability = kind.capability();

    let tier_target = hierarchy
        .tier(target)
        .ok_or_else(|| Rejection::CorruptIndex {
            role: target,
            hierarchy: name.to_string(),
        })?;

    let author_tiers: Vec<&Tier> = hierarchy
        .tiers
        .iter()
        .filter(|t| membership.author.contains(&t.role_id) && t.window(capability).is_enabled())
        .collect();
    if author_tiers.is_empty() {
        return Err(Rejection::NoEligibleRole {
            hierarchy: name.to_string(),
            kind,
        });
    }

    let source = if kind.requires_source() {
        Some(find_source(name, hierarchy, kind, tier_target, membership)?)
    } else {
        None
    };

    if !kind.permitted_by(tier_target) {
        return Err(Rejection::TransitionDisabled { target, kind });
    }

    let mut first_miss = None;
    for tier in &author_tiers {
        let window = tier.window(capability);
        let delta = i64::from(tier_target.depth) - i64::from(tier.depth);
        if window.admits(delta) {
            debug!(
                hierarchy = %name,
                kind = %kind,
                authorized_by = %tier.role_id,
                delta,
                "Transition admitted"
            );
            return Ok(TransitionPlan {
                kind,
                hierarchy: name.to_string(),
                source,
                target,
                authorized_by: tier.role_id,
                delta,
            });
        }
        first_miss.get_or_insert(Rejection::OutOfWindow {
            tier: tier.role_id,
            window,
            delta,
            kind,
        });
    }

    // author_tiers is non-empty, so at least one miss was recorded
    Err(first_miss.unwrap_or(Rejection::NoEligibleRole {
        hierarchy: name.to_string(),
        kind,
    }))
}

/// Resolve the hierarchy and decide in one step.
pub fn decide(
    doc: &TenantDocument,
    kind: TransitionKind,
    target: RoleId,
    membership: &Membership,
) -> Result<TransitionPlan, Rejection> {
    let (name, hierarchy) = resolve(doc, target)?;
    authorize(name, hierarchy, kind, target, membership)
}

fn find_source(
    name: &str,
    hierarchy: &Hierarchy,
    kind: TransitionKind,
    tier_target: &Tier,
    membership: &Membership,
) -> Result<RoleId, Rejection> {
    let adjacent: Vec<RoleId> = hierarchy
        .tiers
        .iter()
        .filter(|t| membership.member.contains(&t.role_id))
        .filter(|t| match kind {
            TransitionKind::Promote => t.parent_role_id == tier_target.role_id,
            _ => !tier_target.is_root() && t.role_id == tier_target.parent_role_id,
        })
        .map(|t| t.role_id)
        .collect();

    match adjacent.as_slice() {
        [] => Err(Rejection::MissingAdjacentRole {
            target: tier_target.role_id,
            hierarchy: name.to_string(),
            kind,
        }),
        [single] => Ok(*single),
        _ => Err(Rejection::AmbiguousMultipleTiers {
            roles: adjacent,
            hierarchy: name.to_string(),
            kind,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tier::TierRules;

    const R0: RoleId = RoleId(100);
    const R1: RoleId = RoleId(101);
    const R2: RoleId = RoleId(102);

    fn promo(min: i64, max: i64) -> TierRules {
        TierRules::new(DepthWindow::new(min, max), DepthWindow::DISABLED)
    }

    fn both(min: i64, max: i64) -> TierRules {
        TierRules::new(DepthWindow::new(min, max), DepthWindow::new(min, max))
    }

    /// Guild: R0 -> R1 -> R2, R1 and R2 with promotion window (0, 1]
    fn guild() -> TenantDocument {
        let mut doc = TenantDocument::new();
        doc.create_hierarchy("Guild", R0).unwrap();
        doc.add_tier(R1, R0, promo(0, 1)).unwrap();
        doc.add_tier(R2, R1, promo(0, 1)).unwrap();
        doc
    }

    fn held(author: &[RoleId], member: &[RoleId]) -> Membership {
        Membership::new()
            .with_author_roles(author.iter().copied())
            .with_member_roles(member.iter().copied())
    }

    #[test]
    fn test_kind_properties() {
        assert_eq!(TransitionKind::Promote.capability(), Capability::Promotion);
        assert_eq!(TransitionKind::Assign.capability(), Capability::Promotion);
        assert_eq!(TransitionKind::Demote.capability(), Capability::Demotion);
        assert_eq!(TransitionKind::Unassign.capability(), Capability::Demotion);
        for kind in TransitionKind::ALL {
            assert_eq!(TransitionKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(TransitionKind::parse("kick"), None);
    }

    #[test]
    fn test_not_in_hierarchy() {
        let doc = guild();
        let err = decide(&doc, TransitionKind::Promote, RoleId(999), &held(&[R0], &[])).unwrap_err();
        assert_eq!(err, Rejection::NotInHierarchy { role: RoleId(999) });
    }

    #[test]
    fn test_corrupt_index() {
        let mut doc = guild();
        doc.role_index.insert(RoleId(555), "Guild".to_string());
        doc.role_index.insert(RoleId(556), "Ghost".to_string());

        let err = decide(&doc, TransitionKind::Assign, RoleId(555), &held(&[R0], &[])).unwrap_err();
        assert!(err.is_corruption());
        let err = decide(&doc, TransitionKind::Assign, RoleId(556), &held(&[R0], &[])).unwrap_err();
        assert_eq!(
            err,
            Rejection::CorruptIndex {
                role: RoleId(556),
                hierarchy: "Ghost".to_string(),
            }
        );
    }

    #[test]
    fn test_no_eligible_role() {
        let doc = guild();
        // actor holds nothing in the hierarchy
        let err = decide(&doc, TransitionKind::Promote, R1, &held(&[], &[R2])).unwrap_err();
        assert!(matches!(err, Rejection::NoEligibleRole { .. }));

        // R2's demotion window is disabled
        let err = decide(&doc, TransitionKind::Demote, R2, &held(&[R2], &[R1])).unwrap_err();
        assert!(matches!(err, Rejection::NoEligibleRole { .. }));
    }

    #[test]
    fn test_promote_without_child_role_is_missing_adjacent() {
        let doc = guild();
        // member holds R2, which is not R0's direct child
        let err = decide(&doc, TransitionKind::Promote, R0, &held(&[R0], &[R2])).unwrap_err();
        assert_eq!(
            err,
            Rejection::MissingAdjacentRole {
                target: R0,
                hierarchy: "Guild".to_string(),
                kind: TransitionKind::Promote,
            }
        );
    }

    #[test]
    fn test_promote_to_root_checks_actor_window() {
        let doc = guild();
        // actor holds R0: delta = 0 - 0 = 0, outside the open window (0, 500]
        let err = decide(&doc, TransitionKind::Promote, R0, &held(&[R0], &[R1])).unwrap_err();
        assert_eq!(
            err,
            Rejection::OutOfWindow {
                tier: R0,
                window: DepthWindow::OPEN,
                delta: 0,
                kind: TransitionKind::Promote,
            }
        );
    }

    #[test]
    fn test_promote_one_level_below_actor() {
        let doc = guild();
        let plan = decide(&doc, TransitionKind::Promote, R1, &held(&[R0], &[R2])).unwrap();
        assert_eq!(
            plan,
            TransitionPlan {
                kind: TransitionKind::Promote,
                hierarchy: "Guild".to_string(),
                source: Some(R2),
                target: R1,
                authorized_by: R0,
                delta: 1,
            }
        );
    }

    #[test]
    fn test_window_boundaries() {
        let mut doc = TenantDocument::new();
        doc.create_hierarchy("Chain", RoleId(1)).unwrap();
        doc.add_tier(RoleId(2), RoleId(1), promo(1, 2)).unwrap();
        doc.add_tier(RoleId(3), RoleId(2), TierRules::default()).unwrap();
        doc.add_tier(RoleId(4), RoleId(3), TierRules::default()).unwrap();
        doc.add_tier(RoleId(5), RoleId(4), TierRules::default()).unwrap();

        // delta == min is rejected
        let err = decide(
            &doc,
            TransitionKind::Promote,
            RoleId(3),
            &held(&[RoleId(2)], &[RoleId(4)]),
        )
        .unwrap_err();
        assert!(matches!(err, Rejection::OutOfWindow { delta: 1, .. }));

        // delta == max is accepted
        let plan = decide(
            &doc,
            TransitionKind::Promote,
            RoleId(4),
            &held(&[RoleId(2)], &[RoleId(5)]),
        )
        .unwrap();
        assert_eq!(plan.delta, 2);
    }

    #[test]
    fn test_first_qualifying_author_tier_wins() {
        let mut doc = TenantDocument::new();
        doc.create_hierarchy("Guild", R0).unwrap();
        doc.add_tier(R1, R0, promo(1, 5)).unwrap();
        doc.add_tier(R2, R1, promo(0, 1)).unwrap();
        doc.add_tier(RoleId(103), R2, TierRules::default()).unwrap();
        doc.add_tier(RoleId(104), RoleId(103), TierRules::default())
            .unwrap();

        // R1 sees delta 2 (admitted), R2 sees delta 1 (admitted); R1 comes first
        let plan = decide(
            &doc,
            TransitionKind::Promote,
            RoleId(103),
            &held(&[R2, R1], &[RoleId(104)]),
        )
        .unwrap();
        assert_eq!(plan.authorized_by, R1);

        // R1 sees delta 1 (rejected), R2 sees delta 0 (rejected): first miss reported
        let err = decide(&doc, TransitionKind::Promote, R2, &held(&[R1, R2], &[RoleId(103)]))
            .unwrap_err();
        assert!(matches!(err, Rejection::OutOfWindow { tier, delta: 1, .. } if tier == R1));
    }

    #[test]
    fn test_promote_ambiguous_children() {
        let mut doc = guild();
        doc.add_tier(RoleId(110), R0, TierRules::default()).unwrap();

        let err = decide(&doc, TransitionKind::Promote, R0, &held(&[R0], &[R1, RoleId(110)]))
            .unwrap_err();
        assert!(matches!(
            err,
            Rejection::AmbiguousMultipleTiers { ref roles, .. } if roles.len() == 2
        ));
    }

    #[test]
    fn test_demote_uses_parent_of_destination() {
        let mut doc = TenantDocument::new();
        doc.create_hierarchy("Guild", R0).unwrap();
        doc.add_tier(R1, R0, both(0, 1)).unwrap();
        doc.add_tier(R2, R1, both(0, 1)).unwrap();

        let plan = decide(&doc, TransitionKind::Demote, R2, &held(&[R1], &[R1])).unwrap();
        assert_eq!(plan.source, Some(R1));
        assert_eq!(plan.authorized_by, R1);

        // member does not hold R1
        let err = decide(&doc, TransitionKind::Demote, R2, &held(&[R1], &[R0])).unwrap_err();
        assert!(matches!(err, Rejection::MissingAdjacentRole { .. }));

        // the root has no parent to demote from
        let err = decide(&doc, TransitionKind::Demote, R0, &held(&[R0], &[R0])).unwrap_err();
        assert!(matches!(err, Rejection::MissingAdjacentRole { .. }));
    }

    #[test]
    fn test_assign_and_unassign_need_no_source() {
        let doc = guild();
        let plan = decide(&doc, TransitionKind::Assign, R2, &held(&[R0], &[])).unwrap();
        assert_eq!(plan.source, None);
        assert_eq!(plan.delta, 2);

        let plan = decide(&doc, TransitionKind::Unassign, R2, &held(&[R0], &[R2])).unwrap();
        assert_eq!(plan.kind, TransitionKind::Unassign);
        assert_eq!(plan.source, None);
    }

    #[test]
    fn test_transition_disabled_by_destination_flag() {
        let mut doc = guild();
        doc.add_tier(
            RoleId(103),
            R2,
            TierRules::default().with_assign_unassign(false),
        )
        .unwrap();
        doc.modify_tier(R2, R1, promo(0, 1).with_promote_demote(false))
            .unwrap();

        let err = decide(&doc, TransitionKind::Assign, RoleId(103), &held(&[R0], &[])).unwrap_err();
        assert_eq!(
            err,
            Rejection::TransitionDisabled {
                target: RoleId(103),
                kind: TransitionKind::Assign,
            }
        );

        let err = decide(&doc, TransitionKind::Promote, R2, &held(&[R0], &[RoleId(103)]))
            .unwrap_err();
        assert!(matches!(err, Rejection::TransitionDisabled { .. }));

        // assign to R2 is still allowed
        assert!(decide(&doc, TransitionKind::Assign, R2, &held(&[R0], &[])).is_ok());
    }

    #[test]
    fn test_reason_codes_are_distinct() {
        let codes: HashSet<&str> = [
            Rejection::NotInHierarchy { role: R0 },
            Rejection::CorruptIndex {
                role: R0,
                hierarchy: String::new(),
            },
            Rejection::DeletedRole {
                role: R0,
                hierarchy: String::new(),
            },
            Rejection::TransitionDisabled {
                target: R0,
                kind: TransitionKind::Assign,
            },
        ]
        .iter()
        .map(Rejection::reason_code)
        .collect();
        assert_eq!(codes.len(), 4);
    }
}

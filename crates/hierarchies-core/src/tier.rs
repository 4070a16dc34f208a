//! Tiers and their depth windows
//!
//! A tier binds one platform role to a position in a hierarchy and carries the
//! rules that decide how far below itself its holders may promote or demote
//! other members.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::RoleId;

/// Window bound that disables a capability.
pub const DISABLED_BOUND: i64 = -1;

/// Upper bound given to the windows of a freshly created root tier.
pub const OPEN_WINDOW_MAX: i64 = 500;

/// Which pair of window fields a command consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Promotion window (used by promote and assign)
    Promotion,

    /// Demotion window (used by demote and unassign)
    Demotion,
}

impl Capability {
    /// Get string representation of the capability.
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Promotion => "promotion",
            Capability::Demotion => "demotion",
        }
    }
}

/// Range of depth differences a tier may act across.
///
/// A holder of the tier may act on a destination tier when
/// `min < destination.depth - own.depth <= max`. The lower bound is exclusive,
/// the upper bound inclusive. Either bound set to `-1` disables the window.
///
/// # Examples
///
/// ```
/// use hierarchies_core::DepthWindow;
///
/// let window = DepthWindow::new(0, 2);
/// assert!(!window.admits(0));
/// assert!(window.admits(1));
/// assert!(window.admits(2));
/// assert!(!window.admits(3));
///
/// assert!(!DepthWindow::DISABLED.is_enabled());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthWindow {
    /// Exclusive lower bound
    pub min: i64,

    /// Inclusive upper bound
    pub max: i64,
}

impl DepthWindow {
    /// Window that never admits anything.
    pub const DISABLED: DepthWindow = DepthWindow::new(DISABLED_BOUND, DISABLED_BOUND);

    /// Window given to root tiers on creation.
    pub const OPEN: DepthWindow = DepthWindow::new(0, OPEN_WINDOW_MAX);

    /// Create a window from its bounds.
    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    /// Check whether neither bound disables the window.
    pub fn is_enabled(&self) -> bool {
        self.min != DISABLED_BOUND && self.max != DISABLED_BOUND
    }

    /// Check whether a depth difference falls inside the window.
    pub fn admits(&self, delta: i64) -> bool {
        self.is_enabled() && self.min < delta && delta <= self.max
    }
}

impl fmt::Display for DepthWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_enabled() {
            write!(f, "{}..={}", self.min, self.max)
        } else {
            f.write_str("disabled")
        }
    }
}

fn allowed_by_default() -> bool {
    true
}

/// Rules attached to a tier.
///
/// Persisted flat inside the tier object. Older documents used snake_case keys
/// and had no allow flags; both are accepted on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierRules {
    /// Exclusive lower bound of the promotion window
    #[serde(alias = "promotion_min_depth")]
    pub promotion_min_depth: i64,

    /// Inclusive upper bound of the promotion window
    #[serde(alias = "promotion_max_depth")]
    pub promotion_max_depth: i64,

    /// Exclusive lower bound of the demotion window
    #[serde(alias = "demotion_min_depth")]
    pub demotion_min_depth: i64,

    /// Inclusive upper bound of the demotion window
    #[serde(alias = "demotion_max_depth")]
    pub demotion_max_depth: i64,

    /// Whether members may be promoted to or demoted to this tier
    #[serde(default = "allowed_by_default", alias = "allow_promote_demote")]
    pub allow_promote_demote: bool,

    /// Whether this tier may be assigned or unassigned directly
    #[serde(default = "allowed_by_default", alias = "allow_assign_unassign")]
    pub allow_assign_unassign: bool,
}

impl TierRules {
    /// Create rules from a promotion and a demotion window.
    pub fn new(promotion: DepthWindow, demotion: DepthWindow) -> Self {
        Self {
            promotion_min_depth: promotion.min,
            promotion_max_depth: promotion.max,
            demotion_min_depth: demotion.min,
            demotion_max_depth: demotion.max,
            allow_promote_demote: true,
            allow_assign_unassign: true,
        }
    }

    /// Rules of a root tier: both windows fully open.
    pub fn open() -> Self {
        Self::new(DepthWindow::OPEN, DepthWindow::OPEN)
    }

    /// Set whether the tier can be a promote/demote destination.
    pub fn with_promote_demote(mut self, allowed: bool) -> Self {
        self.allow_promote_demote = allowed;
        self
    }

    /// Set whether the tier can be assigned/unassigned.
    pub fn with_assign_unassign(mut self, allowed: bool) -> Self {
        self.allow_assign_unassign = allowed;
        self
    }

    /// Get the promotion window.
    pub fn promotion(&self) -> DepthWindow {
        DepthWindow::new(self.promotion_min_depth, self.promotion_max_depth)
    }

    /// Get the demotion window.
    pub fn demotion(&self) -> DepthWindow {
        DepthWindow::new(self.demotion_min_depth, self.demotion_max_depth)
    }

    /// Get the window for a capability.
    pub fn window(&self, capability: Capability) -> DepthWindow {
        match capability {
            Capability::Promotion => self.promotion(),
            Capability::Demotion => self.demotion(),
        }
    }
}

impl Default for TierRules {
    /// Both windows disabled, both allow flags set.
    fn default() -> Self {
        Self::new(DepthWindow::DISABLED, DepthWindow::DISABLED)
    }
}

/// One rank in a hierarchy.
///
/// `depth` is derived state. It is rewritten by every structural change and is
/// never trusted as input.
///
/// # Examples
///
/// ```
/// use hierarchies_core::{RoleId, Tier, TierRules};
///
/// let root = Tier::root(RoleId(10));
/// assert!(root.is_root());
///
/// let child = Tier::new(RoleId(11), RoleId(10), TierRules::default());
/// assert!(!child.is_root());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tier {
    /// Platform role bound to this tier
    #[serde(alias = "role_id")]
    pub role_id: RoleId,

    /// Parent role, or the `0` sentinel for the root
    #[serde(alias = "parent_role_id")]
    pub parent_role_id: RoleId,

    /// Distance from the root
    #[serde(default)]
    pub depth: u32,

    /// Promotion/demotion rules
    #[serde(flatten)]
    pub rules: TierRules,
}

impl Tier {
    /// Create a non-root tier. Its depth is a placeholder until recomputed.
    pub fn new(role_id: RoleId, parent_role_id: RoleId, rules: TierRules) -> Self {
        Self {
            role_id,
            parent_role_id,
            depth: 0,
            rules,
        }
    }

    /// Create a root tier with fully open windows.
    pub fn root(role_id: RoleId) -> Self {
        Self::new(role_id, RoleId::ROOT_PARENT, TierRules::open())
    }

    /// Check if this is the root tier of its hierarchy.
    pub fn is_root(&self) -> bool {
        self.parent_role_id.is_sentinel()
    }

    /// Get the window for a capability.
    pub fn window(&self, capability: Capability) -> DepthWindow {
        self.rules.window(capability)
    }
}

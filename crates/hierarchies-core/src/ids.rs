//! Identifier newtypes
//!
//! Platform identifiers are opaque 64-bit snowflakes. Wrapping them keeps role,
//! user, channel and tenant ids from being mixed up at call sites.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! snowflake_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Get the raw identifier.
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }
    };
}

snowflake_id!(
    /// Platform role identifier.
    ///
    /// The value `0` is reserved: as a parent id it marks a root tier, and no
    /// tier may use it as its own role.
    RoleId
);

snowflake_id!(
    /// Tenant (server) identifier. One document and one lock marker exist per tenant.
    TenantId
);

snowflake_id!(
    /// Platform user identifier.
    UserId
);

snowflake_id!(
    /// Platform channel identifier, used as the audit log destination.
    ChannelId
);

impl RoleId {
    /// Parent id carried by root tiers.
    pub const ROOT_PARENT: RoleId = RoleId(0);

    /// Check whether this id is the root-parent sentinel.
    pub fn is_sentinel(self) -> bool {
        self == Self::ROOT_PARENT
    }
}

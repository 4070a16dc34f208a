//! Audit event types
//!
//! Every structural change and every transition decision produces one audit
//! event. The envelope carries routing data (tenant, channel, topic) and a
//! rendered message; the typed [`HierarchyEvent`] is kept as the payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use hierarchies_core::{ChannelId, RoleId, TenantId, TransitionKind, TransitionPlan, UserId};

/// Audit event envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    /// Unique event ID
    pub id: Uuid,

    /// Event type (e.g., "tier.added", "transition.rejected")
    pub event_type: String,

    /// Tenant the command ran for
    pub tenant: TenantId,

    /// User who issued the command
    pub actor: Option<UserId>,

    /// Timestamp when event was created
    pub timestamp: DateTime<Utc>,

    /// Tenant's audit channel at the time of the event
    pub channel: Option<ChannelId>,

    /// Human-readable summary
    pub message: String,

    /// Event payload
    pub payload: serde_json::Value,
}

impl AuditEvent {
    /// Create a new event.
    pub fn new(
        event_type: impl Into<String>,
        tenant: TenantId,
        message: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            event_type: event_type.into(),
            tenant,
            actor: None,
            timestamp: Utc::now(),
            channel: None,
            message: message.into(),
            payload,
        }
    }

    /// Set the acting user.
    pub fn with_actor(mut self, actor: UserId) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Set the delivery channel.
    pub fn with_channel(mut self, channel: Option<ChannelId>) -> Self {
        self.channel = channel;
        self
    }

    /// Get the topic for this event.
    ///
    /// Topics are structured as: `{tenant}.{event_type}`
    pub fn topic(&self) -> String {
        format!("{}.{}", self.tenant, self.event_type)
    }

    /// Parse the payload into a specific type.
    pub fn parse_payload<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Typed audit events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HierarchyEvent {
    /// Hierarchy was created
    HierarchyCreated { hierarchy: String, root: RoleId },
    /// Hierarchy was deleted
    HierarchyDeleted { hierarchy: String, tiers: usize },
    /// Tier was added
    TierAdded {
        hierarchy: String,
        role: RoleId,
        parent: RoleId,
    },
    /// Tier was moved or its rules replaced
    TierModified {
        hierarchy: String,
        role: RoleId,
        parent: RoleId,
    },
    /// Tier was removed and its children spliced upward
    TierRemoved { hierarchy: String, role: RoleId },
    /// Audit channel was changed
    LogChannelSet { channel: Option<ChannelId> },
    /// Operator cleared the tenant lock
    LockCleared { was_locked: bool },
    /// Transition was authorized and applied
    TransitionApplied { member: UserId, plan: TransitionPlan },
    /// Transition was authorized but the hook declined to report success
    TransitionDeclined {
        member: UserId,
        kind: TransitionKind,
        target: RoleId,
    },
    /// Transition was refused
    TransitionRejected {
        member: UserId,
        kind: TransitionKind,
        target: RoleId,
        reason: String,
        detail: String,
    },
    /// Structural command failed
    CommandFailed {
        command: String,
        error_code: String,
        detail: String,
    },
}

impl HierarchyEvent {
    /// Event type string used for routing.
    pub fn event_type(&self) -> &'static str {
        match self {
            HierarchyEvent::HierarchyCreated { .. } => "hierarchy.created",
            HierarchyEvent::HierarchyDeleted { .. } => "hierarchy.deleted",
            HierarchyEvent::TierAdded { .. } => "tier.added",
            HierarchyEvent::TierModified { .. } => "tier.modified",
            HierarchyEvent::TierRemoved { .. } => "tier.removed",
            HierarchyEvent::LogChannelSet { .. } => "log_channel.set",
            HierarchyEvent::LockCleared { .. } => "lock.cleared",
            HierarchyEvent::TransitionApplied { .. } => "transition.applied",
            HierarchyEvent::TransitionDeclined { .. } => "transition.declined",
            HierarchyEvent::TransitionRejected { .. } => "transition.rejected",
            HierarchyEvent::CommandFailed { .. } => "command.failed",
        }
    }

    /// Render the audit message for an actor.
    pub fn describe(&self, actor: UserId) -> String {
        match self {
            HierarchyEvent::HierarchyCreated { hierarchy, root } => {
                format!("User {actor} created hierarchy {hierarchy} with root role {root}")
            }
            HierarchyEvent::HierarchyDeleted { hierarchy, tiers } => {
                format!("User {actor} deleted hierarchy {hierarchy} ({tiers} tiers)")
            }
            HierarchyEvent::TierAdded {
                hierarchy,
                role,
                parent,
            } => format!("User {actor} added role {role} under {parent} in hierarchy {hierarchy}"),
            HierarchyEvent::TierModified {
                hierarchy,
                role,
                parent,
            } => format!("User {actor} modified role {role} (parent {parent}) in hierarchy {hierarchy}"),
            HierarchyEvent::TierRemoved { hierarchy, role } => {
                format!("User {actor} removed role {role} from hierarchy {hierarchy}")
            }
            HierarchyEvent::LogChannelSet { channel: Some(channel) } => {
                format!("User {actor} set the audit channel to {channel}")
            }
            HierarchyEvent::LogChannelSet { channel: None } => {
                format!("User {actor} cleared the audit channel")
            }
            HierarchyEvent::LockCleared { was_locked: true } => {
                format!("User {actor} cleared the tenant lock")
            }
            HierarchyEvent::LockCleared { was_locked: false } => {
                format!("User {actor} ran unlock but no lock was held")
            }
            HierarchyEvent::TransitionApplied { member, plan } => format!(
                "User {actor} {} user {member} {} role {} in hierarchy {}",
                plan.kind.past_tense(),
                if plan.kind == TransitionKind::Unassign { "from" } else { "to" },
                plan.target,
                plan.hierarchy
            ),
            HierarchyEvent::TransitionDeclined {
                member,
                kind,
                target,
            } => format!("User {actor} attempted to {kind} user {member} to role {target}; the hook declined"),
            HierarchyEvent::TransitionRejected {
                member,
                kind,
                target,
                detail,
                ..
            } => format!("User {actor} could not {kind} user {member} to role {target} because: {detail}"),
            HierarchyEvent::CommandFailed {
                command, detail, ..
            } => format!("User {actor} could not run {command}: {detail}"),
        }
    }

    /// Convert to an audit envelope.
    pub fn to_event(&self, tenant: TenantId, actor: UserId) -> AuditEvent {
        let payload = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        AuditEvent::new(self.event_type(), tenant, self.describe(actor), payload).with_actor(actor)
    }
}

//! Transition hooks
//!
//! Once a transition is authorized, the service hands the role change to the
//! tenant's [`TransitionHooks`]. Each hook method receives the context of the
//! transition and the default mutation; the provided implementations simply
//! run it. A tenant can override a method to wrap, replace or skip the change.
//! Returning `Ok(false)` means the hook handled its own messaging and the
//! service reports the transition as declined.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use hierarchies_core::{RoleId, TenantId, TransitionKind, TransitionPlan, UserId};

use crate::platform::{Platform, PlatformResult};

/// What a hook is being asked about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookContext {
    /// Tenant
    pub tenant: TenantId,
    /// User who issued the command
    pub actor: UserId,
    /// Member being moved
    pub member: UserId,
    /// Command
    pub kind: TransitionKind,
    /// Hierarchy of the destination
    pub hierarchy: String,
    /// Role the member leaves, for promote and demote
    pub source: Option<RoleId>,
    /// Destination role
    pub target: RoleId,
}

impl HookContext {
    /// Build the context for an authorized plan.
    pub fn new(tenant: TenantId, actor: UserId, member: UserId, plan: &TransitionPlan) -> Self {
        Self {
            tenant,
            actor,
            member,
            kind: plan.kind,
            hierarchy: plan.hierarchy.clone(),
            source: plan.source,
            target: plan.target,
        }
    }
}

/// Role changes a transition performs by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleMutation {
    /// Revoke one role and grant another (promote, demote)
    Move { remove: RoleId, add: RoleId },
    /// Grant a role (assign)
    Grant(RoleId),
    /// Revoke a role (unassign)
    Revoke(RoleId),
}

impl RoleMutation {
    /// Default mutation for an authorized plan.
    pub fn for_plan(plan: &TransitionPlan) -> Self {
        match (plan.kind, plan.source) {
            (TransitionKind::Unassign, _) => RoleMutation::Revoke(plan.target),
            (_, Some(source)) => RoleMutation::Move {
                remove: source,
                add: plan.target,
            },
            (_, None) => RoleMutation::Grant(plan.target),
        }
    }

    /// Apply the mutation through the platform.
    pub async fn apply(
        &self,
        platform: &dyn Platform,
        tenant: TenantId,
        member: UserId,
    ) -> PlatformResult<()> {
        match *self {
            RoleMutation::Move { remove, add } => {
                platform.remove_role(tenant, member, remove).await?;
                platform.add_role(tenant, member, add).await
            }
            RoleMutation::Grant(role) => platform.add_role(tenant, member, role).await,
            RoleMutation::Revoke(role) => platform.remove_role(tenant, member, role).await,
        }
    }
}

/// The default mutation, ready to run.
pub struct DefaultMutation<'a> {
    platform: &'a dyn Platform,
    tenant: TenantId,
    member: UserId,
    mutation: RoleMutation,
}

impl<'a> DefaultMutation<'a> {
    /// Bind a mutation to the platform and member it applies to.
    pub fn new(
        platform: &'a dyn Platform,
        tenant: TenantId,
        member: UserId,
        mutation: RoleMutation,
    ) -> Self {
        Self {
            platform,
            tenant,
            member,
            mutation,
        }
    }

    /// Get the mutation that would be applied.
    pub fn mutation(&self) -> RoleMutation {
        self.mutation
    }

    /// Apply the mutation and report it as applied.
    pub async fn run(self) -> PlatformResult<bool> {
        self.mutation
            .apply(self.platform, self.tenant, self.member)
            .await?;
        Ok(true)
    }
}

/// Per-command customization of role changes.
#[async_trait]
pub trait TransitionHooks: Send + Sync {
    /// Called for an authorized promote.
    async fn promote(&self, _ctx: &HookContext, default: DefaultMutation<'_>) -> PlatformResult<bool> {
        default.run().await
    }

    /// Called for an authorized demote.
    async fn demote(&self, _ctx: &HookContext, default: DefaultMutation<'_>) -> PlatformResult<bool> {
        default.run().await
    }

    /// Called for an authorized assign.
    async fn assign(&self, _ctx: &HookContext, default: DefaultMutation<'_>) -> PlatformResult<bool> {
        default.run().await
    }

    /// Called for an authorized unassign.
    async fn unassign(&self, _ctx: &HookContext, default: DefaultMutation<'_>) -> PlatformResult<bool> {
        default.run().await
    }
}

/// Hooks that always run the default mutation.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl TransitionHooks for DefaultHooks {}

/// Dispatch a transition to the hook method for its command.
pub async fn run_hook(
    hooks: &dyn TransitionHooks,
    ctx: &HookContext,
    default: DefaultMutation<'_>,
) -> PlatformResult<bool> {
    match ctx.kind {
        TransitionKind::Promote => hooks.promote(ctx, default).await,
        TransitionKind::Demote => hooks.demote(ctx, default).await,
        TransitionKind::Assign => hooks.assign(ctx, default).await,
        TransitionKind::Unassign => hooks.unassign(ctx, default).await,
    }
}

/// Hooks by tenant, falling back to [`DefaultHooks`].
#[derive(Clone)]
pub struct HookRegistry {
    hooks: Arc<RwLock<HashMap<TenantId, Arc<dyn TransitionHooks>>>>,
    fallback: Arc<dyn TransitionHooks>,
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry").finish_non_exhaustive()
    }
}

impl HookRegistry {
    /// Create a registry with no tenant overrides.
    pub fn new() -> Self {
        Self::with_fallback(Arc::new(DefaultHooks))
    }

    /// Create a registry with a custom fallback.
    pub fn with_fallback(fallback: Arc<dyn TransitionHooks>) -> Self {
        Self {
            hooks: Arc::new(RwLock::new(HashMap::new())),
            fallback,
        }
    }

    /// Register hooks for a tenant, replacing any previous ones.
    pub async fn register(&self, tenant: TenantId, hooks: Arc<dyn TransitionHooks>) {
        self.hooks.write().await.insert(tenant, hooks);
    }

    /// Remove a tenant's hooks. Returns whether any were registered.
    pub async fn unregister(&self, tenant: TenantId) -> bool {
        self.hooks.write().await.remove(&tenant).is_some()
    }

    /// Get the hooks for a tenant.
    pub async fn get(&self, tenant: TenantId) -> Arc<dyn TransitionHooks> {
        self.hooks
            .read()
            .await
            .get(&tenant)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

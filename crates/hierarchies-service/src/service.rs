//! Hierarchy command service
//!
//! [`HierarchyService`] is the boundary a command adapter calls into. It is
//! built once at startup from its collaborators and receives the tenant and
//! acting user on every call.
//!
//! Structural commands run inside the tenant lock: acquire, load, mutate,
//! save, release. The lock is released on every path, including rejections.
//! Transition commands read the document without locking, decide, and hand
//! the role change to the tenant's hooks.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use hierarchies_core::{
    authorize, resolve, ChannelId, Hierarchy, HierarchyError, HierarchyResult, IndexMismatch,
    Membership, Rejection, RoleId, TenantDocument, TenantId, TierRules, TransitionKind,
    TransitionPlan, UserId,
};
use hierarchies_events::{AuditSink, HierarchyEvent, MemoryAuditBus};
use hierarchies_store::{FileTenantStore, TenantStore};

use crate::config::{ConfigError, ServiceConfig};
use crate::error::{ServiceError, ServiceResult};
use crate::hooks::{run_hook, DefaultMutation, HookContext, HookRegistry, RoleMutation};
use crate::platform::{Permission, Platform};
use crate::render::{render_hierarchy, render_list};

/// Result of a transition command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Authorized and applied by the hook
    Applied(TransitionPlan),
    /// Authorized, but the hook reported that it handled the outcome itself
    Declined(TransitionPlan),
    /// Refused before any role changed
    Rejected(Rejection),
}

impl TransitionOutcome {
    /// Check if the role change was applied.
    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied(_))
    }

    /// Get the rejection, if any.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            TransitionOutcome::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }

    /// Reply for the invoking user. Declined outcomes produce none.
    pub fn reply(&self, member: UserId) -> Option<String> {
        match self {
            TransitionOutcome::Applied(plan) => {
                let mut verb = plan.kind.past_tense().to_string();
                if let Some(first) = verb.get_mut(0..1) {
                    first.make_ascii_uppercase();
                }
                let preposition = if plan.kind == TransitionKind::Unassign {
                    "from"
                } else {
                    "to"
                };
                Some(format!("{verb} user {member} {preposition} role {}.", plan.target))
            }
            TransitionOutcome::Declined(_) => None,
            TransitionOutcome::Rejected(rejection) => Some(rejection.to_string()),
        }
    }
}

/// Value produced by a committed structural change.
struct Committed<T> {
    value: T,
    channel: Option<ChannelId>,
}

/// Hierarchy command service.
pub struct HierarchyService {
    store: Arc<dyn TenantStore>,
    platform: Arc<dyn Platform>,
    audit: Arc<dyn AuditSink>,
    hooks: HookRegistry,
    config: ServiceConfig,
}

impl std::fmt::Debug for HierarchyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HierarchyService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HierarchyService {
    /// Create a service from its collaborators.
    pub fn new(
        store: Arc<dyn TenantStore>,
        platform: Arc<dyn Platform>,
        audit: Arc<dyn AuditSink>,
        hooks: HookRegistry,
        config: ServiceConfig,
    ) -> Self {
        Self {
            store,
            platform,
            audit,
            hooks,
            config,
        }
    }

    /// Create a file-backed service with an in-memory audit bus.
    ///
    /// Returns the bus as well so the caller can subscribe to audit events.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting reported by [`ServiceConfig::validate`].
    pub fn from_config(
        config: ServiceConfig,
        platform: Arc<dyn Platform>,
    ) -> Result<(Self, Arc<MemoryAuditBus>), ConfigError> {
        config.validate()?;
        let store = Arc::new(FileTenantStore::new(config.data_dir.clone()));
        let bus = Arc::new(MemoryAuditBus::with_capacity(config.audit_capacity));
        let service = Self::new(store, platform, bus.clone(), HookRegistry::new(), config);
        Ok((service, bus))
    }

    /// Get the hook registry.
    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Get the configuration.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Read-only commands
    // ------------------------------------------------------------------

    /// List hierarchy names, sorted.
    #[instrument(skip(self), fields(tenant = %tenant, actor = %actor))]
    pub async fn list(&self, tenant: TenantId, actor: UserId) -> ServiceResult<String> {
        self.require_manage(tenant, actor).await?;
        let doc = self.store.load(tenant).await?;
        info!(count = doc.hierarchies.len(), "Listed hierarchies");
        Ok(render_list(doc.names()))
    }

    /// Render one hierarchy as message chunks.
    ///
    /// Tiers whose role no longer exists on the platform are marked.
    #[instrument(skip(self), fields(tenant = %tenant, actor = %actor))]
    pub async fn show(&self, tenant: TenantId, actor: UserId, name: &str) -> ServiceResult<Vec<String>> {
        self.require_manage(tenant, actor).await?;
        let doc = self.store.load(tenant).await?;
        let hierarchy = doc.hierarchy(name).ok_or_else(|| HierarchyError::NotFound {
            name: name.to_string(),
        })?;

        let mut deleted = HashSet::new();
        for role in hierarchy.role_ids() {
            if !self.platform.role_exists(tenant, role).await? {
                deleted.insert(role);
            }
        }

        info!(hierarchy = %name, tiers = hierarchy.tiers.len(), "Showed hierarchy");
        Ok(render_hierarchy(
            name,
            hierarchy,
            &deleted,
            self.config.max_message_len,
        ))
    }

    /// Report disagreements between the role index and the trees.
    #[instrument(skip(self), fields(tenant = %tenant, actor = %actor))]
    pub async fn index_mismatches(
        &self,
        tenant: TenantId,
        actor: UserId,
    ) -> ServiceResult<Vec<IndexMismatch>> {
        self.require_manage(tenant, actor).await?;
        let mismatches = self.store.load(tenant).await?.index_mismatches();
        if !mismatches.is_empty() {
            warn!(count = mismatches.len(), "Role index disagrees with hierarchy trees");
        }
        Ok(mismatches)
    }

    // ------------------------------------------------------------------
    // Structural commands
    // ------------------------------------------------------------------

    /// Create a hierarchy rooted at `root`.
    #[instrument(skip(self), fields(tenant = %tenant, actor = %actor))]
    pub async fn create_hierarchy(
        &self,
        tenant: TenantId,
        actor: UserId,
        name: &str,
        root: RoleId,
    ) -> ServiceResult<()> {
        self.require_manage(tenant, actor).await?;
        let result = self
            .mutate(tenant, |doc| doc.create_hierarchy(name, root))
            .await;
        self.finish("create", tenant, actor, result, |_| {
            HierarchyEvent::HierarchyCreated {
                hierarchy: name.to_string(),
                root,
            }
        })
        .await
    }

    /// Delete a hierarchy and all of its index entries.
    #[instrument(skip(self), fields(tenant = %tenant, actor = %actor))]
    pub async fn delete_hierarchy(
        &self,
        tenant: TenantId,
        actor: UserId,
        name: &str,
    ) -> ServiceResult<Hierarchy> {
        self.require_manage(tenant, actor).await?;
        let result = self.mutate(tenant, |doc| doc.delete_hierarchy(name)).await;
        self.finish("delete", tenant, actor, result, |removed| {
            HierarchyEvent::HierarchyDeleted {
                hierarchy: name.to_string(),
                tiers: removed.tiers.len(),
            }
        })
        .await
    }

    /// Add a tier under `parent`. Returns the hierarchy name.
    #[instrument(skip(self, rules), fields(tenant = %tenant, actor = %actor))]
    pub async fn add_tier(
        &self,
        tenant: TenantId,
        actor: UserId,
        role: RoleId,
        parent: RoleId,
        rules: TierRules,
    ) -> ServiceResult<String> {
        self.require_manage(tenant, actor).await?;
        let result = self
            .mutate(tenant, |doc| doc.add_tier(role, parent, rules))
            .await;
        self.finish("add", tenant, actor, result, |hierarchy| HierarchyEvent::TierAdded {
            hierarchy: hierarchy.clone(),
            role,
            parent,
        })
        .await
    }

    /// Move a tier under `parent` and replace its rules. Returns the hierarchy name.
    #[instrument(skip(self, rules), fields(tenant = %tenant, actor = %actor))]
    pub async fn modify_tier(
        &self,
        tenant: TenantId,
        actor: UserId,
        role: RoleId,
        parent: RoleId,
        rules: TierRules,
    ) -> ServiceResult<String> {
        self.require_manage(tenant, actor).await?;
        let result = self
            .mutate(tenant, |doc| doc.modify_tier(role, parent, rules))
            .await;
        self.finish("modify", tenant, actor, result, |hierarchy| {
            HierarchyEvent::TierModified {
                hierarchy: hierarchy.clone(),
                role,
                parent,
            }
        })
        .await
    }

    /// Remove a tier, splicing its children onto its parent. Returns the hierarchy name.
    #[instrument(skip(self), fields(tenant = %tenant, actor = %actor))]
    pub async fn remove_tier(
        &self,
        tenant: TenantId,
        actor: UserId,
        role: RoleId,
    ) -> ServiceResult<String> {
        self.require_manage(tenant, actor).await?;
        let result = self.mutate(tenant, |doc| doc.remove_tier(role)).await;
        self.finish("remove", tenant, actor, result, |hierarchy| {
            HierarchyEvent::TierRemoved {
                hierarchy: hierarchy.clone(),
                role,
            }
        })
        .await
    }

    /// Set or clear the audit channel. Returns the previous channel.
    #[instrument(skip(self), fields(tenant = %tenant, actor = %actor))]
    pub async fn set_log_channel(
        &self,
        tenant: TenantId,
        actor: UserId,
        channel: Option<ChannelId>,
    ) -> ServiceResult<Option<ChannelId>> {
        self.require_manage(tenant, actor).await?;
        let result = self
            .mutate(tenant, |doc| Ok(doc.set_log_channel(channel)))
            .await;
        self.finish("setlogger", tenant, actor, result, |_| {
            HierarchyEvent::LogChannelSet { channel }
        })
        .await
    }

    /// Clear a stale tenant lock. Returns whether a lock was present.
    #[instrument(skip(self), fields(tenant = %tenant, actor = %actor))]
    pub async fn unlock(&self, tenant: TenantId, actor: UserId) -> ServiceResult<bool> {
        self.require_manage(tenant, actor).await?;

        if let Some(marker) = self.store.lock_marker(tenant).await? {
            info!(
                holder = %marker.hostname,
                pid = marker.pid,
                since = %marker.acquired_at,
                "Clearing lock"
            );
        }
        let was_locked = self.store.release_lock(tenant).await?;

        let channel = self.log_channel(tenant).await;
        self.publish(tenant, actor, channel, HierarchyEvent::LockCleared { was_locked })
            .await;
        info!(was_locked, "Unlock completed");
        Ok(was_locked)
    }

    // ------------------------------------------------------------------
    // Transition commands
    // ------------------------------------------------------------------

    /// Move `member` from the child of `target` up to `target`.
    pub async fn promote(
        &self,
        tenant: TenantId,
        actor: UserId,
        member: UserId,
        target: RoleId,
    ) -> ServiceResult<TransitionOutcome> {
        self.transition(TransitionKind::Promote, tenant, actor, member, target)
            .await
    }

    /// Move `member` from the parent of `target` down to `target`.
    pub async fn demote(
        &self,
        tenant: TenantId,
        actor: UserId,
        member: UserId,
        target: RoleId,
    ) -> ServiceResult<TransitionOutcome> {
        self.transition(TransitionKind::Demote, tenant, actor, member, target)
            .await
    }

    /// Grant `target` to `member`.
    pub async fn assign(
        &self,
        tenant: TenantId,
        actor: UserId,
        member: UserId,
        target: RoleId,
    ) -> ServiceResult<TransitionOutcome> {
        self.transition(TransitionKind::Assign, tenant, actor, member, target)
            .await
    }

    /// Revoke `target` from `member`.
    pub async fn unassign(
        &self,
        tenant: TenantId,
        actor: UserId,
        member: UserId,
        target: RoleId,
    ) -> ServiceResult<TransitionOutcome> {
        self.transition(TransitionKind::Unassign, tenant, actor, member, target)
            .await
    }

    /// Decide and apply a transition.
    #[instrument(skip(self), fields(tenant = %tenant, actor = %actor, member = %member, kind = %kind))]
    pub async fn transition(
        &self,
        kind: TransitionKind,
        tenant: TenantId,
        actor: UserId,
        member: UserId,
        target: RoleId,
    ) -> ServiceResult<TransitionOutcome> {
        let doc = self.store.load(tenant).await?;
        let result = self.run_transition(&doc, kind, tenant, actor, member, target).await;

        let event = match &result {
            Ok(TransitionOutcome::Applied(plan)) => {
                info!(
                    hierarchy = %plan.hierarchy,
                    role = %target,
                    authorized_by = %plan.authorized_by,
                    "Transition applied"
                );
                HierarchyEvent::TransitionApplied {
                    member,
                    plan: plan.clone(),
                }
            }
            Ok(TransitionOutcome::Declined(plan)) => {
                info!(hierarchy = %plan.hierarchy, role = %target, "Transition declined by hook");
                HierarchyEvent::TransitionDeclined {
                    member,
                    kind,
                    target,
                }
            }
            Ok(TransitionOutcome::Rejected(rejection)) => {
                warn!(
                    role = %target,
                    reason = rejection.reason_code(),
                    "Transition rejected: {rejection}"
                );
                HierarchyEvent::TransitionRejected {
                    member,
                    kind,
                    target,
                    reason: rejection.reason_code().to_string(),
                    detail: rejection.to_string(),
                }
            }
            Err(e) => {
                error!(role = %target, error = %e, "Transition failed");
                HierarchyEvent::CommandFailed {
                    command: kind.as_str().to_string(),
                    error_code: e.error_code().to_string(),
                    detail: e.to_string(),
                }
            }
        };
        self.publish(tenant, actor, doc.log_channel, event).await;

        result
    }

    async fn run_transition(
        &self,
        doc: &TenantDocument,
        kind: TransitionKind,
        tenant: TenantId,
        actor: UserId,
        member: UserId,
        target: RoleId,
    ) -> ServiceResult<TransitionOutcome> {
        let (name, hierarchy) = match resolve(doc, target) {
            Ok(resolved) => resolved,
            Err(rejection) => return Ok(TransitionOutcome::Rejected(rejection)),
        };

        if let Some(role) = self.first_deleted_role(tenant, hierarchy).await? {
            return Ok(TransitionOutcome::Rejected(Rejection::DeletedRole {
                role,
                hierarchy: name.to_string(),
            }));
        }

        let membership = self.membership(tenant, actor, member, hierarchy).await?;
        let plan = match authorize(name, hierarchy, kind, target, &membership) {
            Ok(plan) => plan,
            Err(rejection) => return Ok(TransitionOutcome::Rejected(rejection)),
        };

        let hooks = self.hooks.get(tenant).await;
        let ctx = HookContext::new(tenant, actor, member, &plan);
        let default = DefaultMutation::new(
            self.platform.as_ref(),
            tenant,
            member,
            RoleMutation::for_plan(&plan),
        );
        debug!(mutation = ?default.mutation(), "Running transition hook");

        if run_hook(hooks.as_ref(), &ctx, default).await? {
            Ok(TransitionOutcome::Applied(plan))
        } else {
            Ok(TransitionOutcome::Declined(plan))
        }
    }

    /// Find the first tier or parent role that no longer exists on the platform.
    async fn first_deleted_role(
        &self,
        tenant: TenantId,
        hierarchy: &Hierarchy,
    ) -> ServiceResult<Option<RoleId>> {
        let mut checked = HashSet::new();
        for tier in &hierarchy.tiers {
            let mut roles = vec![tier.role_id];
            if !tier.is_root() {
                roles.push(tier.parent_role_id);
            }
            for role in roles {
                if checked.insert(role) && !self.platform.role_exists(tenant, role).await? {
                    return Ok(Some(role));
                }
            }
        }
        Ok(None)
    }

    /// Snapshot which of the hierarchy's roles the actor and member hold.
    async fn membership(
        &self,
        tenant: TenantId,
        actor: UserId,
        member: UserId,
        hierarchy: &Hierarchy,
    ) -> ServiceResult<Membership> {
        let mut membership = Membership::new();
        for role in hierarchy.role_ids() {
            if self.platform.has_role(tenant, actor, role).await? {
                membership.author.insert(role);
            }
            if self.platform.has_role(tenant, member, role).await? {
                membership.member.insert(role);
            }
        }
        Ok(membership)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    async fn require_manage(&self, tenant: TenantId, actor: UserId) -> ServiceResult<()> {
        let permission = Permission::ManageHierarchies;
        if self
            .platform
            .check_permission(tenant, actor, permission)
            .await?
        {
            return Ok(());
        }
        warn!(tenant = %tenant, actor = %actor, "Permission denied");
        Err(ServiceError::PermissionDenied {
            user: actor,
            permission,
        })
    }

    /// Run a structural change inside the tenant lock.
    async fn mutate<T, F>(&self, tenant: TenantId, change: F) -> ServiceResult<Committed<T>>
    where
        F: FnOnce(&mut TenantDocument) -> HierarchyResult<T> + Send,
        T: Send,
    {
        let handle = self.store.acquire_lock(tenant).await?;
        let result = self.load_change_save(tenant, change).await;

        match self.store.release(&handle).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(tenant = %tenant, token = %handle.token, "Lock was cleared while the command ran");
            }
            Err(e) => {
                error!(tenant = %tenant, error = %e, "Failed to release lock; run unlock to clear it");
            }
        }
        result
    }

    async fn load_change_save<T, F>(&self, tenant: TenantId, change: F) -> ServiceResult<Committed<T>>
    where
        F: FnOnce(&mut TenantDocument) -> HierarchyResult<T> + Send,
        T: Send,
    {
        let mut doc = self.store.load(tenant).await?;
        let value = change(&mut doc)?;
        self.store.save(tenant, &doc).await?;
        Ok(Committed {
            value,
            channel: doc.log_channel,
        })
    }

    /// Log and audit the result of a structural command.
    async fn finish<T>(
        &self,
        command: &str,
        tenant: TenantId,
        actor: UserId,
        result: ServiceResult<Committed<T>>,
        event: impl FnOnce(&T) -> HierarchyEvent,
    ) -> ServiceResult<T> {
        match result {
            Ok(committed) => {
                let event = event(&committed.value);
                info!(command, event_type = event.event_type(), "Command completed");
                self.publish(tenant, actor, committed.channel, event).await;
                Ok(committed.value)
            }
            Err(e) => {
                if e.is_user_error() {
                    warn!(command, error_code = e.error_code(), "Command rejected: {e}");
                } else {
                    error!(command, error_code = e.error_code(), "Command failed: {e}");
                }
                let channel = self.log_channel(tenant).await;
                let failed = HierarchyEvent::CommandFailed {
                    command: command.to_string(),
                    error_code: e.error_code().to_string(),
                    detail: e.to_string(),
                };
                self.publish(tenant, actor, channel, failed).await;
                Err(e)
            }
        }
    }

    /// Current audit channel, if the document can be read.
    async fn log_channel(&self, tenant: TenantId) -> Option<ChannelId> {
        self.store
            .load(tenant)
            .await
            .ok()
            .and_then(|doc| doc.log_channel)
    }

    /// Publish an audit event. Sink failures are logged, never returned.
    async fn publish(
        &self,
        tenant: TenantId,
        actor: UserId,
        channel: Option<ChannelId>,
        event: HierarchyEvent,
    ) {
        let envelope = event.to_event(tenant, actor).with_channel(channel);
        if let Err(e) = self.audit.log_event(envelope).await {
            warn!(tenant = %tenant, error = %e, "Failed to record audit event");
        }
    }
}

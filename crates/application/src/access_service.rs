use std::collections::BTreeSet;
use std::sync::Arc;

use helpdesk_core::{AppError, AppResult, NonEmptyString, OrgId, ProjectId, RoleId, UserId, UserIdentity};
use helpdesk_domain::{Permission, PermissionSlug, ScopeContext};
use tracing::{debug, info};

use crate::{PermissionCache, PermissionSnapshot, ScopeResolver};

/// What a guarded operation demands. Every list is OR-combined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessRequirement {
    /// At least one of the permissions.
    AnyPermission(Vec<PermissionSlug>),
    /// At least one of the role names.
    AnyRole(Vec<String>),
}

impl AccessRequirement {
    /// Requires one well-known permission.
    #[must_use]
    pub fn permission(permission: Permission) -> Self {
        Self::AnyPermission(vec![permission.slug()])
    }

    /// Requires any of the given permissions.
    #[must_use]
    pub fn any_permission(permissions: impl IntoIterator<Item = PermissionSlug>) -> Self {
        Self::AnyPermission(permissions.into_iter().collect())
    }

    /// Requires one role by name.
    #[must_use]
    pub fn role(name: impl Into<String>) -> Self {
        Self::AnyRole(vec![name.into()])
    }

    /// Requires any of the given role names.
    #[must_use]
    pub fn any_role<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AnyRole(names.into_iter().map(Into::into).collect())
    }

    /// Human-readable form used in denial messages, e.g.
    /// `missing required permission: ticket.view OR ticket.update`.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::AnyPermission(permissions) => format!(
                "missing required permission: {}",
                permissions
                    .iter()
                    .map(PermissionSlug::as_str)
                    .collect::<Vec<_>>()
                    .join(" OR ")
            ),
            Self::AnyRole(names) => format!("missing required role: {}", names.join(" OR ")),
        }
    }

    fn is_met_by(&self, grant: &AccessGrant) -> bool {
        match self {
            Self::AnyPermission(permissions) => permissions
                .iter()
                .any(|permission| grant.permissions.contains(permission)),
            Self::AnyRole(names) => names.iter().any(|name| grant.role_names.contains(name)),
        }
    }
}

/// Opt-in rule letting holders of one named role pass every check.
///
/// Each use is logged so the bypass stays auditable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminRoleBypass {
    role_name: NonEmptyString,
}

impl AdminRoleBypass {
    /// Creates a bypass for the given role name.
    pub fn new(role_name: impl Into<String>) -> AppResult<Self> {
        Ok(Self {
            role_name: NonEmptyString::new(role_name)?,
        })
    }

    /// Name of the bypassing role.
    #[must_use]
    pub fn role_name(&self) -> &str {
        self.role_name.as_str()
    }
}

/// Outcome of a successful access check, attached to the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    /// Acting user.
    pub user_id: UserId,
    /// Organization the request is scoped to.
    pub org_id: Option<OrgId>,
    /// Project the request is scoped to.
    pub project_id: Option<ProjectId>,
    /// Acting role reported to handlers.
    pub primary_role_id: Option<RoleId>,
    /// Every resolved role.
    pub role_ids: BTreeSet<RoleId>,
    /// Names of the resolved roles.
    pub role_names: BTreeSet<String>,
    /// Union of the resolved roles' grants.
    pub permissions: BTreeSet<PermissionSlug>,
    /// Whether the system-admin override applied.
    pub system_admin: bool,
    /// Cache generation the decision was made against.
    pub cache_generation: u64,
}

impl AccessGrant {
    /// Returns whether the grant covers the permission. System admins hold
    /// every permission.
    #[must_use]
    pub fn has_permission(&self, permission: &PermissionSlug) -> bool {
        self.system_admin || self.permissions.contains(permission)
    }
}

/// Access decision point combining scope resolution with cached grants.
#[derive(Clone)]
pub struct AccessService {
    cache: PermissionCache,
    resolver: ScopeResolver,
    admin_role_bypass: Option<AdminRoleBypass>,
}

impl AccessService {
    /// Creates a new access service.
    #[must_use]
    pub fn new(
        cache: PermissionCache,
        resolver: ScopeResolver,
        admin_role_bypass: Option<AdminRoleBypass>,
    ) -> Self {
        Self {
            cache,
            resolver,
            admin_role_bypass,
        }
    }

    /// Returns the permission cache backing decisions.
    #[must_use]
    pub fn cache(&self) -> &PermissionCache {
        &self.cache
    }

    /// Loads the permission cache.
    pub async fn load_permissions(&self) -> AppResult<Arc<PermissionSnapshot>> {
        self.cache.load().await
    }

    /// Reloads the permission cache after role or grant changes.
    pub async fn reload_permissions(&self) -> AppResult<Arc<PermissionSnapshot>> {
        self.cache.reload().await
    }

    /// Checks the actor against a requirement in the declared scope.
    ///
    /// A missing actor is [`AppError::Unauthorized`], an unmet requirement
    /// is [`AppError::Forbidden`] and a cache that cannot be loaded is
    /// [`AppError::CacheUnavailable`].
    pub async fn authorize(
        &self,
        actor: Option<&UserIdentity>,
        context: &ScopeContext,
        requirement: &AccessRequirement,
    ) -> AppResult<AccessGrant> {
        let grant = self.effective_permissions(actor, context).await?;

        if grant.system_admin {
            debug!(user_id = %grant.user_id, "system admin passes access check");
            return Ok(grant);
        }

        if requirement.is_met_by(&grant) {
            debug!(user_id = %grant.user_id, "access granted");
            return Ok(grant);
        }

        if let Some(bypass) = self
            .admin_role_bypass
            .as_ref()
            .filter(|bypass| grant.role_names.contains(bypass.role_name()))
        {
            info!(
                user_id = %grant.user_id,
                role = bypass.role_name(),
                requirement = %requirement.describe(),
                "admin role bypass applied"
            );
            return Ok(grant);
        }

        debug!(user_id = %grant.user_id, "access denied");
        Err(AppError::Forbidden(requirement.describe()))
    }

    /// Requires any of the permissions in the declared scope.
    pub async fn require_permission(
        &self,
        actor: Option<&UserIdentity>,
        context: &ScopeContext,
        permissions: impl IntoIterator<Item = PermissionSlug>,
    ) -> AppResult<AccessGrant> {
        self.authorize(actor, context, &AccessRequirement::any_permission(permissions))
            .await
    }

    /// Requires any of the role names in the declared scope.
    pub async fn require_role<I, S>(
        &self,
        actor: Option<&UserIdentity>,
        context: &ScopeContext,
        names: I,
    ) -> AppResult<AccessGrant>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authorize(actor, context, &AccessRequirement::any_role(names))
            .await
    }

    /// Resolves the actor's full grant in the declared scope without checking
    /// any requirement.
    pub async fn effective_permissions(
        &self,
        actor: Option<&UserIdentity>,
        context: &ScopeContext,
    ) -> AppResult<AccessGrant> {
        let actor = actor
            .ok_or_else(|| AppError::Unauthorized("authentication required".to_owned()))?;

        let scope = self.resolver.resolve(actor.user_id(), context).await?;
        let snapshot = self.cache.ensure_loaded().await.map_err(|error| match error {
            AppError::CacheUnavailable(message) => AppError::CacheUnavailable(message),
            other => AppError::CacheUnavailable(format!("permission cache could not be loaded: {other}")),
        })?;

        let role_ids = scope.role_ids();
        Ok(AccessGrant {
            user_id: scope.user_id,
            org_id: scope.org_id,
            project_id: scope.project_id,
            primary_role_id: scope.primary_role_id(),
            permissions: snapshot.permissions_for(&role_ids),
            role_names: snapshot.role_names(&role_ids),
            system_admin: scope.is_system_admin(),
            cache_generation: snapshot.generation(),
            role_ids,
        })
    }

    /// Probes one permission. Denial is `Ok(false)`; authentication, scope and
    /// cache failures still surface as errors.
    pub async fn check_permission(
        &self,
        actor: Option<&UserIdentity>,
        context: &ScopeContext,
        permission: &PermissionSlug,
    ) -> AppResult<bool> {
        let requirement = AccessRequirement::AnyPermission(vec![permission.clone()]);
        match self.authorize(actor, context, &requirement).await {
            Ok(_) => Ok(true),
            Err(AppError::Forbidden(_)) => Ok(false),
            Err(error) => Err(error),
        }
    }
}

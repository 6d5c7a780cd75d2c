use std::collections::BTreeSet;
use std::sync::Arc;

use helpdesk_core::{AppError, AppResult, OrgId, ProjectId, RoleId, UserId};
use helpdesk_domain::ScopeContext;
use tracing::debug;

use crate::RbacStore;

/// How a user's roles were obtained for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeGrant {
    /// System-admin override. Membership rows are not consulted.
    SystemAdmin {
        /// Seeded system-scope role, if one exists.
        role_id: Option<RoleId>,
    },
    /// Roles granted through memberships.
    Memberships {
        /// Roles narrowed to the declared project.
        project_role_ids: BTreeSet<RoleId>,
        /// Org-wide roles of the organization owning the scope.
        org_role_ids: BTreeSet<RoleId>,
    },
}

/// Roles a user holds in the scope a request declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedScope {
    /// Acting user.
    pub user_id: UserId,
    /// Organization the request is scoped to, declared or inferred.
    pub org_id: Option<OrgId>,
    /// Project the request is scoped to.
    pub project_id: Option<ProjectId>,
    /// Resolved roles.
    pub grant: ScopeGrant,
}

impl ResolvedScope {
    /// Returns whether the system-admin override applied.
    #[must_use]
    pub fn is_system_admin(&self) -> bool {
        matches!(self.grant, ScopeGrant::SystemAdmin { .. })
    }

    /// Union of every resolved role id.
    #[must_use]
    pub fn role_ids(&self) -> BTreeSet<RoleId> {
        match &self.grant {
            ScopeGrant::SystemAdmin { role_id } => role_id.iter().copied().collect(),
            ScopeGrant::Memberships {
                project_role_ids,
                org_role_ids,
            } => project_role_ids.union(org_role_ids).copied().collect(),
        }
    }

    /// Role reported as the request's acting role: the system role for
    /// admins, otherwise the first project role, otherwise the first org role.
    #[must_use]
    pub fn primary_role_id(&self) -> Option<RoleId> {
        match &self.grant {
            ScopeGrant::SystemAdmin { role_id } => *role_id,
            ScopeGrant::Memberships {
                project_role_ids,
                org_role_ids,
            } => project_role_ids
                .first()
                .or_else(|| org_role_ids.first())
                .copied(),
        }
    }
}

/// Maps an actor and a declared scope onto role ids.
///
/// Resolution always queries the store; only role grants are cached.
#[derive(Clone)]
pub struct ScopeResolver {
    store: Arc<dyn RbacStore>,
}

impl ScopeResolver {
    /// Creates a resolver reading memberships from the given store.
    #[must_use]
    pub fn new(store: Arc<dyn RbacStore>) -> Self {
        Self { store }
    }

    /// Resolves the user's roles for the declared scope.
    ///
    /// A project with no declared org is attributed to its owning org so that
    /// org-wide memberships apply to it. A declared org that does not own the
    /// declared project is rejected.
    pub async fn resolve(&self, user_id: UserId, context: &ScopeContext) -> AppResult<ResolvedScope> {
        if self.store.is_system_admin(user_id).await? {
            let role_id = self.store.find_system_scope_role_id().await?;
            debug!(user_id = %user_id, "system admin override");
            return Ok(ResolvedScope {
                user_id,
                org_id: context.org_id,
                project_id: context.project_id,
                grant: ScopeGrant::SystemAdmin { role_id },
            });
        }

        let (org_id, grant_org_id) = self.org_for_scope(context).await?;

        let project_role_ids = match context.project_id {
            Some(project_id) => self
                .store
                .find_role_ids_for_user_in_project(user_id, project_id)
                .await?
                .into_iter()
                .collect(),
            None => BTreeSet::new(),
        };

        let org_role_ids = match grant_org_id {
            Some(org_id) => self
                .store
                .find_role_ids_for_user_in_org(user_id, org_id)
                .await?
                .into_iter()
                .collect(),
            None => BTreeSet::new(),
        };

        debug!(
            user_id = %user_id,
            project_roles = project_role_ids.len(),
            org_roles = org_role_ids.len(),
            "resolved membership scope"
        );

        Ok(ResolvedScope {
            user_id,
            org_id,
            project_id: context.project_id,
            grant: ScopeGrant::Memberships {
                project_role_ids,
                org_role_ids,
            },
        })
    }

    /// Returns the scope's org and the org whose org-wide roles apply.
    ///
    /// The two differ only for an unknown project: the declared org is kept
    /// for reporting but grants nothing onto a project it does not own.
    async fn org_for_scope(
        &self,
        context: &ScopeContext,
    ) -> AppResult<(Option<OrgId>, Option<OrgId>)> {
        let Some(project_id) = context.project_id else {
            return Ok((context.org_id, context.org_id));
        };

        let owning_org_id = self.store.find_org_id_for_project(project_id).await?;
        match (context.org_id, owning_org_id) {
            (Some(declared), Some(owning)) if declared != owning => Err(AppError::Forbidden(
                format!("project '{project_id}' does not belong to organization '{declared}'"),
            )),
            (_, Some(owning)) => Ok((Some(owning), Some(owning))),
            (declared, None) => Ok((declared, None)),
        }
    }
}

#[cfg(test)]
mod tests;

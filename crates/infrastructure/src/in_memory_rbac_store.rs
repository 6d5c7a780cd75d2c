use std::collections::{BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use helpdesk_application::{RbacStore, RolePermissionPair};
use helpdesk_core::{AppResult, OrgId, ProjectId, RoleId, UserId};
use helpdesk_domain::{Membership, PermissionSlug, Role, RoleScope};
use tokio::sync::RwLock;

/// In-memory RBAC store used by tests and local tooling.
#[derive(Debug, Default)]
pub struct InMemoryRbacStore {
    roles: RwLock<HashMap<RoleId, Role>>,
    grants: RwLock<HashMap<RoleId, BTreeSet<PermissionSlug>>>,
    memberships: RwLock<Vec<Membership>>,
    projects: RwLock<HashMap<ProjectId, OrgId>>,
    system_admins: RwLock<HashSet<UserId>>,
}

impl InMemoryRbacStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a role together with its grants.
    pub async fn save_role(&self, role: Role, permissions: impl IntoIterator<Item = PermissionSlug>) {
        let role_id = role.role_id();
        self.roles.write().await.insert(role_id, role);
        self.grants
            .write()
            .await
            .insert(role_id, permissions.into_iter().collect());
    }

    /// Adds one permission to an existing role's grants.
    pub async fn grant(&self, role_id: RoleId, permission: PermissionSlug) {
        self.grants
            .write()
            .await
            .entry(role_id)
            .or_default()
            .insert(permission);
    }

    /// Registers a project under its owning organization.
    pub async fn save_project(&self, project_id: ProjectId, org_id: OrgId) {
        self.projects.write().await.insert(project_id, org_id);
    }

    /// Adds a membership row.
    pub async fn add_membership(&self, membership: Membership) {
        self.memberships.write().await.push(membership);
    }

    /// Sets or clears a user's system-admin flag.
    pub async fn set_system_admin(&self, user_id: UserId, is_system_admin: bool) {
        let mut system_admins = self.system_admins.write().await;
        if is_system_admin {
            system_admins.insert(user_id);
        } else {
            system_admins.remove(&user_id);
        }
    }

    async fn role_ids_matching(&self, predicate: impl Fn(&Membership) -> bool) -> Vec<RoleId> {
        self.memberships
            .read()
            .await
            .iter()
            .filter(|membership| predicate(membership))
            .map(|membership| membership.role_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[async_trait]
impl RbacStore for InMemoryRbacStore {
    async fn list_role_permission_pairs(&self) -> AppResult<Vec<RolePermissionPair>> {
        let grants = self.grants.read().await;

        Ok(grants
            .iter()
            .flat_map(|(role_id, permissions)| {
                permissions.iter().map(|permission| RolePermissionPair {
                    role_id: *role_id,
                    permission: permission.clone(),
                })
            })
            .collect())
    }

    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        let mut roles: Vec<Role> = self.roles.read().await.values().cloned().collect();
        roles.sort_by(|left, right| left.name().cmp(right.name()));
        Ok(roles)
    }

    async fn find_role_ids_for_user_in_project(
        &self,
        user_id: UserId,
        project_id: ProjectId,
    ) -> AppResult<Vec<RoleId>> {
        Ok(self
            .role_ids_matching(|membership| {
                membership.user_id == user_id && membership.project_id == Some(project_id)
            })
            .await)
    }

    async fn find_role_ids_for_user_in_org(
        &self,
        user_id: UserId,
        org_id: OrgId,
    ) -> AppResult<Vec<RoleId>> {
        Ok(self
            .role_ids_matching(|membership| {
                membership.user_id == user_id
                    && membership.org_id == org_id
                    && membership.is_org_wide()
            })
            .await)
    }

    async fn is_system_admin(&self, user_id: UserId) -> AppResult<bool> {
        Ok(self.system_admins.read().await.contains(&user_id))
    }

    async fn find_system_scope_role_id(&self) -> AppResult<Option<RoleId>> {
        Ok(self
            .roles
            .read()
            .await
            .values()
            .filter(|role| role.scope() == RoleScope::System)
            .min_by(|left, right| left.name().cmp(right.name()))
            .map(Role::role_id))
    }

    async fn find_org_id_for_project(&self, project_id: ProjectId) -> AppResult<Option<OrgId>> {
        Ok(self.projects.read().await.get(&project_id).copied())
    }
}

#[cfg(test)]
mod tests;

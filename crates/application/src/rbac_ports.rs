use async_trait::async_trait;

use helpdesk_core::{AppResult, OrgId, ProjectId, RoleId, UserId};
use helpdesk_domain::{PermissionSlug, Role};

/// One role-permission edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolePermissionPair {
    /// Granting role.
    pub role_id: RoleId,
    /// Granted permission.
    pub permission: PermissionSlug,
}

/// Read-only gateway to the relational store holding roles, grants and
/// memberships.
///
/// Failures to reach the store are reported as
/// [`helpdesk_core::AppError::StoreUnavailable`].
#[async_trait]
pub trait RbacStore: Send + Sync {
    /// Lists every role-permission edge.
    async fn list_role_permission_pairs(&self) -> AppResult<Vec<RolePermissionPair>>;

    /// Lists every role with its name and scope tag.
    async fn list_roles(&self) -> AppResult<Vec<Role>>;

    /// Lists role ids the user holds through memberships narrowed to the project.
    async fn find_role_ids_for_user_in_project(
        &self,
        user_id: UserId,
        project_id: ProjectId,
    ) -> AppResult<Vec<RoleId>>;

    /// Lists role ids the user holds org-wide (memberships without a project).
    async fn find_role_ids_for_user_in_org(
        &self,
        user_id: UserId,
        org_id: OrgId,
    ) -> AppResult<Vec<RoleId>>;

    /// Returns whether the user carries the system-admin flag.
    async fn is_system_admin(&self, user_id: UserId) -> AppResult<bool>;

    /// Finds the role representing system scope, if one is seeded.
    async fn find_system_scope_role_id(&self) -> AppResult<Option<RoleId>>;

    /// Finds the organization owning a project.
    async fn find_org_id_for_project(&self, project_id: ProjectId) -> AppResult<Option<OrgId>>;
}

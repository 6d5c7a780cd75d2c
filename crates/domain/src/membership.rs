use helpdesk_core::{OrgId, ProjectId, RoleId, UserId};
use serde::{Deserialize, Serialize};

/// Grants a user one role inside an organization, optionally narrowed to one
/// project. A membership without a project applies org-wide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    /// Member user.
    pub user_id: UserId,
    /// Granted role.
    pub role_id: RoleId,
    /// Organization the grant lives in.
    pub org_id: OrgId,
    /// Project the grant is narrowed to, if any.
    pub project_id: Option<ProjectId>,
}

impl Membership {
    /// Creates an org-wide membership.
    #[must_use]
    pub fn org_wide(user_id: UserId, role_id: RoleId, org_id: OrgId) -> Self {
        Self {
            user_id,
            role_id,
            org_id,
            project_id: None,
        }
    }

    /// Creates a membership narrowed to one project.
    #[must_use]
    pub fn in_project(
        user_id: UserId,
        role_id: RoleId,
        org_id: OrgId,
        project_id: ProjectId,
    ) -> Self {
        Self {
            user_id,
            role_id,
            org_id,
            project_id: Some(project_id),
        }
    }

    /// Returns whether the grant covers every project of the organization.
    #[must_use]
    pub fn is_org_wide(&self) -> bool {
        self.project_id.is_none()
    }
}

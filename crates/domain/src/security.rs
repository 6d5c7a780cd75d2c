use std::fmt::{Display, Formatter};
use std::str::FromStr;

use helpdesk_core::{AppError, AppResult, RoleId};
use serde::{Deserialize, Serialize};

/// Name of the role that may trigger administrative operations such as a
/// permission cache reload.
pub const ADMIN_ROLE_NAME: &str = "admin";

/// Stable permission identifier as stored in the `permissions` table.
///
/// Slugs are normalized to lowercase and may not contain whitespace. The
/// cache stores arbitrary slugs; [`Permission`] only names the ones the
/// backend itself guards on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionSlug(String);

impl PermissionSlug {
    /// Creates a validated permission slug.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "permission slug must not be empty".to_owned(),
            ));
        }

        if trimmed.chars().any(char::is_whitespace) {
            return Err(AppError::Validation(format!(
                "permission slug '{trimmed}' must not contain whitespace"
            )));
        }

        Ok(Self(trimmed.to_lowercase()))
    }

    /// Returns the slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for PermissionSlug {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

impl TryFrom<String> for PermissionSlug {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PermissionSlug> for String {
    fn from(value: PermissionSlug) -> Self {
        value.0
    }
}

impl From<Permission> for PermissionSlug {
    fn from(value: Permission) -> Self {
        Self(value.as_str().to_owned())
    }
}

/// Permissions the helpdesk routes are guarded by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Allows opening tickets.
    TicketCreate,
    /// Allows reading tickets.
    TicketView,
    /// Allows editing ticket fields.
    TicketUpdate,
    /// Allows assigning tickets to resolvers.
    TicketAssign,
    /// Allows marking tickets resolved.
    TicketResolve,
    /// Allows verifying resolved tickets.
    TicketVerify,
    /// Allows closing verified tickets.
    TicketClose,
    /// Allows commenting on tickets.
    CommentCreate,
    /// Allows reading ticket comments.
    CommentView,
    /// Allows creating projects inside an organization.
    ProjectCreate,
    /// Allows listing and reading projects.
    ProjectView,
    /// Allows editing project settings.
    ProjectUpdate,
    /// Allows deleting projects.
    ProjectDelete,
    /// Allows adding and removing project members.
    ProjectManageMembers,
    /// Allows reading organization details.
    OrgView,
    /// Allows managing organization settings and members.
    OrgManage,
    /// Allows reading ticket analytics.
    AnalyticsView,
    /// Allows administering roles and permission grants.
    RbacManage,
}

impl Permission {
    /// Returns a stable storage value for this permission.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TicketCreate => "ticket.create",
            Self::TicketView => "ticket.view",
            Self::TicketUpdate => "ticket.update",
            Self::TicketAssign => "ticket.assign",
            Self::TicketResolve => "ticket.resolve",
            Self::TicketVerify => "ticket.verify",
            Self::TicketClose => "ticket.close",
            Self::CommentCreate => "comment.create",
            Self::CommentView => "comment.view",
            Self::ProjectCreate => "project.create",
            Self::ProjectView => "project.view",
            Self::ProjectUpdate => "project.update",
            Self::ProjectDelete => "project.delete",
            Self::ProjectManageMembers => "project.manage_members",
            Self::OrgView => "org.view",
            Self::OrgManage => "org.manage",
            Self::AnalyticsView => "analytics.view",
            Self::RbacManage => "rbac.manage",
        }
    }

    /// Returns all known permissions.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Permission] = &[
            Permission::TicketCreate,
            Permission::TicketView,
            Permission::TicketUpdate,
            Permission::TicketAssign,
            Permission::TicketResolve,
            Permission::TicketVerify,
            Permission::TicketClose,
            Permission::CommentCreate,
            Permission::CommentView,
            Permission::ProjectCreate,
            Permission::ProjectView,
            Permission::ProjectUpdate,
            Permission::ProjectDelete,
            Permission::ProjectManageMembers,
            Permission::OrgView,
            Permission::OrgManage,
            Permission::AnalyticsView,
            Permission::RbacManage,
        ];

        ALL
    }

    /// Returns the slug form used by the permission cache.
    #[must_use]
    pub fn slug(self) -> PermissionSlug {
        PermissionSlug::from(self)
    }
}

impl FromStr for Permission {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|permission| permission.as_str() == value)
            .ok_or_else(|| AppError::Validation(format!("unknown permission value '{value}'")))
    }
}

/// Breadth at which a role applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleScope {
    /// Entire installation.
    System,
    /// One organization and all of its projects.
    Org,
    /// One project.
    Project,
}

impl RoleScope {
    /// Returns a stable storage value for this scope.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "SYSTEM",
            Self::Org => "ORG",
            Self::Project => "PROJECT",
        }
    }
}

impl FromStr for RoleScope {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "SYSTEM" => Ok(Self::System),
            "ORG" => Ok(Self::Org),
            "PROJECT" => Ok(Self::Project),
            _ => Err(AppError::Validation(format!(
                "unknown role scope value '{value}'"
            ))),
        }
    }
}

/// Role reference data. Immutable once loaded into the permission cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    role_id: RoleId,
    name: String,
    scope: RoleScope,
}

impl Role {
    /// Creates a role with a validated name.
    pub fn new(role_id: RoleId, name: impl Into<String>, scope: RoleScope) -> AppResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(AppError::Validation(format!(
                "role '{role_id}' must have a non-empty name"
            )));
        }

        Ok(Self {
            role_id,
            name,
            scope,
        })
    }

    /// Returns the role identifier.
    #[must_use]
    pub fn role_id(&self) -> RoleId {
        self.role_id
    }

    /// Returns the role name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the scope tag.
    #[must_use]
    pub fn scope(&self) -> RoleScope {
        self.scope
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use helpdesk_core::RoleId;

    use super::{Permission, PermissionSlug, Role, RoleScope};

    #[test]
    fn permission_roundtrip_storage_value() {
        let permission = Permission::ProjectManageMembers;
        let restored = Permission::from_str(permission.as_str());
        assert_eq!(restored.ok(), Some(permission));
    }

    #[test]
    fn unknown_permission_is_rejected() {
        let parsed = Permission::from_str("ticket.teleport");
        assert!(parsed.is_err());
    }

    #[test]
    fn slugs_are_normalized() {
        let slug = PermissionSlug::new("  Ticket.Create ");
        assert_eq!(slug.ok(), Some(Permission::TicketCreate.slug()));
    }

    #[test]
    fn slugs_reject_whitespace() {
        assert!(PermissionSlug::new("ticket create").is_err());
        assert!(PermissionSlug::new("   ").is_err());
    }

    #[test]
    fn role_scope_parses_case_insensitively() {
        assert_eq!(RoleScope::from_str("org").ok(), Some(RoleScope::Org));
        assert!(RoleScope::from_str("team").is_err());
    }

    #[test]
    fn role_requires_name() {
        assert!(Role::new(RoleId::new(), " ", RoleScope::Project).is_err());
    }
}

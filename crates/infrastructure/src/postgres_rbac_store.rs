use std::str::FromStr;

use async_trait::async_trait;

use helpdesk_application::{RbacStore, RolePermissionPair};
use helpdesk_core::{AppError, AppResult, OrgId, ProjectId, RoleId, UserId};
use helpdesk_domain::{PermissionSlug, Role, RoleScope};

use sqlx::{FromRow, PgPool};
use tracing::warn;
use uuid::Uuid;

/// PostgreSQL-backed gateway to roles, grants and memberships.
#[derive(Clone)]
pub struct PostgresRbacStore {
    pool: PgPool,
}

impl PostgresRbacStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct RoleRow {
    id: Uuid,
    name: String,
    scope: String,
}

#[derive(Debug, FromRow)]
struct RolePermissionRow {
    role_id: Uuid,
    slug: String,
}

#[derive(Debug, FromRow)]
struct RoleIdRow {
    role_id: Uuid,
}

#[derive(Debug, FromRow)]
struct SystemAdminRow {
    is_system_admin: bool,
}

#[derive(Debug, FromRow)]
struct ProjectOrgRow {
    org_id: Uuid,
}

#[async_trait]
impl RbacStore for PostgresRbacStore {
    async fn list_role_permission_pairs(&self) -> AppResult<Vec<RolePermissionPair>> {
        let rows = sqlx::query_as::<_, RolePermissionRow>(
            r#"
            SELECT role_permissions.role_id, permissions.slug
            FROM role_permissions
            INNER JOIN permissions
                ON permissions.id = role_permissions.permission_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::StoreUnavailable(format!("failed to list role permissions: {error}"))
        })?;

        Ok(decode_role_permission_rows(rows))
    }

    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT id, name, scope
            FROM roles
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::StoreUnavailable(format!("failed to list roles: {error}")))?;

        Ok(decode_role_rows(rows))
    }

    async fn find_role_ids_for_user_in_project(
        &self,
        user_id: UserId,
        project_id: ProjectId,
    ) -> AppResult<Vec<RoleId>> {
        let rows = sqlx::query_as::<_, RoleIdRow>(
            r#"
            SELECT DISTINCT role_id
            FROM members
            WHERE user_id = $1
                AND project_id = $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(project_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::StoreUnavailable(format!(
                "failed to load project memberships for user '{user_id}' in project '{project_id}': {error}"
            ))
        })?;

        Ok(rows
            .into_iter()
            .map(|row| RoleId::from_uuid(row.role_id))
            .collect())
    }

    async fn find_role_ids_for_user_in_org(
        &self,
        user_id: UserId,
        org_id: OrgId,
    ) -> AppResult<Vec<RoleId>> {
        let rows = sqlx::query_as::<_, RoleIdRow>(
            r#"
            SELECT DISTINCT role_id
            FROM members
            WHERE user_id = $1
                AND org_id = $2
                AND project_id IS NULL
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(org_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::StoreUnavailable(format!(
                "failed to load org memberships for user '{user_id}' in org '{org_id}': {error}"
            ))
        })?;

        Ok(rows
            .into_iter()
            .map(|row| RoleId::from_uuid(row.role_id))
            .collect())
    }

    async fn is_system_admin(&self, user_id: UserId) -> AppResult<bool> {
        let row = sqlx::query_as::<_, SystemAdminRow>(
            r#"
            SELECT is_system_admin
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::StoreUnavailable(format!(
                "failed to load system admin flag for user '{user_id}': {error}"
            ))
        })?;

        Ok(row.is_some_and(|row| row.is_system_admin))
    }

    async fn find_system_scope_role_id(&self) -> AppResult<Option<RoleId>> {
        let row = sqlx::query_as::<_, RoleIdRow>(
            r#"
            SELECT id AS role_id
            FROM roles
            WHERE scope = 'SYSTEM'
            ORDER BY name
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::StoreUnavailable(format!("failed to find system scope role: {error}"))
        })?;

        Ok(row.map(|row| RoleId::from_uuid(row.role_id)))
    }

    async fn find_org_id_for_project(&self, project_id: ProjectId) -> AppResult<Option<OrgId>> {
        let row = sqlx::query_as::<_, ProjectOrgRow>(
            r#"
            SELECT org_id
            FROM projects
            WHERE id = $1
            "#,
        )
        .bind(project_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::StoreUnavailable(format!(
                "failed to find organization of project '{project_id}': {error}"
            ))
        })?;

        Ok(row.map(|row| OrgId::from_uuid(row.org_id)))
    }
}

/// Decodes grant rows, skipping slugs that fail validation so one bad row
/// cannot block the whole cache load.
fn decode_role_permission_rows(rows: Vec<RolePermissionRow>) -> Vec<RolePermissionPair> {
    rows.into_iter()
        .filter_map(|row| match PermissionSlug::new(row.slug.as_str()) {
            Ok(permission) => Some(RolePermissionPair {
                role_id: RoleId::from_uuid(row.role_id),
                permission,
            }),
            Err(error) => {
                warn!(
                    role_id = %row.role_id,
                    slug = %row.slug,
                    %error,
                    "skipping undecodable role permission"
                );
                None
            }
        })
        .collect()
}

/// Decodes role rows, skipping rows with a blank name or unknown scope.
fn decode_role_rows(rows: Vec<RoleRow>) -> Vec<Role> {
    rows.into_iter()
        .filter_map(|row| {
            let decoded = RoleScope::from_str(row.scope.as_str())
                .and_then(|scope| Role::new(RoleId::from_uuid(row.id), row.name.as_str(), scope));

            match decoded {
                Ok(role) => Some(role),
                Err(error) => {
                    warn!(
                        role_id = %row.id,
                        name = %row.name,
                        scope = %row.scope,
                        %error,
                        "skipping undecodable role"
                    );
                    None
                }
            }
        })
        .collect()
}

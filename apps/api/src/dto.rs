use helpdesk_application::{AccessGrant, PermissionCacheStats};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Health response payload.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/health-response.ts"
)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ready: bool,
    pub postgres: HealthDependencyStatus,
    pub permission_cache: HealthDependencyStatus,
}

/// State of one dependency in the health report.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/health-dependency-status.ts"
)]
pub struct HealthDependencyStatus {
    pub status: &'static str,
    pub detail: Option<String>,
}

/// Summary of the active permission cache snapshot.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/permission-cache-response.ts"
)]
pub struct PermissionCacheResponse {
    pub generation: u64,
    pub loaded_at: String,
    pub role_count: usize,
    pub grant_count: usize,
}

impl From<PermissionCacheStats> for PermissionCacheResponse {
    fn from(value: PermissionCacheStats) -> Self {
        Self {
            generation: value.generation,
            loaded_at: value.loaded_at.to_rfc3339(),
            role_count: value.role_count,
            grant_count: value.grant_count,
        }
    }
}

/// Roles and permissions the caller holds in the request's scope.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/access-grant-response.ts"
)]
pub struct AccessGrantResponse {
    pub user_id: String,
    pub org_id: Option<String>,
    pub project_id: Option<String>,
    pub primary_role_id: Option<String>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub system_admin: bool,
    pub cache_generation: u64,
}

impl From<AccessGrant> for AccessGrantResponse {
    fn from(value: AccessGrant) -> Self {
        Self {
            user_id: value.user_id.to_string(),
            org_id: value.org_id.map(|org_id| org_id.to_string()),
            project_id: value.project_id.map(|project_id| project_id.to_string()),
            primary_role_id: value.primary_role_id.map(|role_id| role_id.to_string()),
            roles: value.role_names.into_iter().collect(),
            permissions: value
                .permissions
                .into_iter()
                .map(String::from)
                .collect(),
            system_admin: value.system_admin,
            cache_generation: value.cache_generation,
        }
    }
}

/// Query parameters for a single permission probe.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/check-permission-query.ts"
)]
pub struct CheckPermissionQuery {
    pub permission: String,
}

/// Result of a single permission probe.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/check-permission-response.ts"
)]
pub struct CheckPermissionResponse {
    pub permission: String,
    pub allowed: bool,
}

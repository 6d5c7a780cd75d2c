use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, Response};
use helpdesk_application::{
    AccessService, AdminRoleBypass, IdentityVerifier, PermissionCache, RbacStore, ScopeResolver,
};
use helpdesk_core::{AppError, AppResult, OrgId, ProjectId, RoleId, UserId, UserIdentity};
use helpdesk_domain::{Membership, Permission, Role, RoleScope};
use helpdesk_infrastructure::InMemoryRbacStore;
use serde_json::Value;
use tower::ServiceExt;

use crate::state::AppState;

/// Verifier accepting the fixed tokens registered by the fixture.
#[derive(Clone, Default)]
pub(crate) struct StaticIdentityVerifier {
    identities: HashMap<String, UserIdentity>,
}

impl IdentityVerifier for StaticIdentityVerifier {
    fn verify_bearer_token(&self, token: &str) -> AppResult<UserIdentity> {
        self.identities
            .get(token)
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("unknown test token".to_owned()))
    }
}

/// Seeded org with one project, an agent, a manager, an org admin and a
/// system admin.
pub(crate) struct Fixture {
    pub store: Arc<InMemoryRbacStore>,
    pub org_id: OrgId,
    pub project_id: ProjectId,
    pub other_project_id: ProjectId,
    pub agent_role_id: RoleId,
    pub verifier: StaticIdentityVerifier,
}

pub(crate) const AGENT_TOKEN: &str = "agent-token";
pub(crate) const OUTSIDER_TOKEN: &str = "outsider-token";
pub(crate) const ORG_ADMIN_TOKEN: &str = "org-admin-token";
pub(crate) const SYSTEM_ADMIN_TOKEN: &str = "system-admin-token";

fn role(name: &str, scope: RoleScope) -> Role {
    match Role::new(RoleId::new(), name, scope) {
        Ok(role) => role,
        Err(error) => panic!("invalid test role '{name}': {error}"),
    }
}

impl Fixture {
    pub(crate) async fn seeded() -> Self {
        let store = Arc::new(InMemoryRbacStore::new());
        let org_id = OrgId::new();
        let project_id = ProjectId::new();
        let other_project_id = ProjectId::new();
        store.save_project(project_id, org_id).await;
        store.save_project(other_project_id, org_id).await;

        let system_role = role("system_admin", RoleScope::System);
        let admin_role = role("admin", RoleScope::Org);
        let agent_role = role("agent", RoleScope::Project);
        let agent_role_id = agent_role.role_id();
        let admin_role_id = admin_role.role_id();
        store
            .save_role(
                system_role,
                Permission::all().iter().map(|permission| permission.slug()),
            )
            .await;
        store
            .save_role(admin_role, [Permission::RbacManage.slug()])
            .await;
        store
            .save_role(
                agent_role,
                [Permission::TicketCreate.slug(), Permission::TicketView.slug()],
            )
            .await;

        let agent = UserIdentity::new(UserId::new(), "Avery Agent", None);
        let outsider = UserIdentity::new(UserId::new(), "Olive Outsider", None);
        let org_admin = UserIdentity::new(UserId::new(), "Ada Admin", None);
        let system_admin = UserIdentity::new(UserId::new(), "Sam System", None);

        store
            .add_membership(Membership::in_project(
                agent.user_id(),
                agent_role_id,
                org_id,
                project_id,
            ))
            .await;
        store
            .add_membership(Membership::org_wide(
                org_admin.user_id(),
                admin_role_id,
                org_id,
            ))
            .await;
        store.set_system_admin(system_admin.user_id(), true).await;

        let verifier = StaticIdentityVerifier {
            identities: HashMap::from([
                (AGENT_TOKEN.to_owned(), agent),
                (OUTSIDER_TOKEN.to_owned(), outsider),
                (ORG_ADMIN_TOKEN.to_owned(), org_admin),
                (SYSTEM_ADMIN_TOKEN.to_owned(), system_admin),
            ]),
        };

        Self {
            store,
            org_id,
            project_id,
            other_project_id,
            agent_role_id,
            verifier,
        }
    }

    pub(crate) fn state(&self, admin_role_bypass: Option<AdminRoleBypass>) -> AppState {
        let store: Arc<dyn RbacStore> = self.store.clone();
        state_for(store, self.verifier.clone(), admin_role_bypass)
    }
}

pub(crate) fn state_for(
    store: Arc<dyn RbacStore>,
    verifier: StaticIdentityVerifier,
    admin_role_bypass: Option<AdminRoleBypass>,
) -> AppState {
    AppState {
        access_service: AccessService::new(
            PermissionCache::new(store.clone()),
            ScopeResolver::new(store),
            admin_role_bypass,
        ),
        identity_verifier: Arc::new(verifier),
        postgres_pool: None,
    }
}

pub(crate) fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

pub(crate) fn request(builder: axum::http::request::Builder, body: Body) -> Request<Body> {
    match builder.body(body) {
        Ok(request) => request,
        Err(error) => panic!("failed to build test request: {error}"),
    }
}

pub(crate) async fn json_body(response: Response<Body>) -> Value {
    let bytes = match to_bytes(response.into_body(), usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => panic!("failed to read response body: {error}"),
    };

    match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(error) => panic!("response body is not JSON: {error}"),
    }
}

pub(crate) async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    match router.clone().oneshot(request).await {
        Ok(response) => response,
        Err(error) => match error {},
    }
}

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use helpdesk_core::{AppError, AppResult, OrgId, ProjectId, RoleId, UserId};
use helpdesk_domain::{Membership, PermissionSlug, Role, RoleScope};
use tokio::sync::Mutex;

use crate::{RbacStore, RolePermissionPair};

pub(crate) fn slug(value: &str) -> PermissionSlug {
    match PermissionSlug::new(value) {
        Ok(slug) => slug,
        Err(error) => panic!("invalid test slug '{value}': {error}"),
    }
}

#[derive(Default)]
struct FakeState {
    roles: Vec<Role>,
    pairs: Vec<RolePermissionPair>,
    memberships: Vec<Membership>,
    system_admins: HashSet<UserId>,
    system_role_id: Option<RoleId>,
    projects: HashMap<ProjectId, OrgId>,
}

/// Store fake with failure injection, artificial latency and query counters.
///
/// A cache load issues `list_roles` and `list_role_permission_pairs` together;
/// the batch counter and the latency live on `list_roles`, while grants are
/// read as soon as the load starts.
#[derive(Default)]
pub(crate) struct FakeRbacStore {
    state: Mutex<FakeState>,
    fail_queries: AtomicBool,
    load_delay: Mutex<Option<Duration>>,
    load_batches: AtomicUsize,
    admin_checks: AtomicUsize,
    membership_queries: AtomicUsize,
}

impl FakeRbacStore {
    pub(crate) async fn add_role(&self, name: &str, scope: RoleScope, permissions: &[&str]) -> RoleId {
        let role_id = RoleId::new();
        let role = match Role::new(role_id, name, scope) {
            Ok(role) => role,
            Err(error) => panic!("invalid test role '{name}': {error}"),
        };

        let mut state = self.state.lock().await;
        state.roles.push(role);
        state
            .pairs
            .extend(permissions.iter().map(|permission| RolePermissionPair {
                role_id,
                permission: slug(permission),
            }));
        role_id
    }

    pub(crate) async fn grant(&self, role_id: RoleId, permission: &str) {
        self.state.lock().await.pairs.push(RolePermissionPair {
            role_id,
            permission: slug(permission),
        });
    }

    pub(crate) async fn add_membership(&self, membership: Membership) {
        self.state.lock().await.memberships.push(membership);
    }

    pub(crate) async fn add_project(&self, project_id: ProjectId, org_id: OrgId) {
        self.state.lock().await.projects.insert(project_id, org_id);
    }

    pub(crate) async fn promote_system_admin(&self, user_id: UserId) {
        self.state.lock().await.system_admins.insert(user_id);
    }

    pub(crate) async fn set_system_role(&self, role_id: RoleId) {
        self.state.lock().await.system_role_id = Some(role_id);
    }

    pub(crate) async fn delay_loads(&self, delay: Duration) {
        *self.load_delay.lock().await = Some(delay);
    }

    pub(crate) fn fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn load_batches(&self) -> usize {
        self.load_batches.load(Ordering::SeqCst)
    }

    pub(crate) fn admin_checks(&self) -> usize {
        self.admin_checks.load(Ordering::SeqCst)
    }

    pub(crate) fn membership_queries(&self) -> usize {
        self.membership_queries.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> AppResult<()> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(AppError::StoreUnavailable(
                "connection refused".to_owned(),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl RbacStore for FakeRbacStore {
    async fn list_role_permission_pairs(&self) -> AppResult<Vec<RolePermissionPair>> {
        self.check_reachable()?;
        Ok(self.state.lock().await.pairs.clone())
    }

    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        self.load_batches.fetch_add(1, Ordering::SeqCst);
        let delay = *self.load_delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.check_reachable()?;
        Ok(self.state.lock().await.roles.clone())
    }

    async fn find_role_ids_for_user_in_project(
        &self,
        user_id: UserId,
        project_id: ProjectId,
    ) -> AppResult<Vec<RoleId>> {
        self.membership_queries.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        Ok(self
            .state
            .lock()
            .await
            .memberships
            .iter()
            .filter(|membership| {
                membership.user_id == user_id && membership.project_id == Some(project_id)
            })
            .map(|membership| membership.role_id)
            .collect())
    }

    async fn find_role_ids_for_user_in_org(
        &self,
        user_id: UserId,
        org_id: OrgId,
    ) -> AppResult<Vec<RoleId>> {
        self.membership_queries.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        Ok(self
            .state
            .lock()
            .await
            .memberships
            .iter()
            .filter(|membership| {
                membership.user_id == user_id
                    && membership.org_id == org_id
                    && membership.is_org_wide()
            })
            .map(|membership| membership.role_id)
            .collect())
    }

    async fn is_system_admin(&self, user_id: UserId) -> AppResult<bool> {
        self.admin_checks.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        Ok(self.state.lock().await.system_admins.contains(&user_id))
    }

    async fn find_system_scope_role_id(&self) -> AppResult<Option<RoleId>> {
        self.check_reachable()?;
        Ok(self.state.lock().await.system_role_id)
    }

    async fn find_org_id_for_project(&self, project_id: ProjectId) -> AppResult<Option<OrgId>> {
        self.check_reachable()?;
        Ok(self.state.lock().await.projects.get(&project_id).copied())
    }
}

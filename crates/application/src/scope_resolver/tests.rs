use std::collections::BTreeSet;
use std::sync::Arc;

use helpdesk_core::{AppError, OrgId, ProjectId, UserId};
use helpdesk_domain::{Membership, RoleScope, ScopeContext};

use crate::test_support::FakeRbacStore;

use super::{ScopeGrant, ScopeResolver};

#[tokio::test]
async fn system_admin_skips_membership_queries() {
    let store = Arc::new(FakeRbacStore::default());
    let system_role = store.add_role("system", RoleScope::System, &[]).await;
    store.set_system_role(system_role).await;
    let user_id = UserId::new();
    store.promote_system_admin(user_id).await;
    let resolver = ScopeResolver::new(store.clone());

    let resolved = resolver
        .resolve(user_id, &ScopeContext::project(ProjectId::new()))
        .await;

    let Ok(resolved) = resolved else {
        panic!("admin resolution must succeed");
    };
    assert!(resolved.is_system_admin());
    assert_eq!(resolved.role_ids(), BTreeSet::from([system_role]));
    assert_eq!(resolved.primary_role_id(), Some(system_role));
    assert_eq!(store.membership_queries(), 0);
    assert_eq!(store.admin_checks(), 1);
}

#[tokio::test]
async fn system_admin_without_seeded_role_still_overrides() {
    let store = Arc::new(FakeRbacStore::default());
    let user_id = UserId::new();
    store.promote_system_admin(user_id).await;
    let resolver = ScopeResolver::new(store);

    let resolved = resolver.resolve(user_id, &ScopeContext::default()).await;

    assert_eq!(
        resolved.map(|scope| scope.grant).ok(),
        Some(ScopeGrant::SystemAdmin { role_id: None })
    );
}

#[tokio::test]
async fn project_context_includes_org_wide_roles_of_owning_org() {
    let store = Arc::new(FakeRbacStore::default());
    let org_id = OrgId::new();
    let project_id = ProjectId::new();
    store.add_project(project_id, org_id).await;
    let user_id = UserId::new();
    let manager = store.add_role("manager", RoleScope::Org, &[]).await;
    let agent = store.add_role("agent", RoleScope::Project, &[]).await;
    store
        .add_membership(Membership::org_wide(user_id, manager, org_id))
        .await;
    store
        .add_membership(Membership::in_project(user_id, agent, org_id, project_id))
        .await;
    let resolver = ScopeResolver::new(store);

    let resolved = resolver
        .resolve(user_id, &ScopeContext::project(project_id))
        .await;

    let Ok(resolved) = resolved else {
        panic!("membership resolution must succeed");
    };
    assert_eq!(resolved.org_id, Some(org_id));
    assert_eq!(resolved.role_ids(), BTreeSet::from([manager, agent]));
    assert_eq!(resolved.primary_role_id(), Some(agent));
}

#[tokio::test]
async fn memberships_in_other_projects_do_not_leak() {
    let store = Arc::new(FakeRbacStore::default());
    let org_id = OrgId::new();
    let project_id = ProjectId::new();
    let other_project_id = ProjectId::new();
    store.add_project(project_id, org_id).await;
    store.add_project(other_project_id, org_id).await;
    let user_id = UserId::new();
    let agent = store.add_role("agent", RoleScope::Project, &[]).await;
    store
        .add_membership(Membership::in_project(
            user_id,
            agent,
            org_id,
            other_project_id,
        ))
        .await;
    let resolver = ScopeResolver::new(store);

    let org_scope = resolver.resolve(user_id, &ScopeContext::org(org_id)).await;
    let project_scope = resolver
        .resolve(user_id, &ScopeContext::project(project_id))
        .await;

    assert_eq!(org_scope.map(|scope| scope.role_ids()).ok(), Some(BTreeSet::new()));
    assert_eq!(
        project_scope.map(|scope| scope.role_ids()).ok(),
        Some(BTreeSet::new())
    );
}

#[tokio::test]
async fn empty_context_resolves_no_roles() {
    let store = Arc::new(FakeRbacStore::default());
    let user_id = UserId::new();
    let resolver = ScopeResolver::new(store.clone());

    let resolved = resolver.resolve(user_id, &ScopeContext::default()).await;

    let Ok(resolved) = resolved else {
        panic!("empty context must resolve");
    };
    assert!(resolved.role_ids().is_empty());
    assert_eq!(resolved.primary_role_id(), None);
    assert_eq!(store.membership_queries(), 0);
}

#[tokio::test]
async fn declared_org_must_own_declared_project() {
    let store = Arc::new(FakeRbacStore::default());
    let org_id = OrgId::new();
    let foreign_org_id = OrgId::new();
    let project_id = ProjectId::new();
    store.add_project(project_id, org_id).await;
    let user_id = UserId::new();
    let manager = store.add_role("manager", RoleScope::Org, &[]).await;
    store
        .add_membership(Membership::org_wide(user_id, manager, foreign_org_id))
        .await;
    let resolver = ScopeResolver::new(store);

    let resolved = resolver
        .resolve(
            user_id,
            &ScopeContext::new(Some(foreign_org_id), Some(project_id)),
        )
        .await;

    assert!(matches!(resolved, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn unknown_project_grants_no_org_roles() {
    let store = Arc::new(FakeRbacStore::default());
    let org_id = OrgId::new();
    let user_id = UserId::new();
    let manager = store.add_role("manager", RoleScope::Org, &[]).await;
    store
        .add_membership(Membership::org_wide(user_id, manager, org_id))
        .await;
    let resolver = ScopeResolver::new(store);

    let resolved = resolver
        .resolve(user_id, &ScopeContext::new(Some(org_id), Some(ProjectId::new())))
        .await;

    let Ok(resolved) = resolved else {
        panic!("unknown project must still resolve");
    };
    assert_eq!(resolved.org_id, Some(org_id));
    assert!(resolved.role_ids().is_empty());
}

#[tokio::test]
async fn store_failure_propagates() {
    let store = Arc::new(FakeRbacStore::default());
    store.fail_queries(true);
    let resolver = ScopeResolver::new(store);

    let resolved = resolver
        .resolve(UserId::new(), &ScopeContext::org(OrgId::new()))
        .await;

    assert!(matches!(resolved, Err(AppError::StoreUnavailable(_))));
}

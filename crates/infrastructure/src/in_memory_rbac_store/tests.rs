use helpdesk_application::RbacStore;
use helpdesk_core::{OrgId, ProjectId, RoleId, UserId};
use helpdesk_domain::{Membership, Permission, Role, RoleScope};

use super::InMemoryRbacStore;

fn role(name: &str, scope: RoleScope) -> Role {
    match Role::new(RoleId::new(), name, scope) {
        Ok(role) => role,
        Err(error) => panic!("invalid test role '{name}': {error}"),
    }
}

#[tokio::test]
async fn pairs_reflect_saved_roles_and_later_grants() {
    let store = InMemoryRbacStore::new();
    let agent = role("agent", RoleScope::Project);
    let agent_id = agent.role_id();
    store
        .save_role(agent, [Permission::TicketView.slug()])
        .await;
    store.grant(agent_id, Permission::TicketClose.slug()).await;

    let pairs = store.list_role_permission_pairs().await;

    let Ok(pairs) = pairs else {
        panic!("in-memory listing cannot fail");
    };
    assert_eq!(pairs.len(), 2);
    assert!(pairs.iter().all(|pair| pair.role_id == agent_id));
}

#[tokio::test]
async fn org_lookup_ignores_project_memberships() {
    let store = InMemoryRbacStore::new();
    let user_id = UserId::new();
    let org_id = OrgId::new();
    let project_id = ProjectId::new();
    let org_role = RoleId::new();
    let project_role = RoleId::new();
    store
        .add_membership(Membership::org_wide(user_id, org_role, org_id))
        .await;
    store
        .add_membership(Membership::in_project(
            user_id,
            project_role,
            org_id,
            project_id,
        ))
        .await;

    let org_roles = store.find_role_ids_for_user_in_org(user_id, org_id).await;
    let project_roles = store
        .find_role_ids_for_user_in_project(user_id, project_id)
        .await;

    assert_eq!(org_roles.ok(), Some(vec![org_role]));
    assert_eq!(project_roles.ok(), Some(vec![project_role]));
}

#[tokio::test]
async fn duplicate_memberships_collapse() {
    let store = InMemoryRbacStore::new();
    let user_id = UserId::new();
    let org_id = OrgId::new();
    let role_id = RoleId::new();
    store
        .add_membership(Membership::org_wide(user_id, role_id, org_id))
        .await;
    store
        .add_membership(Membership::org_wide(user_id, role_id, org_id))
        .await;

    let roles = store.find_role_ids_for_user_in_org(user_id, org_id).await;

    assert_eq!(roles.ok(), Some(vec![role_id]));
}

#[tokio::test]
async fn system_admin_flag_can_be_cleared() {
    let store = InMemoryRbacStore::new();
    let user_id = UserId::new();
    let system_role = role("system_admin", RoleScope::System);
    let system_role_id = system_role.role_id();
    store.save_role(system_role, []).await;

    store.set_system_admin(user_id, true).await;
    assert_eq!(store.is_system_admin(user_id).await.ok(), Some(true));
    store.set_system_admin(user_id, false).await;
    assert_eq!(store.is_system_admin(user_id).await.ok(), Some(false));
    assert_eq!(
        store.find_system_scope_role_id().await.ok(),
        Some(Some(system_role_id))
    );
}

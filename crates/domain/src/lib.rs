//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod context;
mod membership;
mod security;

pub use context::{
    ContextSource, ContextSources, ORG_ID_FIELD, ORG_ID_HEADER, PROJECT_ID_FIELD,
    PROJECT_ID_HEADER, ScopeContext, resolve_org_context, resolve_project_context,
};
pub use membership::Membership;
pub use security::{ADMIN_ROLE_NAME, Permission, PermissionSlug, Role, RoleScope};

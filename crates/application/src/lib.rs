//! Application services and ports.

#![forbid(unsafe_code)]

mod access_service;
mod identity_ports;
mod permission_cache;
mod rbac_ports;
mod scope_resolver;

#[cfg(test)]
mod test_support;

pub use access_service::{AccessGrant, AccessRequirement, AccessService, AdminRoleBypass};
pub use identity_ports::IdentityVerifier;
pub use permission_cache::{PermissionCache, PermissionCacheStats, PermissionSnapshot};
pub use rbac_ports::{RbacStore, RolePermissionPair};
pub use scope_resolver::{ResolvedScope, ScopeGrant, ScopeResolver};

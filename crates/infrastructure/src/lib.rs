//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_rbac_store;
mod jwt_identity_verifier;
mod postgres_rbac_store;

pub use in_memory_rbac_store::InMemoryRbacStore;
pub use jwt_identity_verifier::{AccessTokenClaims, JwtIdentityVerifier, MIN_JWT_SECRET_LEN};
pub use postgres_rbac_store::PostgresRbacStore;

use std::sync::Arc;

use helpdesk_application::{AccessService, IdentityVerifier};
use sqlx::PgPool;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub access_service: AccessService,
    pub identity_verifier: Arc<dyn IdentityVerifier>,
    pub postgres_pool: Option<PgPool>,
}

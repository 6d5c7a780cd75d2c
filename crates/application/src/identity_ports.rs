use helpdesk_core::{AppResult, UserIdentity};

/// Port for validating bearer credentials. Token issuance lives outside this
/// backend; only verification is needed to produce the request actor.
pub trait IdentityVerifier: Send + Sync {
    /// Verifies a bearer token and returns the actor it identifies.
    ///
    /// Invalid, expired or malformed tokens yield
    /// [`helpdesk_core::AppError::Unauthorized`].
    fn verify_bearer_token(&self, token: &str) -> AppResult<UserIdentity>;
}

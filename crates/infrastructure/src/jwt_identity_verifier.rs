use std::str::FromStr;

use helpdesk_application::IdentityVerifier;
use helpdesk_core::{AppError, AppResult, UserId, UserIdentity};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Minimum accepted HS256 secret length in bytes.
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Claims carried by helpdesk access tokens. `sub` is the user UUID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// User id.
    pub sub: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Email address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Expiry as seconds since the Unix epoch.
    pub exp: u64,
}

/// Verifies HS256-signed bearer tokens.
#[derive(Clone)]
pub struct JwtIdentityVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityVerifier {
    /// Creates a verifier for the shared secret.
    pub fn new(secret: &str) -> AppResult<Self> {
        if secret.len() < MIN_JWT_SECRET_LEN {
            return Err(AppError::Validation(format!(
                "JWT secret must be at least {MIN_JWT_SECRET_LEN} bytes"
            )));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }
}

impl IdentityVerifier for JwtIdentityVerifier {
    fn verify_bearer_token(&self, token: &str) -> AppResult<UserIdentity> {
        let data = decode::<AccessTokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|error| {
                debug!(%error, "rejected bearer token");
                AppError::Unauthorized(format!("invalid bearer token: {error}"))
            })?;
        let claims = data.claims;

        let user_id = UserId::from_str(claims.sub.as_str()).map_err(|_| {
            AppError::Unauthorized(format!("token subject '{}' is not a user id", claims.sub))
        })?;
        let display_name = claims
            .name
            .clone()
            .or_else(|| claims.email.clone())
            .unwrap_or_else(|| claims.sub.clone());

        Ok(UserIdentity::new(user_id, display_name, claims.email))
    }
}

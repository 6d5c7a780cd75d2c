//! Shared primitives for all Rust crates in the helpdesk backend.

#![forbid(unsafe_code)]

/// Authentication primitives shared across services.
pub mod auth;
mod ids;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use auth::UserIdentity;
pub use ids::{OrgId, ProjectId, RoleId, UserId};

/// Result type used across helpdesk crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Common application error categories.
///
/// Errors are `Clone` so a single failed store round-trip can be reported to
/// every caller that was waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// No authenticated actor is attached to the request.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Actor is authenticated but blocked by authorization policy.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Permission cache has never completed a load.
    #[error("permission cache unavailable: {0}")]
    CacheUnavailable(String),

    /// Backing store query failed.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::{AppError, NonEmptyString, OrgId};

    #[test]
    fn non_empty_string_rejects_whitespace() {
        let result = NonEmptyString::new("   ");
        assert!(result.is_err());
    }

    #[test]
    fn org_id_formats_as_uuid() {
        let org_id = OrgId::new();
        assert_eq!(org_id.to_string().len(), 36);
    }

    #[test]
    fn store_errors_render_their_category() {
        let error = AppError::StoreUnavailable("connection refused".to_owned());
        assert_eq!(error.to_string(), "store unavailable: connection refused");
    }
}

use serde::{Deserialize, Serialize};

use crate::UserId;

/// Authenticated actor produced by token validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    user_id: UserId,
    display_name: String,
    email: Option<String>,
}

impl UserIdentity {
    /// Creates a user identity from verified token claims.
    #[must_use]
    pub fn new(user_id: UserId, display_name: impl Into<String>, email: Option<String>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            email,
        }
    }

    /// Returns the stable user identifier.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the display name for the current user.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_str()
    }

    /// Returns the email, if the token carried one.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }
}

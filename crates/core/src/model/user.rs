use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::UserId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UserProfileError {
    #[error("name cannot be empty")]
    BlankName,
    #[error("email cannot be empty")]
    BlankEmail,
    #[error("email is not valid")]
    InvalidEmail,
}

/// Locally cached profile for a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    id: UserId,
    name: String,
    email: String,
}

impl UserProfile {
    /// Builds a profile, trimming name and email.
    ///
    /// # Errors
    ///
    /// Returns `UserProfileError` if the name or email is blank, or the email
    /// has no `@` separating a local part from a domain.
    pub fn new(
        id: UserId,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> Result<Self, UserProfileError> {
        let name = name.into().trim().to_owned();
        let email = email.into().trim().to_owned();
        if name.is_empty() {
            return Err(UserProfileError::BlankName);
        }
        if email.is_empty() {
            return Err(UserProfileError::BlankEmail);
        }
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
            _ => return Err(UserProfileError::InvalidEmail),
        }
        Ok(Self { id, name, email })
    }

    #[must_use]
    pub fn id(&self) -> &UserId {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }
}

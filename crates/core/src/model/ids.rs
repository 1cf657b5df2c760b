use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MAX_USER_ID_LEN: usize = 128;

/// Identifier issued by the authentication backend for a signed-in user.
///
/// The same value keys the local rows and the remote progress document, so it
/// must be usable as a single URL path segment.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UserIdError {
    #[error("user id cannot be empty")]
    Empty,
    #[error("user id exceeds 128 characters")]
    TooLong,
    #[error("user id contains an invalid character: {0:?}")]
    InvalidChar(char),
}

impl UserId {
    /// Validates and wraps a raw user id. Surrounding whitespace is trimmed.
    ///
    /// # Errors
    ///
    /// Returns `UserIdError` if the id is blank, too long, or contains `/`,
    /// `?`, `#`, or whitespace.
    pub fn new(raw: impl Into<String>) -> Result<Self, UserIdError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(UserIdError::Empty);
        }
        if trimmed.chars().count() > MAX_USER_ID_LEN {
            return Err(UserIdError::TooLong);
        }
        if let Some(bad) = trimmed
            .chars()
            .find(|c| matches!(c, '/' | '?' | '#') || c.is_whitespace())
        {
            return Err(UserIdError::InvalidChar(bad));
        }
        Ok(Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UserId {
    type Err = UserIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for UserId {
    type Error = UserIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_surrounding_whitespace() {
        let id = UserId::new("  abc123 ").unwrap();
        assert_eq!(id.as_str(), "abc123");
        assert_eq!(id.to_string(), "abc123");
    }

    #[test]
    fn rejects_blank() {
        assert_eq!(UserId::new("   "), Err(UserIdError::Empty));
    }

    #[test]
    fn rejects_path_separators() {
        assert_eq!(UserId::new("a/b"), Err(UserIdError::InvalidChar('/')));
        assert_eq!(UserId::new("a b"), Err(UserIdError::InvalidChar(' ')));
    }

    #[test]
    fn rejects_overlong() {
        let raw = "x".repeat(MAX_USER_ID_LEN + 1);
        assert_eq!(UserId::new(raw), Err(UserIdError::TooLong));
    }

    #[test]
    fn deserialize_validates() {
        let ok: UserId = serde_json::from_str("\"uid-1\"").unwrap();
        assert_eq!(ok.as_str(), "uid-1");
        assert!(serde_json::from_str::<UserId>("\"\"").is_err());
    }
}

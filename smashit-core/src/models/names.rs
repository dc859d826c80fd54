//! Text field validation for names, usernames and identifiers

use serde::Serialize;

use super::ValidationError;

/// Maximum length for display names (organizations, spaces, users, bookings)
const MAX_NAME_LEN: usize = 128;

/// Maximum length for usernames
const MAX_USERNAME_LEN: usize = 64;

/// Maximum length for external identity ids
const MAX_EXTERNAL_ID_LEN: usize = 128;

/// Maximum length for free-form descriptions
const MAX_DESCRIPTION_LEN: usize = 2048;

/// Validated display name, stored exactly as submitted.
///
/// Errors carry the field name it was validated as so they point at the
/// right JSON key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct EntityName(String);

impl EntityName {
    /// Create a new name.
    ///
    /// # Rules
    /// - Not empty or whitespace only
    /// - Max 128 characters
    /// - Kept verbatim, surrounding whitespace included
    ///
    /// # Example
    /// ```
    /// use smashit_core::EntityName;
    ///
    /// assert!(EntityName::new("name", "Meeting Room A").is_ok());
    /// assert!(EntityName::new("name", "   ").is_err());
    /// ```
    pub fn new(field: &'static str, s: &str) -> Result<Self, ValidationError> {
        if s.trim().is_empty() {
            return Err(ValidationError::Empty { field });
        }

        if s.chars().count() > MAX_NAME_LEN {
            return Err(ValidationError::TooLong {
                field,
                max: MAX_NAME_LEN,
            });
        }

        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for EntityName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Validated login name: no whitespace, at most 64 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        if s.is_empty() {
            return Err(ValidationError::Empty { field: "username" });
        }

        if s.chars().count() > MAX_USERNAME_LEN {
            return Err(ValidationError::TooLong {
                field: "username",
                max: MAX_USERNAME_LEN,
            });
        }

        if s.chars().any(char::is_whitespace) {
            return Err(ValidationError::InvalidFormat {
                field: "username",
                reason: "must not contain whitespace",
            });
        }

        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Identity assigned to a user by the upstream auth provider.
///
/// Opaque: only emptiness and length are checked, and the value is kept
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ExternalUserId(String);

impl ExternalUserId {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        if s.trim().is_empty() {
            return Err(ValidationError::Empty { field: "userId" });
        }

        if s.chars().count() > MAX_EXTERNAL_ID_LEN {
            return Err(ValidationError::TooLong {
                field: "userId",
                max: MAX_EXTERNAL_ID_LEN,
            });
        }

        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Optional free-form description. Empty strings are allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Description(String);

impl Description {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        if s.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(ValidationError::TooLong {
                field: "description",
                max: MAX_DESCRIPTION_LEN,
            });
        }

        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

//! Email address validation

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::ValidationError;

const MAX_EMAIL_LEN: usize = 254;

/// Deliberately loose: one `@`, no whitespace, a dot in the domain.
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("invalid email regex"));

/// Validated email address, stored exactly as submitted.
///
/// Case is preserved, so `Jane@x.com` and `jane@x.com` are distinct
/// addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Create a new email address.
    ///
    /// # Example
    /// ```
    /// use smashit_core::Email;
    ///
    /// assert_eq!(Email::new("Jane@Example.com").unwrap().as_str(), "Jane@Example.com");
    /// assert!(Email::new("not-an-email").is_err());
    /// ```
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        if s.trim().is_empty() {
            return Err(ValidationError::Empty { field: "email" });
        }

        if s.chars().count() > MAX_EMAIL_LEN {
            return Err(ValidationError::TooLong {
                field: "email",
                max: MAX_EMAIL_LEN,
            });
        }

        // Surrounding whitespace fails the pattern too.
        if !EMAIL_RE.is_match(s) {
            return Err(ValidationError::InvalidFormat {
                field: "email",
                reason: "must be a valid email address",
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

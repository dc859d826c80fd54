//! Validation error types

use thiserror::Error;

/// Validation error for client-supplied fields
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// One or more required fields were absent from the request body
    #[error("Missing required fields: {}", .fields.join(", "))]
    Missing { fields: Vec<&'static str> },

    /// Field is empty when it shouldn't be
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// Field exceeds maximum length
    #[error("{field} exceeds maximum length of {max} characters")]
    TooLong { field: &'static str, max: usize },

    /// String doesn't match required format (e.g., email)
    #[error("{field}: {reason}")]
    InvalidFormat {
        field: &'static str,
        reason: &'static str,
    },

    /// Number below the allowed minimum
    #[error("{field} must be at least {min} (got {value})")]
    OutOfRange {
        field: &'static str,
        min: i64,
        value: i64,
    },

    /// Invalid enum variant
    #[error("invalid {field} value: '{value}'")]
    InvalidVariant { field: &'static str, value: String },
}

impl ValidationError {
    /// Build a `Missing` error from `(field, is_absent)` pairs.
    ///
    /// Only the absent fields are reported, in the order given.
    pub fn missing<I>(fields: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, bool)>,
    {
        Self::Missing {
            fields: fields
                .into_iter()
                .filter_map(|(field, absent)| absent.then_some(field))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ValidationError::TooLong {
            field: "name",
            max: 128,
        };
        assert_eq!(
            err.to_string(),
            "name exceeds maximum length of 128 characters"
        );
    }

    #[test]
    fn missing_lists_only_absent_fields() {
        let err = ValidationError::missing([("name", false), ("email", true), ("userId", true)]);
        assert_eq!(err.to_string(), "Missing required fields: email, userId");
    }

    #[test]
    fn out_of_range_display() {
        let err = ValidationError::OutOfRange {
            field: "maxBookings",
            min: 1,
            value: 0,
        };
        assert_eq!(err.to_string(), "maxBookings must be at least 1 (got 0)");
    }
}

//! Space capacity

use serde::Serialize;

use super::ValidationError;

/// Maximum number of live bookings a space accepts. Always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct MaxBookings(i32);

impl MaxBookings {
    pub const MIN: i32 = 1;

    pub fn new(value: i64) -> Result<Self, ValidationError> {
        if value < i64::from(Self::MIN) {
            return Err(ValidationError::OutOfRange {
                field: "maxBookings",
                min: i64::from(Self::MIN),
                value,
            });
        }

        i32::try_from(value)
            .map(Self)
            .map_err(|_| ValidationError::InvalidFormat {
                field: "maxBookings",
                reason: "must fit in a 32-bit integer",
            })
    }

    pub fn get(self) -> i32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_and_negative() {
        assert!(MaxBookings::new(0).is_err());
        assert!(MaxBookings::new(-3).is_err());
    }

    #[test]
    fn rejects_overflow() {
        let err = MaxBookings::new(i64::from(i32::MAX) + 1).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidFormat { .. }));
    }
}

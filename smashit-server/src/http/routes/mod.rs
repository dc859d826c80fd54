//! Route handlers organized by resource

pub mod bookings;
pub mod organizations;
pub mod root;
pub mod spaces;
pub mod users;

use smashit_core::{Description, EntityName, ValidationError};
use uuid::Uuid;

fn description(value: Option<String>) -> Result<Option<Description>, ValidationError> {
    value.as_deref().map(Description::new).transpose()
}

/// `?name=` goes through the same validation as a stored name, so a lookup
/// only matches a value that could have been stored.
fn query_name(value: Option<&str>) -> Result<Option<EntityName>, ValidationError> {
    value.map(|raw| EntityName::new("name", raw)).transpose()
}

/// Parse an optional id given as a query parameter.
fn query_id(field: &'static str, value: Option<&str>) -> Result<Option<Uuid>, ValidationError> {
    value
        .map(|raw| {
            Uuid::parse_str(raw.trim()).map_err(|_| ValidationError::InvalidFormat {
                field,
                reason: "invalid UUID format",
            })
        })
        .transpose()
}

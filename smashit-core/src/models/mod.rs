//! Domain models with validation at construction
//!
//! All client input is validated when creating these types.
//! Invalid input returns ValidationError, not panic.

pub mod capacity;
pub mod email;
pub mod names;
pub mod status;
pub mod validation;

pub use capacity::MaxBookings;
pub use email::Email;
pub use names::{Description, EntityName, ExternalUserId, Username};
pub use status::BookingStatus;
pub use validation::ValidationError;

//! smashit-core: validated domain types and the named logger shared by the
//! server and the CLI.

pub mod logger;
pub mod models;

pub use logger::Logger;
pub use models::{
    BookingStatus, Description, Email, EntityName, ExternalUserId, MaxBookings, Username,
    ValidationError,
};

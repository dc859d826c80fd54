//! API error types with IntoResponse
//!
//! Every error becomes `{ "error": "<message>" }` with a matching status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use smashit_core::ValidationError;
use uuid::Uuid;

use crate::db::DbError;

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Field validation failed (400)
    Validation(ValidationError),

    /// Body was not the JSON we expect (400)
    BadRequest { message: String },

    /// Resource not found (404)
    NotFound { resource: &'static str, id: String },

    /// Unique constraint hit (409)
    Conflict { resource: &'static str, field: String },

    /// Space already holds `max_bookings` live bookings (400)
    CapacityExceeded { space_id: Uuid, max_bookings: i32 },

    /// Missing or wrong `x-api-key` (401)
    Unauthorized,

    /// Database error (500, logged)
    Database(DbError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest { .. } | Self::CapacityExceeded { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Validation(e) => e.to_string(),
            Self::BadRequest { message } => message.clone(),
            Self::NotFound { resource, id } => format!("{resource} '{id}' not found"),
            Self::Conflict { resource, field } => {
                format!("{resource} with this {field} already exists")
            }
            Self::CapacityExceeded {
                space_id,
                max_bookings,
            } => format!("space '{space_id}' is fully booked (maxBookings = {max_bookings})"),
            Self::Unauthorized => "Unauthorized".to_owned(),
            Self::Database(e) => {
                // Log the actual error, return generic message
                tracing::error!("Database error: {}", e);
                "an internal error occurred".to_owned()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound { resource, id } => Self::NotFound { resource, id },
            DbError::Conflict { resource, field } => Self::Conflict { resource, field },
            DbError::CapacityExceeded {
                space_id,
                max_bookings,
            } => Self::CapacityExceeded {
                space_id,
                max_bookings,
            },
            DbError::Sqlx(_) => Self::Database(e),
        }
    }
}

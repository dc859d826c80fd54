//! Booking endpoints
//!
//! Creation is where the capacity rule bites: a space accepts at most
//! `maxBookings` live (not cancelled) bookings. Updates are not re-checked.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use smashit_core::{BookingStatus, EntityName, Logger, ValidationError};
use tracing::instrument;
use uuid::Uuid;

use super::query_id;
use crate::db::{BookingFilter, BookingPatch, NewBooking};
use crate::http::dto::BookingResponse;
use crate::http::error::ApiError;
use crate::http::extractors::{JsonBody, ValidUuid};
use crate::http::server::AppState;

const LOG: Logger = Logger::new("bookings");

/// Body of POST and PUT /bookings
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub user_id: Option<Uuid>,
    pub space_id: Option<Uuid>,
    pub name: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub status: Option<String>,
}

fn status(value: Option<&str>) -> Result<Option<BookingStatus>, ValidationError> {
    value.map(str::parse).transpose()
}

impl BookingRequest {
    fn into_new(self) -> Result<NewBooking, ValidationError> {
        match (self.user_id, self.space_id, self.date) {
            (Some(user_id), Some(space_id), Some(date)) => Ok(NewBooking {
                user_id,
                space_id,
                name: self
                    .name
                    .map(|n| EntityName::new("name", &n))
                    .transpose()?,
                date,
                status: status(self.status.as_deref())?.unwrap_or_default(),
            }),
            (user_id, space_id, date) => Err(ValidationError::missing([
                ("userId", user_id.is_none()),
                ("spaceId", space_id.is_none()),
                ("date", date.is_none()),
            ])),
        }
    }

    fn into_patch(self) -> Result<BookingPatch, ValidationError> {
        Ok(BookingPatch {
            user_id: self.user_id,
            space_id: self.space_id,
            name: self
                .name
                .map(|n| EntityName::new("name", &n))
                .transpose()?,
            date: self.date,
            status: status(self.status.as_deref())?,
        })
    }
}

/// GET /bookings query params
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub user_id: Option<String>,
    pub space_id: Option<String>,
}

impl ListParams {
    fn into_filter(self) -> Result<BookingFilter, ValidationError> {
        Ok(BookingFilter {
            user_id: query_id("userId", self.user_id.as_deref())?,
            space_id: query_id("spaceId", self.space_id.as_deref())?,
        })
    }
}

fn not_found(id: Uuid) -> ApiError {
    ApiError::NotFound {
        resource: "booking",
        id: id.to_string(),
    }
}

/// GET /bookings - optionally narrowed by `?userId=` and/or `?spaceId=`
async fn list_bookings(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<BookingResponse>>, ApiError> {
    let filter = params.into_filter()?;
    let bookings = state.repos.bookings.find_all(filter).await?;
    Ok(Json(bookings.into_iter().map(BookingResponse::from).collect()))
}

/// POST /bookings
#[instrument(skip(state, req))]
async fn create_booking(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<BookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), ApiError> {
    let new = req.into_new()?;
    let space_id = new.space_id;

    let booking = match state.repos.bookings.create(new).await {
        Ok(booking) => booking,
        Err(e) => {
            LOG.warn(format_args!("booking for space {space_id} refused: {e}"));
            return Err(e.into());
        }
    };

    LOG.log(format_args!(
        "created booking {} for space {} on {}",
        booking.booking.id,
        space_id,
        booking.booking.date.to_rfc3339()
    ));

    Ok((StatusCode::CREATED, Json(booking.into())))
}

/// GET /bookings/{id}
async fn get_booking(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking = state
        .repos
        .bookings
        .find_by_id(id)
        .await?
        .ok_or_else(|| not_found(id))?;

    Ok(Json(booking.into()))
}

/// PUT /bookings/{id}
#[instrument(skip(state, req))]
async fn update_booking(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    JsonBody(req): JsonBody<BookingRequest>,
) -> Result<Json<BookingResponse>, ApiError> {
    let patch = req.into_patch()?;
    let booking = state
        .repos
        .bookings
        .update(id, patch)
        .await?
        .ok_or_else(|| not_found(id))?;

    LOG.log(format_args!(
        "updated booking {id} (status {})",
        booking.booking.status
    ));
    Ok(Json(booking.into()))
}

/// DELETE /bookings/{id}
#[instrument(skip(state))]
async fn delete_booking(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
) -> Result<StatusCode, ApiError> {
    state
        .repos
        .bookings
        .delete(id)
        .await?
        .ok_or_else(|| not_found(id))?;

    LOG.log(format_args!("deleted booking {id}"));
    Ok(StatusCode::NO_CONTENT)
}

/// Booking routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", get(list_bookings).post(create_booking))
        .route(
            "/bookings/{id}",
            get(get_booking).put(update_booking).delete(delete_booking),
        )
}

//! Space endpoints

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use smashit_core::{EntityName, Logger, MaxBookings, ValidationError};
use tracing::instrument;
use uuid::Uuid;

use super::{description, query_name};
use crate::db::{NewSpace, SpacePatch};
use crate::http::dto::{AvailabilityResponse, SpaceResponse};
use crate::http::error::ApiError;
use crate::http::extractors::{JsonBody, ValidUuid};
use crate::http::server::AppState;

const LOG: Logger = Logger::new("spaces");

/// Body of POST and PUT /spaces
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub max_bookings: Option<i64>,
    pub organization_id: Option<Uuid>,
}

impl SpaceRequest {
    fn into_new(self) -> Result<NewSpace, ValidationError> {
        match (self.name, self.max_bookings) {
            (Some(name), Some(max_bookings)) => Ok(NewSpace {
                name: EntityName::new("name", &name)?,
                description: description(self.description)?,
                max_bookings: MaxBookings::new(max_bookings)?,
                organization_id: self.organization_id,
            }),
            (name, max_bookings) => Err(ValidationError::missing([
                ("name", name.is_none()),
                ("maxBookings", max_bookings.is_none()),
            ])),
        }
    }

    fn into_patch(self) -> Result<SpacePatch, ValidationError> {
        Ok(SpacePatch {
            name: self
                .name
                .map(|n| EntityName::new("name", &n))
                .transpose()?,
            description: description(self.description)?,
            max_bookings: self.max_bookings.map(MaxBookings::new).transpose()?,
            organization_id: self.organization_id,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub name: Option<String>,
}

fn not_found(id: Uuid) -> ApiError {
    ApiError::NotFound {
        resource: "space",
        id: id.to_string(),
    }
}

/// GET /spaces - all spaces, or the one with `?name=`
async fn list_spaces(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<SpaceResponse>>, ApiError> {
    let spaces = match query_name(params.name.as_deref())? {
        Some(name) => state
            .repos
            .spaces
            .find_by_name(name.as_str())
            .await?
            .into_iter()
            .collect(),
        None => state.repos.spaces.find_all().await?,
    };

    Ok(Json(spaces.into_iter().map(SpaceResponse::from).collect()))
}

/// POST /spaces
#[instrument(skip(state, req))]
async fn create_space(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<SpaceRequest>,
) -> Result<(StatusCode, Json<SpaceResponse>), ApiError> {
    let new = req.into_new()?;
    let space = state.repos.spaces.create(new).await?;

    LOG.log(format_args!(
        "created space {} ({}, maxBookings = {})",
        space.space.id, space.space.name, space.space.max_bookings
    ));

    Ok((StatusCode::CREATED, Json(space.into())))
}

/// GET /spaces/{id}
async fn get_space(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
) -> Result<Json<SpaceResponse>, ApiError> {
    let space = state
        .repos
        .spaces
        .find_by_id(id)
        .await?
        .ok_or_else(|| not_found(id))?;

    Ok(Json(space.into()))
}

/// GET /spaces/{id}/availability
async fn get_availability(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    let space = state
        .repos
        .spaces
        .find_by_id(id)
        .await?
        .ok_or_else(|| not_found(id))?;
    let live = state.repos.spaces.count_bookings(id).await?;

    Ok(Json(AvailabilityResponse::new(space.space.max_bookings, live)))
}

/// PUT /spaces/{id}
#[instrument(skip(state, req))]
async fn update_space(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    JsonBody(req): JsonBody<SpaceRequest>,
) -> Result<Json<SpaceResponse>, ApiError> {
    let patch = req.into_patch()?;
    let space = state
        .repos
        .spaces
        .update(id, patch)
        .await?
        .ok_or_else(|| not_found(id))?;

    LOG.log(format_args!("updated space {id}"));
    Ok(Json(space.into()))
}

/// DELETE /spaces/{id}
#[instrument(skip(state))]
async fn delete_space(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
) -> Result<StatusCode, ApiError> {
    state
        .repos
        .spaces
        .delete(id)
        .await?
        .ok_or_else(|| not_found(id))?;

    LOG.log(format_args!("deleted space {id}"));
    Ok(StatusCode::NO_CONTENT)
}

/// Space routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/spaces", get(list_spaces).post(create_space))
        .route(
            "/spaces/{id}",
            get(get_space).put(update_space).delete(delete_space),
        )
        .route("/spaces/{id}/availability", get(get_availability))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::http::routes::testing::{app, assert_round_trip, create, id_of, send};

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let app = app();
        let org = create(&app, "/organizations", json!({ "name": "Host" })).await;

        let body = assert_round_trip(
            &app,
            "/spaces",
            json!({
                "name": "Room 1",
                "description": "Second floor, by the window",
                "maxBookings": 6,
                "organizationId": org["id"],
            }),
        )
        .await;
        assert_eq!(body["bookings"], json!([]));
    }

    #[tokio::test]
    async fn missing_fields_are_listed() {
        let (status, body) = send(
            &app(),
            Method::POST,
            "/spaces",
            Some(json!({ "description": "no name, no capacity" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required fields: name, maxBookings");
    }

    #[tokio::test]
    async fn capacity_below_one_is_rejected() {
        let (status, body) = send(
            &app(),
            Method::POST,
            "/spaces",
            Some(json!({ "name": "Closet", "maxBookings": 0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "maxBookings must be at least 1 (got 0)");
    }

    #[tokio::test]
    async fn unknown_organization_is_404() {
        let (status, _) = send(
            &app(),
            Method::POST,
            "/spaces",
            Some(json!({
                "name": "Floating",
                "maxBookings": 2,
                "organizationId": "6f1c2a52-0000-4000-8000-000000000000",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn put_max_bookings_changes_only_that_field() {
        let app = app();
        let space = create(
            &app,
            "/spaces",
            json!({ "name": "Studio", "description": "Quiet", "maxBookings": 2 }),
        )
        .await;
        let id = id_of(&space);

        let (status, body) = send(
            &app,
            Method::PUT,
            &format!("/spaces/{id}"),
            Some(json!({ "maxBookings": 7 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["maxBookings"], 7);
        assert_eq!(body["name"], "Studio");
        assert_eq!(body["description"], "Quiet");
        assert_eq!(body["createdAt"], space["createdAt"]);
    }

    #[tokio::test]
    async fn put_unknown_space_is_404() {
        let (status, _) = send(
            &app(),
            Method::PUT,
            "/spaces/6f1c2a52-0000-4000-8000-000000000000",
            Some(json!({ "maxBookings": 3 })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn put_unknown_space_with_taken_name_is_404() {
        let app = app();
        create(&app, "/spaces", json!({ "name": "Taken", "maxBookings": 1 })).await;

        let (status, _) = send(
            &app,
            Method::PUT,
            "/spaces/00000000-0000-0000-0000-000000000000",
            Some(json!({ "name": "Taken" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn name_filter_is_exact() {
        let app = app();
        create(&app, "/spaces", json!({ "name": "Loft", "maxBookings": 1 })).await;

        let (_, found) = send(&app, Method::GET, "/spaces?name=Loft", None).await;
        assert_eq!(found.as_array().unwrap().len(), 1);

        let (_, missed) = send(&app, Method::GET, "/spaces?name=loft", None).await;
        assert_eq!(missed, json!([]));
    }

    #[tokio::test]
    async fn availability_counts_live_bookings() {
        let app = app();
        let space = create(&app, "/spaces", json!({ "name": "Pod", "maxBookings": 3 })).await;
        let space_id = id_of(&space);
        let user = create(
            &app,
            "/users",
            json!({
                "name": "Ada",
                "username": "ada",
                "email": "ada@example.com",
                "userId": "ext-ada",
            }),
        )
        .await;
        let user_id = id_of(&user);

        for status in ["confirmed", "cancelled"] {
            create(
                &app,
                "/bookings",
                json!({
                    "userId": user_id,
                    "spaceId": space_id,
                    "date": "2026-03-01T09:00:00Z",
                    "status": status,
                }),
            )
            .await;
        }

        let (status, body) = send(
            &app,
            Method::GET,
            &format!("/spaces/{space_id}/availability"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "maxBookings": 3, "liveBookings": 1, "remaining": 2 })
        );
    }

    #[tokio::test]
    async fn duplicate_name_is_409() {
        let app = app();
        create(&app, "/spaces", json!({ "name": "Same", "maxBookings": 1 })).await;
        let (status, _) = send(
            &app,
            Method::POST,
            "/spaces",
            Some(json!({ "name": "Same", "maxBookings": 4 })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }
}

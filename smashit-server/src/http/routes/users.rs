//! User endpoints

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Deserialize;
use smashit_core::{Email, EntityName, ExternalUserId, Logger, Username, ValidationError};
use tracing::instrument;
use uuid::Uuid;

use crate::db::{NewUser, UserPatch};
use crate::http::dto::UserResponse;
use crate::http::error::ApiError;
use crate::http::extractors::{JsonBody, ValidUuid};
use crate::http::server::AppState;

const LOG: Logger = Logger::new("users");

/// Body of POST and PUT /users
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRequest {
    pub name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    /// External identity from the auth provider
    pub user_id: Option<String>,
    pub is_admin: Option<bool>,
    pub organization_id: Option<Uuid>,
}

impl UserRequest {
    fn into_new(self) -> Result<NewUser, ValidationError> {
        match (self.name, self.username, self.email, self.user_id) {
            (Some(name), Some(username), Some(email), Some(user_id)) => Ok(NewUser {
                name: EntityName::new("name", &name)?,
                username: Username::new(&username)?,
                email: Email::new(&email)?,
                external_id: ExternalUserId::new(&user_id)?,
                is_admin: self.is_admin.unwrap_or(false),
                organization_id: self.organization_id,
            }),
            (name, username, email, user_id) => Err(ValidationError::missing([
                ("name", name.is_none()),
                ("username", username.is_none()),
                ("email", email.is_none()),
                ("userId", user_id.is_none()),
            ])),
        }
    }

    fn into_patch(self) -> Result<UserPatch, ValidationError> {
        Ok(UserPatch {
            name: self
                .name
                .map(|n| EntityName::new("name", &n))
                .transpose()?,
            username: self.username.as_deref().map(Username::new).transpose()?,
            email: self.email.as_deref().map(Email::new).transpose()?,
            external_id: self
                .user_id
                .as_deref()
                .map(ExternalUserId::new)
                .transpose()?,
            is_admin: self.is_admin,
            organization_id: self.organization_id,
        })
    }
}

fn not_found(id: Uuid) -> ApiError {
    ApiError::NotFound {
        resource: "user",
        id: id.to_string(),
    }
}

/// GET /users
async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = state.repos.users.find_all().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// POST /users
#[instrument(skip(state, req))]
async fn create_user(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<UserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let new = req.into_new()?;
    let user = state.repos.users.create(new).await?;

    LOG.log(format_args!(
        "created user {} ({})",
        user.user.id, user.user.username
    ));

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// GET /users/{id}
async fn get_user(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state
        .repos
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| not_found(id))?;

    Ok(Json(user.into()))
}

/// PUT /users/{id}
#[instrument(skip(state, req))]
async fn update_user(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    JsonBody(req): JsonBody<UserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let patch = req.into_patch()?;
    let user = state
        .repos
        .users
        .update(id, patch)
        .await?
        .ok_or_else(|| not_found(id))?;

    LOG.log(format_args!("updated user {id}"));
    Ok(Json(user.into()))
}

/// DELETE /users/{id}
#[instrument(skip(state))]
async fn delete_user(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
) -> Result<StatusCode, ApiError> {
    state
        .repos
        .users
        .delete(id)
        .await?
        .ok_or_else(|| not_found(id))?;

    LOG.log(format_args!("deleted user {id}"));
    Ok(StatusCode::NO_CONTENT)
}

/// User routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::{json, Value};

    use crate::http::routes::testing::{app, assert_round_trip, create, id_of, send};

    fn jane() -> Value {
        json!({
            "name": "Jane Doe",
            "username": "jane",
            "email": "Jane@Example.com",
            "userId": "auth0|jane",
        })
    }

    #[tokio::test]
    async fn missing_email_is_400_and_nothing_is_created() {
        let app = app();
        let mut body = jane();
        body.as_object_mut().unwrap().remove("email");

        let (status, err) = send(&app, Method::POST, "/users", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["error"], "Missing required fields: email");

        let (_, all) = send(&app, Method::GET, "/users", None).await;
        assert_eq!(all, json!([]));
    }

    #[tokio::test]
    async fn create_keeps_submitted_values_and_defaults_the_rest() {
        let app = app();
        let mut body = jane();
        body["name"] = json!("  Jane Doe ");

        let fetched = assert_round_trip(&app, "/users", body).await;
        assert_eq!(fetched["email"], "Jane@Example.com");
        assert_eq!(fetched["name"], "  Jane Doe ");
        assert_eq!(fetched["isAdmin"], false);
        assert!(fetched["organizationId"].is_null());
        assert!(fetched["organization"].is_null());
    }

    #[tokio::test]
    async fn create_then_get_round_trips_every_field() {
        let app = app();
        let org = create(&app, "/organizations", json!({ "name": "Guild" })).await;

        let fetched = assert_round_trip(
            &app,
            "/users",
            json!({
                "name": "Sam Admin",
                "username": "sam",
                "email": "Sam.Admin@Example.org",
                "userId": "auth0|sam",
                "isAdmin": true,
                "organizationId": org["id"],
            }),
        )
        .await;
        assert_eq!(fetched["organization"]["id"], org["id"]);
    }

    #[tokio::test]
    async fn emails_differing_in_case_are_distinct_users() {
        let app = app();
        create(&app, "/users", jane()).await;

        create(
            &app,
            "/users",
            json!({
                "name": "Other Jane",
                "username": "jane2",
                "email": "jane@example.com",
                "userId": "auth0|jane2",
            }),
        )
        .await;

        let (_, all) = send(&app, Method::GET, "/users", None).await;
        assert_eq!(all.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn padded_email_is_400() {
        let mut body = jane();
        body["email"] = json!(" jane@example.com ");
        let (status, _) = send(&app(), Method::POST, "/users", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn put_to_missing_user_with_taken_email_is_404() {
        let app = app();
        create(&app, "/users", jane()).await;

        let (status, _) = send(
            &app,
            Method::PUT,
            "/users/00000000-0000-0000-0000-000000000000",
            Some(json!({ "email": "Jane@Example.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_email_is_400() {
        let mut body = jane();
        body["email"] = json!("not-an-address");
        let (status, _) = send(&app(), Method::POST, "/users", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn duplicate_external_id_is_409() {
        let app = app();
        create(&app, "/users", jane()).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/users",
            Some(json!({
                "name": "Other",
                "username": "other",
                "email": "other@example.com",
                "userId": "auth0|jane",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "user with this userId already exists");
    }

    #[tokio::test]
    async fn organization_is_expanded() {
        let app = app();
        let org = create(&app, "/organizations", json!({ "name": "Guild" })).await;
        let mut body = jane();
        body["organizationId"] = org["id"].clone();

        let user = create(&app, "/users", body).await;
        assert_eq!(user["organization"]["name"], "Guild");

        let (_, org) = send(
            &app,
            Method::GET,
            &format!("/organizations/{}", id_of(&org)),
            None,
        )
        .await;
        assert_eq!(org["users"][0]["id"], user["id"]);
    }

    #[tokio::test]
    async fn put_promotes_to_admin() {
        let app = app();
        let user = create(&app, "/users", jane()).await;

        let (status, body) = send(
            &app,
            Method::PUT,
            &format!("/users/{}", id_of(&user)),
            Some(json!({ "isAdmin": true })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isAdmin"], true);
        assert_eq!(body["email"], "Jane@Example.com");
    }

    #[tokio::test]
    async fn delete_twice_is_404() {
        let app = app();
        let user = create(&app, "/users", jane()).await;
        let uri = format!("/users/{}", id_of(&user));

        let (status, _) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

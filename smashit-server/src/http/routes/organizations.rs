//! Organization endpoints

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use smashit_core::{EntityName, Logger, ValidationError};
use tracing::instrument;

use super::{description, query_name};
use crate::db::{NewOrganization, OrganizationPatch};
use crate::http::dto::OrganizationResponse;
use crate::http::error::ApiError;
use crate::http::extractors::{JsonBody, ValidUuid};
use crate::http::server::AppState;

const LOG: Logger = Logger::new("organizations");

/// Body of POST and PUT /organizations
#[derive(Debug, Deserialize)]
pub struct OrganizationRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl OrganizationRequest {
    fn into_new(self) -> Result<NewOrganization, ValidationError> {
        let Some(name) = self.name else {
            return Err(ValidationError::missing([("name", true)]));
        };

        Ok(NewOrganization {
            name: EntityName::new("name", &name)?,
            description: description(self.description)?,
        })
    }

    fn into_patch(self) -> Result<OrganizationPatch, ValidationError> {
        Ok(OrganizationPatch {
            name: self
                .name
                .map(|n| EntityName::new("name", &n))
                .transpose()?,
            description: description(self.description)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub name: Option<String>,
}

/// GET /organizations - all organizations, or the one with `?name=`
async fn list_organizations(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<OrganizationResponse>>, ApiError> {
    let organizations = match query_name(params.name.as_deref())? {
        Some(name) => state
            .repos
            .organizations
            .find_by_name(name.as_str())
            .await?
            .into_iter()
            .collect(),
        None => state.repos.organizations.find_all().await?,
    };

    Ok(Json(
        organizations
            .into_iter()
            .map(OrganizationResponse::from)
            .collect(),
    ))
}

/// POST /organizations
#[instrument(skip(state, req))]
async fn create_organization(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<OrganizationRequest>,
) -> Result<(StatusCode, Json<OrganizationResponse>), ApiError> {
    let new = req.into_new()?;
    let organization = state.repos.organizations.create(new).await?;

    LOG.log(format_args!(
        "created organization {} ({})",
        organization.organization.id, organization.organization.name
    ));

    Ok((StatusCode::CREATED, Json(organization.into())))
}

/// GET /organizations/{id}
async fn get_organization(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
) -> Result<Json<OrganizationResponse>, ApiError> {
    let organization = state
        .repos
        .organizations
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            resource: "organization",
            id: id.to_string(),
        })?;

    Ok(Json(organization.into()))
}

/// PUT /organizations/{id}
#[instrument(skip(state, req))]
async fn update_organization(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    JsonBody(req): JsonBody<OrganizationRequest>,
) -> Result<Json<OrganizationResponse>, ApiError> {
    let patch = req.into_patch()?;
    let organization = state
        .repos
        .organizations
        .update(id, patch)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            resource: "organization",
            id: id.to_string(),
        })?;

    LOG.log(format_args!("updated organization {id}"));
    Ok(Json(organization.into()))
}

/// DELETE /organizations/{id}
#[instrument(skip(state))]
async fn delete_organization(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
) -> Result<StatusCode, ApiError> {
    match state.repos.organizations.delete(id).await? {
        Some(_) => {
            LOG.log(format_args!("deleted organization {id}"));
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(ApiError::NotFound {
            resource: "organization",
            id: id.to_string(),
        }),
    }
}

/// Organization routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/organizations",
            get(list_organizations).post(create_organization),
        )
        .route(
            "/organizations/{id}",
            get(get_organization)
                .put(update_organization)
                .delete(delete_organization),
        )
}

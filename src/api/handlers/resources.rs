use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use http::StatusCode;
use serde::Deserialize;
use tracing::instrument;

use super::page;
use crate::api::server::{AppState, CreatedResult, JsonResult, RouteError};
use crate::auth::AuthUser;
use crate::db::models::ResourceId;
use crate::db::models::learning_path::RateRequest;
use crate::db::models::resource::{
    CompletionResult, CreateRecommendation, CreateResource, FlagRequest, Recommendation,
    RecommendationFilter, Resource, ResourceFilter, ResourceProvider, ResourceType,
    UpdateResource, UserResource,
};
use crate::db::prelude::*;

/// `GET /my-resources?bookmarked=true` and friends.
#[derive(Debug, Default, Deserialize)]
pub struct InteractionFilter {
    pub bookmarked: Option<bool>,
    pub completed: Option<bool>,
}

#[instrument(skip(state))]
pub async fn resource_types(State(state): State<Arc<AppState>>) -> JsonResult<Vec<ResourceType>> {
    Ok(Json(
        ResourceRepository::new(state.db_pool)
            .resource_types()
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn providers(State(state): State<Arc<AppState>>) -> JsonResult<Vec<ResourceProvider>> {
    Ok(Json(ResourceRepository::new(state.db_pool).providers().await?))
}

#[instrument(skip(state))]
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ResourceFilter>,
    Query(pagination): Query<Pagination>,
) -> JsonResult<PaginatedResponse<Resource>> {
    let rows = ResourceRepository::new(state.db_pool)
        .list(&filter, &pagination)
        .await?;

    Ok(Json(page(rows, &pagination)))
}

#[instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ResourceId>,
) -> JsonResult<Resource> {
    Ok(Json(ResourceRepository::new(state.db_pool).require(id).await?))
}

#[instrument(skip(state, req))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateResource>,
) -> CreatedResult<Resource> {
    let resource = ResourceRepository::new(state.db_pool)
        .create(user.id, &req)
        .await?;

    Ok((StatusCode::CREATED, Json(resource)))
}

#[instrument(skip(state, req))]
pub async fn update(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<ResourceId>,
    Json(req): Json<UpdateResource>,
) -> JsonResult<Resource> {
    Ok(Json(
        ResourceRepository::new(state.db_pool)
            .update(user.id, user.is_staff, id, &req)
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<ResourceId>,
) -> Result<StatusCode, RouteError> {
    ResourceRepository::new(state.db_pool)
        .delete(user.id, user.is_staff, id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn view(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<ResourceId>,
) -> JsonResult<UserResource> {
    Ok(Json(
        ResourceRepository::new(state.db_pool)
            .view(user.id, id)
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn bookmark(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<ResourceId>,
    Json(req): Json<FlagRequest>,
) -> JsonResult<UserResource> {
    Ok(Json(
        ResourceRepository::new(state.db_pool)
            .bookmark(user.id, id, req.value)
            .await?,
    ))
}

#[instrument(skip(state, req))]
pub async fn rate(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<ResourceId>,
    Json(req): Json<RateRequest>,
) -> JsonResult<Resource> {
    Ok(Json(
        ResourceRepository::new(state.db_pool)
            .rate(user.id, id, &req)
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn complete(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<ResourceId>,
    Json(req): Json<FlagRequest>,
) -> JsonResult<CompletionResult> {
    Ok(Json(
        ResourceRepository::new(state.db_pool)
            .complete(user.id, id, req.value)
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn interactions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(filter): Query<InteractionFilter>,
) -> JsonResult<Vec<UserResource>> {
    Ok(Json(
        ResourceRepository::new(state.db_pool)
            .interactions(user.id, filter.bookmarked, filter.completed)
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn recommendations(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<RecommendationFilter>,
) -> JsonResult<Vec<Recommendation>> {
    Ok(Json(
        ResourceRepository::new(state.db_pool)
            .recommendations(&filter)
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn create_recommendation(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateRecommendation>,
) -> CreatedResult<Recommendation> {
    let recommendation = ResourceRepository::new(state.db_pool)
        .create_recommendation(user.is_staff, &req)
        .await?;

    Ok((StatusCode::CREATED, Json(recommendation)))
}

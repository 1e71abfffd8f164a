use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use http::StatusCode;
use tracing::instrument;

use super::page;
use crate::api::server::{AppState, CreatedResult, JsonResult, RouteError};
use crate::auth::AuthUser;
use crate::db::models::learning_path::{
    Category, CreateLearningPath, CreateStep, Enrollment, EnrollmentProgress,
    EnrollmentProgressResult, LearningPath, LearningPathFilter, RateRequest, Skill, Step,
    UpdateLearningPath,
};
use crate::db::models::{EnrollmentId, LearningPathId};
use crate::db::prelude::*;

#[instrument(skip(state))]
pub async fn skills(State(state): State<Arc<AppState>>) -> JsonResult<Vec<Skill>> {
    Ok(Json(LearningPathRepository::new(state.db_pool).skills().await?))
}

#[instrument(skip(state))]
pub async fn categories(State(state): State<Arc<AppState>>) -> JsonResult<Vec<Category>> {
    Ok(Json(
        LearningPathRepository::new(state.db_pool)
            .categories()
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn list(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(filter): Query<LearningPathFilter>,
    Query(pagination): Query<Pagination>,
) -> JsonResult<PaginatedResponse<LearningPath>> {
    let rows = LearningPathRepository::new(state.db_pool)
        .list_visible(user.id, &filter, &pagination)
        .await?;

    Ok(Json(page(rows, &pagination)))
}

#[instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<LearningPathId>,
) -> JsonResult<LearningPath> {
    Ok(Json(
        LearningPathRepository::new(state.db_pool)
            .get_visible(user.id, id)
            .await?,
    ))
}

#[instrument(skip(state, req))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateLearningPath>,
) -> CreatedResult<LearningPath> {
    let path = LearningPathRepository::new(state.db_pool)
        .create(user.id, &req)
        .await?;

    Ok((StatusCode::CREATED, Json(path)))
}

#[instrument(skip(state, req))]
pub async fn update(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<LearningPathId>,
    Json(req): Json<UpdateLearningPath>,
) -> JsonResult<LearningPath> {
    Ok(Json(
        LearningPathRepository::new(state.db_pool)
            .update(user.id, id, &req)
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<LearningPathId>,
) -> Result<StatusCode, RouteError> {
    LearningPathRepository::new(state.db_pool)
        .delete(user.id, id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn enroll(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<LearningPathId>,
) -> CreatedResult<Enrollment> {
    let enrollment = LearningPathRepository::new(state.db_pool)
        .enroll(user.id, id)
        .await?;

    Ok((StatusCode::CREATED, Json(enrollment)))
}

#[instrument(skip(state, req))]
pub async fn rate(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<LearningPathId>,
    Json(req): Json<RateRequest>,
) -> JsonResult<LearningPath> {
    Ok(Json(
        LearningPathRepository::new(state.db_pool)
            .rate(user.id, id, &req)
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn steps(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<LearningPathId>,
) -> JsonResult<Vec<Step>> {
    Ok(Json(
        LearningPathRepository::new(state.db_pool)
            .steps(user.id, id)
            .await?,
    ))
}

#[instrument(skip(state, req))]
pub async fn create_step(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<LearningPathId>,
    Json(req): Json<CreateStep>,
) -> CreatedResult<Step> {
    let step = LearningPathRepository::new(state.db_pool)
        .create_step(user.id, id, &req)
        .await?;

    Ok((StatusCode::CREATED, Json(step)))
}

#[instrument(skip(state))]
pub async fn enrollments(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> JsonResult<Vec<Enrollment>> {
    Ok(Json(
        LearningPathRepository::new(state.db_pool)
            .enrollments(user.id)
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn enrollment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<EnrollmentId>,
) -> JsonResult<Enrollment> {
    Ok(Json(
        LearningPathRepository::new(state.db_pool)
            .enrollment(user.id, id)
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn update_progress(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<EnrollmentId>,
    Json(req): Json<EnrollmentProgress>,
) -> JsonResult<EnrollmentProgressResult> {
    Ok(Json(
        LearningPathRepository::new(state.db_pool)
            .update_progress(user.id, id, &req)
            .await?,
    ))
}

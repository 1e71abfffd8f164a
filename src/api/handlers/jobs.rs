use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use http::StatusCode;
use tracing::instrument;

use super::page;
use crate::api::server::{AppState, CreatedResult, JsonResult, RouteError};
use crate::auth::AuthUser;
use crate::db::models::job::{
    ApplyRequest, Company, JobApplication, JobFilter, JobListing, SavedJob,
};
use crate::db::models::{CompanyId, JobApplicationId, JobListingId, SavedJobId};
use crate::db::prelude::*;

#[instrument(skip(state))]
pub async fn companies(State(state): State<Arc<AppState>>) -> JsonResult<Vec<Company>> {
    Ok(Json(JobRepository::new(state.db_pool).companies().await?))
}

#[instrument(skip(state))]
pub async fn company(
    State(state): State<Arc<AppState>>,
    Path(id): Path<CompanyId>,
) -> JsonResult<Company> {
    Ok(Json(JobRepository::new(state.db_pool).company(id).await?))
}

#[instrument(skip(state))]
pub async fn listings(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<JobFilter>,
    Query(pagination): Query<Pagination>,
) -> JsonResult<PaginatedResponse<JobListing>> {
    let rows = JobRepository::new(state.db_pool)
        .listings(&filter, &pagination)
        .await?;

    Ok(Json(page(rows, &pagination)))
}

#[instrument(skip(state))]
pub async fn listing(
    State(state): State<Arc<AppState>>,
    Path(id): Path<JobListingId>,
) -> JsonResult<JobListing> {
    Ok(Json(JobRepository::new(state.db_pool).view(id).await?))
}

#[instrument(skip(state))]
pub async fn save(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<JobListingId>,
) -> CreatedResult<SavedJob> {
    let saved = JobRepository::new(state.db_pool).save(user.id, id).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

#[instrument(skip(state))]
pub async fn unsave(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<JobListingId>,
) -> Result<StatusCode, RouteError> {
    JobRepository::new(state.db_pool).unsave(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, req))]
pub async fn apply(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<JobListingId>,
    Json(req): Json<ApplyRequest>,
) -> CreatedResult<JobApplication> {
    let application = JobRepository::new(state.db_pool)
        .apply(user.id, id, &req)
        .await?;

    Ok((StatusCode::CREATED, Json(application)))
}

#[instrument(skip(state))]
pub async fn applications(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> JsonResult<Vec<JobApplication>> {
    Ok(Json(
        JobRepository::new(state.db_pool)
            .applications(user.id)
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn application(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<JobApplicationId>,
) -> JsonResult<JobApplication> {
    Ok(Json(
        JobRepository::new(state.db_pool)
            .application(user.id, id)
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn withdraw(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<JobApplicationId>,
) -> JsonResult<JobApplication> {
    Ok(Json(
        JobRepository::new(state.db_pool)
            .withdraw(user.id, id)
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn saved_jobs(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> JsonResult<Vec<SavedJob>> {
    Ok(Json(
        JobRepository::new(state.db_pool)
            .saved_jobs(user.id)
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn delete_saved_job(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<SavedJobId>,
) -> Result<StatusCode, RouteError> {
    JobRepository::new(state.db_pool)
        .delete_saved_job(user.id, id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

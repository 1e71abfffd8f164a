use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use http::StatusCode;
use serde::Serialize;
use tracing::instrument;

use super::page;
use crate::api::server::{AppState, CreatedResult, JsonResult};
use crate::auth::AuthUser;
use crate::db::models::mentorship::{
    CreateMentorProfile, CreateMentorReview, CreateMentorshipRequest, CreateMessage,
    MentorFilter, MentorProfile, MentorReview, Mentorship, MentorshipMessage,
    MentorshipRequest, MentorshipStatusChange, UpdateMentorProfile,
};
use crate::db::models::{MentorId, MentorshipId, MentorshipRequestId};
use crate::db::prelude::*;
use crate::domain::mentorship::RequestAction;

#[derive(Debug, Serialize)]
pub struct MarkedRead {
    pub marked_read: u64,
}

#[instrument(skip(state))]
pub async fn mentors(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<MentorFilter>,
    Query(pagination): Query<Pagination>,
) -> JsonResult<PaginatedResponse<MentorProfile>> {
    let rows = MentorshipRepository::new(state.db_pool)
        .mentors(&filter, &pagination)
        .await?;

    Ok(Json(page(rows, &pagination)))
}

#[instrument(skip(state))]
pub async fn profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<MentorId>,
) -> JsonResult<MentorProfile> {
    Ok(Json(MentorshipRepository::new(state.db_pool).require(id).await?))
}

#[instrument(skip(state, req))]
pub async fn create_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateMentorProfile>,
) -> CreatedResult<MentorProfile> {
    let profile = MentorshipRepository::new(state.db_pool)
        .create_profile(user.id, &req)
        .await?;

    Ok((StatusCode::CREATED, Json(profile)))
}

#[instrument(skip(state))]
pub async fn own_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> JsonResult<MentorProfile> {
    Ok(Json(
        MentorshipRepository::new(state.db_pool)
            .own_profile(user.id)
            .await?,
    ))
}

#[instrument(skip(state, req))]
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<MentorId>,
    Json(req): Json<UpdateMentorProfile>,
) -> JsonResult<MentorProfile> {
    Ok(Json(
        MentorshipRepository::new(state.db_pool)
            .update_profile(user.id, id, &req)
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn requests(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> JsonResult<Vec<MentorshipRequest>> {
    Ok(Json(
        MentorshipRepository::new(state.db_pool)
            .requests(user.id)
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn request(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<MentorshipRequestId>,
) -> JsonResult<MentorshipRequest> {
    Ok(Json(
        MentorshipRepository::new(state.db_pool)
            .request(user.id, id)
            .await?,
    ))
}

#[instrument(skip(state, req))]
pub async fn create_request(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateMentorshipRequest>,
) -> CreatedResult<MentorshipRequest> {
    let request = MentorshipRepository::new(state.db_pool)
        .create_request(user.id, &req)
        .await?;

    Ok((StatusCode::CREATED, Json(request)))
}

#[instrument(skip(state))]
pub async fn accept(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<MentorshipRequestId>,
) -> CreatedResult<Mentorship> {
    let mentorship = MentorshipRepository::new(state.db_pool)
        .accept(user.id, id)
        .await?;

    Ok((StatusCode::CREATED, Json(mentorship)))
}

#[instrument(skip(state))]
pub async fn reject(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<MentorshipRequestId>,
) -> JsonResult<MentorshipRequest> {
    Ok(Json(
        MentorshipRepository::new(state.db_pool)
            .close_request(user.id, id, RequestAction::Reject)
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<MentorshipRequestId>,
) -> JsonResult<MentorshipRequest> {
    Ok(Json(
        MentorshipRepository::new(state.db_pool)
            .close_request(user.id, id, RequestAction::Cancel)
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn mentorships(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> JsonResult<Vec<Mentorship>> {
    Ok(Json(
        MentorshipRepository::new(state.db_pool)
            .mentorships(user.id)
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn mentorship(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<MentorshipId>,
) -> JsonResult<Mentorship> {
    Ok(Json(
        MentorshipRepository::new(state.db_pool)
            .mentorship(user.id, id)
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn change_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<MentorshipId>,
    Json(change): Json<MentorshipStatusChange>,
) -> JsonResult<Mentorship> {
    Ok(Json(
        MentorshipRepository::new(state.db_pool)
            .change_status(user.id, id, &change)
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn reviews(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> JsonResult<Vec<MentorReview>> {
    Ok(Json(
        MentorshipRepository::new(state.db_pool)
            .reviews(user.id)
            .await?,
    ))
}

#[instrument(skip(state, req))]
pub async fn create_review(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateMentorReview>,
) -> CreatedResult<MentorReview> {
    let review = MentorshipRepository::new(state.db_pool)
        .create_review(user.id, &req)
        .await?;

    Ok((StatusCode::CREATED, Json(review)))
}

#[instrument(skip(state))]
pub async fn messages(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<MentorshipId>,
) -> JsonResult<Vec<MentorshipMessage>> {
    Ok(Json(
        MentorshipRepository::new(state.db_pool)
            .messages(user.id, id)
            .await?,
    ))
}

#[instrument(skip(state, req))]
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<MentorshipId>,
    Json(req): Json<CreateMessage>,
) -> CreatedResult<MentorshipMessage> {
    let message = MentorshipRepository::new(state.db_pool)
        .send_message(user.id, id, &req)
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

#[instrument(skip(state))]
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<MentorshipId>,
) -> JsonResult<MarkedRead> {
    let marked_read = MentorshipRepository::new(state.db_pool)
        .mark_read(user.id, id)
        .await?;

    Ok(Json(MarkedRead { marked_read }))
}

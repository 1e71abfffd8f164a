use std::sync::Arc;

use axum::extract::{Path, State};
use axum::{Extension, Json};
use http::StatusCode;
use tracing::instrument;

use crate::api::server::{AppState, CreatedResult, JsonResult, RouteError};
use crate::auth::AuthUser;
use crate::db::models::progress::{
    Achievement, CreateStepProgress, CreateUserSkill, EarnedAchievement, StepProgress,
    StepProgressResult, UpdateUserSkill, UserSkill,
};
use crate::db::models::{AchievementId, StepProgressId, UserSkillId};
use crate::db::prelude::*;
use crate::domain::progress::StepUpdate;

#[instrument(skip(state))]
pub async fn user_skills(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> JsonResult<Vec<UserSkill>> {
    Ok(Json(
        ProgressRepository::new(state.db_pool)
            .user_skills(user.id)
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn user_skill(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<UserSkillId>,
) -> JsonResult<UserSkill> {
    Ok(Json(
        ProgressRepository::new(state.db_pool)
            .user_skill(user.id, id)
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn create_user_skill(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateUserSkill>,
) -> CreatedResult<UserSkill> {
    let skill = ProgressRepository::new(state.db_pool)
        .create_user_skill(user.id, &req)
        .await?;

    Ok((StatusCode::CREATED, Json(skill)))
}

#[instrument(skip(state))]
pub async fn update_user_skill(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<UserSkillId>,
    Json(req): Json<UpdateUserSkill>,
) -> JsonResult<UserSkill> {
    Ok(Json(
        ProgressRepository::new(state.db_pool)
            .update_user_skill(user.id, id, &req)
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn delete_user_skill(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<UserSkillId>,
) -> Result<StatusCode, RouteError> {
    ProgressRepository::new(state.db_pool)
        .delete_user_skill(user.id, id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn step_progress_list(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> JsonResult<Vec<StepProgress>> {
    Ok(Json(
        ProgressRepository::new(state.db_pool)
            .step_progress_list(user.id)
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn step_progress(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<StepProgressId>,
) -> JsonResult<StepProgress> {
    Ok(Json(
        ProgressRepository::new(state.db_pool)
            .step_progress(user.id, id)
            .await?,
    ))
}

#[instrument(skip(state, req))]
pub async fn create_step_progress(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateStepProgress>,
) -> CreatedResult<StepProgress> {
    let progress = ProgressRepository::new(state.db_pool)
        .create_step_progress(user.id, &req)
        .await?;

    Ok((StatusCode::CREATED, Json(progress)))
}

#[instrument(skip(state))]
pub async fn update_step_progress(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<StepProgressId>,
    Json(update): Json<StepUpdate>,
) -> JsonResult<StepProgressResult> {
    Ok(Json(
        ProgressRepository::new(state.db_pool)
            .update_step_progress(user.id, id, &update)
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn achievements(State(state): State<Arc<AppState>>) -> JsonResult<Vec<Achievement>> {
    Ok(Json(
        ProgressRepository::new(state.db_pool)
            .achievements()
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn achievement(
    State(state): State<Arc<AppState>>,
    Path(id): Path<AchievementId>,
) -> JsonResult<Achievement> {
    Ok(Json(
        ProgressRepository::new(state.db_pool)
            .achievement(id)
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn my_achievements(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> JsonResult<Vec<EarnedAchievement>> {
    Ok(Json(
        ProgressRepository::new(state.db_pool)
            .earned_achievements(user.id)
            .await?,
    ))
}

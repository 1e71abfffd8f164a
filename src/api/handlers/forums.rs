use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use http::StatusCode;
use tracing::instrument;

use super::{Detail, page};
use crate::api::server::{AppState, CreatedResult, JsonResult, RouteError};
use crate::auth::AuthUser;
use crate::db::models::forum::{
    CreatePost, CreateStudyGroup, CreateTopic, ForumCategory, GroupMember, GroupMessage, Post,
    RoleChange, SolutionResult, StudyGroup, StudyGroupFilter, Topic, TopicFilter,
    UpdateStudyGroup, UpdateTopic,
};
use crate::db::models::mentorship::CreateMessage;
use crate::db::models::{GroupMemberId, PostId, StudyGroupId, TopicId};
use crate::db::prelude::*;

#[instrument(skip(state))]
pub async fn categories(State(state): State<Arc<AppState>>) -> JsonResult<Vec<ForumCategory>> {
    Ok(Json(ForumRepository::new(state.db_pool).categories().await?))
}

#[instrument(skip(state))]
pub async fn topics(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<TopicFilter>,
    Query(pagination): Query<Pagination>,
) -> JsonResult<PaginatedResponse<Topic>> {
    let rows = ForumRepository::new(state.db_pool)
        .topics(&filter, &pagination)
        .await?;

    Ok(Json(page(rows, &pagination)))
}

#[instrument(skip(state, req))]
pub async fn create_topic(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateTopic>,
) -> CreatedResult<Topic> {
    let topic = ForumRepository::new(state.db_pool)
        .create_topic(user.id, &req)
        .await?;

    Ok((StatusCode::CREATED, Json(topic)))
}

#[instrument(skip(state))]
pub async fn topic(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TopicId>,
) -> JsonResult<Topic> {
    Ok(Json(ForumRepository::new(state.db_pool).view_topic(id).await?))
}

#[instrument(skip(state, req))]
pub async fn update_topic(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<TopicId>,
    Json(req): Json<UpdateTopic>,
) -> JsonResult<Topic> {
    Ok(Json(
        ForumRepository::new(state.db_pool)
            .update_topic(user.id, user.is_staff, id, &req)
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn delete_topic(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<TopicId>,
) -> Result<StatusCode, RouteError> {
    ForumRepository::new(state.db_pool)
        .delete_topic(user.id, user.is_staff, id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn posts(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TopicId>,
    Query(pagination): Query<Pagination>,
) -> JsonResult<PaginatedResponse<Post>> {
    let rows = ForumRepository::new(state.db_pool)
        .posts(id, &pagination)
        .await?;

    Ok(Json(page(rows, &pagination)))
}

#[instrument(skip(state, req))]
pub async fn create_post(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<TopicId>,
    Json(req): Json<CreatePost>,
) -> CreatedResult<Post> {
    let post = ForumRepository::new(state.db_pool)
        .create_post(user.id, id, &req)
        .await?;

    Ok((StatusCode::CREATED, Json(post)))
}

#[instrument(skip(state))]
pub async fn like(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((topic, post)): Path<(TopicId, PostId)>,
) -> JsonResult<Post> {
    Ok(Json(
        ForumRepository::new(state.db_pool)
            .like(user.id, topic, post)
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn unlike(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((topic, post)): Path<(TopicId, PostId)>,
) -> JsonResult<Post> {
    Ok(Json(
        ForumRepository::new(state.db_pool)
            .unlike(user.id, topic, post)
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn mark_solution(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((topic, post)): Path<(TopicId, PostId)>,
) -> JsonResult<SolutionResult> {
    Ok(Json(
        ForumRepository::new(state.db_pool)
            .mark_solution(user.id, topic, post)
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn study_groups(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(filter): Query<StudyGroupFilter>,
    Query(pagination): Query<Pagination>,
) -> JsonResult<PaginatedResponse<StudyGroup>> {
    let rows = StudyGroupRepository::new(state.db_pool)
        .list(user.id, &filter, &pagination)
        .await?;

    Ok(Json(page(rows, &pagination)))
}

#[instrument(skip(state, req))]
pub async fn create_study_group(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateStudyGroup>,
) -> CreatedResult<StudyGroup> {
    let group = StudyGroupRepository::new(state.db_pool)
        .create(user.id, &req)
        .await?;

    Ok((StatusCode::CREATED, Json(group)))
}

#[instrument(skip(state))]
pub async fn study_group(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<StudyGroupId>,
) -> JsonResult<StudyGroup> {
    Ok(Json(
        StudyGroupRepository::new(state.db_pool)
            .get_visible(user.id, id)
            .await?,
    ))
}

#[instrument(skip(state, req))]
pub async fn update_study_group(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<StudyGroupId>,
    Json(req): Json<UpdateStudyGroup>,
) -> JsonResult<StudyGroup> {
    Ok(Json(
        StudyGroupRepository::new(state.db_pool)
            .update(user.id, id, &req)
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn delete_study_group(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<StudyGroupId>,
) -> Result<StatusCode, RouteError> {
    StudyGroupRepository::new(state.db_pool)
        .delete(user.id, id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn join(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<StudyGroupId>,
) -> CreatedResult<GroupMember> {
    let member = StudyGroupRepository::new(state.db_pool)
        .join(user.id, id)
        .await?;

    Ok((StatusCode::CREATED, Json(member)))
}

#[instrument(skip(state))]
pub async fn leave(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<StudyGroupId>,
) -> JsonResult<Detail> {
    StudyGroupRepository::new(state.db_pool)
        .leave(user.id, id)
        .await?;

    Ok(Json(Detail::new("Successfully left the group.")))
}

#[instrument(skip(state))]
pub async fn members(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<StudyGroupId>,
) -> JsonResult<Vec<GroupMember>> {
    Ok(Json(
        StudyGroupRepository::new(state.db_pool)
            .members(user.id, id)
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn change_role(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((id, member)): Path<(StudyGroupId, GroupMemberId)>,
    Json(change): Json<RoleChange>,
) -> JsonResult<GroupMember> {
    Ok(Json(
        StudyGroupRepository::new(state.db_pool)
            .change_role(user.id, id, member, &change)
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn group_messages(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<StudyGroupId>,
) -> JsonResult<Vec<GroupMessage>> {
    Ok(Json(
        StudyGroupRepository::new(state.db_pool)
            .messages(user.id, id)
            .await?,
    ))
}

#[instrument(skip(state, req))]
pub async fn send_group_message(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<StudyGroupId>,
    Json(req): Json<CreateMessage>,
) -> CreatedResult<GroupMessage> {
    let message = StudyGroupRepository::new(state.db_pool)
        .send_message(user.id, id, &req)
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

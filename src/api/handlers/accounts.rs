use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{Detail, page};
use crate::api::server::{AppState, JsonResult, RouteError};
use crate::auth::AuthUser;
use crate::auth::password::{check_new_password, hash_password, verify_password};
use crate::db::models::account::{
    AccountDetail, AccountProfile, Badge, ChangePassword, EarnedBadge, LeaderboardEntry,
    UpdateAccount,
};
use crate::db::models::{AccountId, BadgeId};
use crate::db::prelude::*;
use crate::domain::DomainError;
use crate::domain::gamification::{Progression, XpAward, XpDelta, XpSource};

fn require_staff(user: &AuthUser) -> Result<(), RouteError> {
    if !user.is_staff {
        return Err(DomainError::forbidden("You do not have permission to perform this action.").into());
    }

    Ok(())
}

#[instrument(skip(state))]
pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> JsonResult<AccountDetail> {
    let account = AccountRepository::new(state.db_pool).require(user.id).await?;
    Ok(Json(account.into_detail()))
}

#[instrument(skip(state, req))]
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<UpdateAccount>,
) -> JsonResult<AccountDetail> {
    let account = AccountRepository::new(state.db_pool)
        .update(user.id, &req)
        .await?;

    Ok(Json(account.into_detail()))
}

#[instrument(skip(state))]
pub async fn delete_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<StatusCode, RouteError> {
    if !AccountRepository::new(state.db_pool)
        .delete_by_id(user.id)
        .await?
    {
        return Err(DomainError::not_found(format!("Account {} not found.", user.id)).into());
    }

    tracing::info!(account = %user.id, "account deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, req))]
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<ChangePassword>,
) -> JsonResult<Detail> {
    let repo = AccountRepository::new(state.db_pool);
    let account = repo.require(user.id).await?;

    if !verify_password(&req.old_password, &account.password_hash)? {
        return Err(DomainError::validation("Old password is not correct.").into());
    }

    check_new_password(&req.new_password, &req.new_password2)?;
    repo.set_password(user.id, &hash_password(&req.new_password)?)
        .await?;

    Ok(Json(Detail::new("Password updated successfully.")))
}

#[instrument(skip(state))]
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(pagination): Query<Pagination>,
) -> JsonResult<PaginatedResponse<AccountDetail>> {
    require_staff(&user)?;

    let rows = AccountRepository::new(state.db_pool)
        .list(&pagination)
        .await?;

    Ok(Json(page(rows, &pagination).map(|row| row.into_detail())))
}

/// Public profile of any account. Private profiles are only shown to their owner and staff.
#[instrument(skip(state))]
pub async fn account(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<AccountId>,
) -> JsonResult<AccountProfile> {
    let account = AccountRepository::new(state.db_pool).require(id).await?;

    if !account.public_profile && account.id != user.id && !user.is_staff {
        return Err(DomainError::not_found(format!("Account {id} not found.")).into());
    }

    Ok(Json(account.into_profile()))
}

#[derive(Debug, Deserialize)]
pub struct GrantXp {
    pub points: i64,
}

#[derive(Debug, Serialize)]
pub struct GrantResult {
    pub award: XpAward,
    pub progression: Progression,
    pub unlocked: usize,
}

/// Staff-only manual XP grant; goes through the same award and unlock path as earned XP.
#[instrument(skip(state))]
pub async fn grant_xp(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<AccountId>,
    Json(req): Json<GrantXp>,
) -> JsonResult<GrantResult> {
    require_staff(&user)?;

    let delta = XpDelta::new(req.points)?;
    if !AccountRepository::new(state.db_pool).exists(id).await? {
        return Err(DomainError::not_found(format!("Account {id} not found.")).into());
    }

    let reward = GamificationRepository::new(state.db_pool)
        .award_xp(id, delta, XpSource::StaffGrant)
        .await?;

    Ok(Json(GrantResult {
        award: reward.award,
        progression: reward.progression,
        unlocked: reward.unlocks.len(),
    }))
}

#[instrument(skip(state))]
pub async fn leaderboard(
    State(state): State<Arc<AppState>>,
    Query(pagination): Query<Pagination>,
) -> JsonResult<PaginatedResponse<LeaderboardEntry>> {
    let rows = GamificationRepository::new(state.db_pool)
        .leaderboard(&pagination)
        .await?;

    Ok(Json(page(rows, &pagination)))
}

#[instrument(skip(state))]
pub async fn badges(State(state): State<Arc<AppState>>) -> JsonResult<Vec<Badge>> {
    Ok(Json(GamificationRepository::new(state.db_pool).badges().await?))
}

#[instrument(skip(state))]
pub async fn badge(
    State(state): State<Arc<AppState>>,
    Path(id): Path<BadgeId>,
) -> JsonResult<Badge> {
    GamificationRepository::new(state.db_pool)
        .badge(id)
        .await?
        .map(Json)
        .ok_or_else(|| DomainError::not_found(format!("Badge {id} not found.")).into())
}

#[instrument(skip(state))]
pub async fn my_badges(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> JsonResult<Vec<EarnedBadge>> {
    Ok(Json(
        GamificationRepository::new(state.db_pool)
            .earned_badges(user.id)
            .await?,
    ))
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::{
    AccountId, LearningPathId, RecommendationId, ResourceId, ResourceProviderId, ResourceTypeId,
    StepId,
};
use crate::domain::progress::Difficulty;
use crate::domain::rating::RatingAverage;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ResourceType {
    pub id: ResourceTypeId,
    pub name: String,
    pub description: String,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ResourceProvider {
    pub id: ResourceProviderId,
    pub name: String,
    pub website: String,
    pub logo: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Resource {
    pub id: ResourceId,
    pub title: String,
    pub description: String,
    pub url: String,
    pub thumbnail: Option<String>,
    pub resource_type_id: ResourceTypeId,
    pub provider_id: ResourceProviderId,
    pub duration_minutes: i64,
    #[sqlx(try_from = "String")]
    pub difficulty: Difficulty,
    pub is_free: bool,
    pub added_by: Option<AccountId>,
    pub skill_ids: Vec<i64>,
    pub view_count: i64,
    pub bookmark_count: i64,
    #[sqlx(try_from = "i64")]
    pub average_rating: RatingAverage,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One account's interaction with one resource.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserResource {
    pub id: i64,
    pub account_id: AccountId,
    pub resource_id: ResourceId,
    pub resource_title: String,
    pub is_bookmarked: bool,
    pub is_completed: bool,
    #[serde(skip)]
    pub completion_rewarded: bool,
    pub rating: Option<i16>,
    pub notes: String,
    pub viewed_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Recommendation {
    pub id: RecommendationId,
    pub resource_id: ResourceId,
    pub resource_title: String,
    pub learning_path_id: Option<LearningPathId>,
    pub step_id: Option<StepId>,
    pub is_required: bool,
    pub position: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceFilter {
    pub resource_type: Option<i64>,
    pub provider: Option<i64>,
    pub difficulty: Option<Difficulty>,
    pub skill: Option<i64>,
    pub is_free: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateResource {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
    pub thumbnail: Option<String>,
    pub resource_type_id: ResourceTypeId,
    pub provider_id: ResourceProviderId,
    #[serde(default)]
    pub duration_minutes: i64,
    #[serde(default = "default_difficulty")]
    pub difficulty: Difficulty,
    #[serde(default = "default_true")]
    pub is_free: bool,
    #[serde(default)]
    pub skill_ids: Vec<i64>,
}

fn default_difficulty() -> Difficulty {
    Difficulty::Beginner
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateResource {
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub thumbnail: Option<String>,
    pub duration_minutes: Option<i64>,
    pub difficulty: Option<Difficulty>,
    pub is_free: Option<bool>,
    pub skill_ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlagRequest {
    #[serde(default = "default_true", alias = "bookmark", alias = "completed")]
    pub value: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecommendationFilter {
    pub learning_path: Option<i64>,
    #[serde(alias = "path_step")]
    pub step: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRecommendation {
    pub resource_id: ResourceId,
    pub learning_path_id: Option<LearningPathId>,
    pub step_id: Option<StepId>,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub position: i64,
}

/// `POST /resources/{id}/complete` result.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionResult {
    pub interaction: UserResource,
    pub xp_awarded: i64,
}

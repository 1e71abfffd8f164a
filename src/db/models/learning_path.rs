use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::{
    AccountId, CategoryId, EnrollmentId, LearningPathId, SkillId, StepId,
};
use crate::domain::progress::{Difficulty, EnrollmentStatus, StepKind};
use crate::domain::rating::RatingAverage;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Skill {
    pub id: SkillId,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LearningPath {
    pub id: LearningPathId,
    pub title: String,
    pub slug: String,
    pub description: String,
    #[sqlx(try_from = "String")]
    pub difficulty: Difficulty,
    /// Hours
    pub estimated_duration: i64,
    pub xp_reward: i64,
    pub image: Option<String>,
    pub creator_id: AccountId,
    pub category_id: CategoryId,
    pub skill_ids: Vec<i64>,
    pub is_published: bool,
    pub is_featured: bool,
    #[sqlx(try_from = "i64")]
    pub average_rating: RatingAverage,
    pub enrolled_count: i64,
    pub completion_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Step {
    pub id: StepId,
    pub learning_path_id: LearningPathId,
    pub title: String,
    pub description: String,
    pub position: i64,
    #[sqlx(try_from = "String")]
    pub kind: StepKind,
    pub content: String,
    /// Minutes
    pub estimated_duration: i64,
    pub xp_reward: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub account_id: AccountId,
    pub learning_path_id: LearningPathId,
    pub current_step_id: Option<StepId>,
    pub progress_percentage: i64,
    #[sqlx(try_from = "String")]
    pub status: EnrollmentStatus,
    pub rating: Option<i16>,
    pub review: String,
    pub enrolled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_activity: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LearningPathFilter {
    pub category: Option<i64>,
    pub difficulty: Option<Difficulty>,
    pub skill: Option<i64>,
    pub featured: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLearningPath {
    pub title: String,
    pub description: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: Difficulty,
    pub estimated_duration: i64,
    pub xp_reward: Option<i64>,
    pub image: Option<String>,
    pub category_id: CategoryId,
    #[serde(default)]
    pub skill_ids: Vec<i64>,
    #[serde(default)]
    pub is_published: bool,
}

fn default_difficulty() -> Difficulty {
    Difficulty::Beginner
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateLearningPath {
    pub title: Option<String>,
    pub description: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub estimated_duration: Option<i64>,
    pub xp_reward: Option<i64>,
    pub image: Option<String>,
    pub category_id: Option<CategoryId>,
    pub skill_ids: Option<Vec<i64>>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateStep {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub position: i64,
    #[serde(default = "default_step_kind")]
    pub kind: StepKind,
    #[serde(default)]
    pub content: String,
    pub estimated_duration: i64,
    pub xp_reward: Option<i64>,
}

fn default_step_kind() -> StepKind {
    StepKind::Lesson
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateRequest {
    pub rating: i64,
    #[serde(default)]
    pub review: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnrollmentProgress {
    pub step_id: StepId,
    #[serde(default)]
    pub completed: bool,
}

/// `POST /enrollments/{id}/progress` result: the enrollment plus whatever XP the update paid.
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentProgressResult {
    pub enrollment: Enrollment,
    pub xp_awarded: i64,
    pub level: i64,
}

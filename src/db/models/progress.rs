use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::{AccountId, AchievementId, SkillId, StepId, StepProgressId, UserSkillId};
use crate::domain::progress::{AchievementDifficulty, Proficiency, StepState, StepStatus};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserSkill {
    pub id: UserSkillId,
    pub account_id: AccountId,
    pub skill_id: SkillId,
    pub skill_name: String,
    #[sqlx(try_from = "String")]
    pub proficiency: Proficiency,
    pub is_verified: bool,
    pub verification_method: String,
    pub acquired_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StepProgress {
    pub id: StepProgressId,
    pub account_id: AccountId,
    pub step_id: StepId,
    #[sqlx(try_from = "String")]
    pub status: StepStatus,
    pub progress_percentage: i64,
    pub time_spent_minutes: i64,
    pub difficulty_rating: Option<i16>,
    pub notes: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl StepProgress {
    pub fn state(&self) -> StepState {
        StepState {
            status: self.status,
            progress_percentage: self.progress_percentage,
            time_spent_minutes: self.time_spent_minutes,
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Achievement {
    pub id: AchievementId,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub category: String,
    #[sqlx(try_from = "String")]
    pub difficulty: AchievementDifficulty,
    pub xp_reward: i64,
    pub required_paths_completed: i64,
    pub required_skill_ids: Vec<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EarnedAchievement {
    pub achievement_id: AchievementId,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub xp_reward: i64,
    pub earned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserSkill {
    pub skill_id: SkillId,
    pub proficiency: Proficiency,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateUserSkill {
    pub proficiency: Proficiency,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateStepProgress {
    pub step_id: StepId,
    #[serde(default)]
    pub notes: String,
    pub difficulty_rating: Option<i16>,
}

/// `PATCH /step-progress/{id}` result.
#[derive(Debug, Clone, Serialize)]
pub struct StepProgressResult {
    pub progress: StepProgress,
    pub xp_awarded: i64,
    pub level: i64,
}

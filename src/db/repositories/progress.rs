use chrono::Utc;
use sqlx::{Pool, Postgres, Result as SqlxResult};
use tracing::instrument;

use super::sql_fragment;
use crate::db::models::progress::{
    Achievement, CreateStepProgress, CreateUserSkill, EarnedAchievement, StepProgress,
    StepProgressResult, UpdateUserSkill, UserSkill,
};
use crate::db::models::{AccountId, AchievementId, StepProgressId, UserSkillId};
use crate::db::repositories::Tx;
use crate::db::{PgError, PgResult};
use crate::domain::DomainError;
use crate::domain::gamification::{XpDelta, XpSource};
use crate::domain::progress::{StepStatus, StepUpdate};

/// Skills, step progress and achievements of the calling account.
#[derive(Debug)]
pub struct ProgressRepository {
    pool: &'static Pool<Postgres>,
}

impl ProgressRepository {
    pub fn new(pool: &'static Pool<Postgres>) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn user_skills(&self, caller: AccountId) -> SqlxResult<Vec<UserSkill>> {
        sqlx::query_as::<_, UserSkill>(&format!(
            "SELECT {} FROM user_skill WHERE account_id = $1 ORDER BY acquired_at",
            sql_fragment::USER_SKILL_FIELDS
        ))
        .bind(caller)
        .fetch_all(self.pool)
        .await
    }

    #[instrument(skip(self))]
    pub async fn user_skill(&self, caller: AccountId, id: UserSkillId) -> PgResult<UserSkill> {
        sqlx::query_as::<_, UserSkill>(&format!(
            "SELECT {} FROM user_skill WHERE id = $1 AND account_id = $2",
            sql_fragment::USER_SKILL_FIELDS
        ))
        .bind(id)
        .bind(caller)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("User skill {id} not found.")).into())
    }

    /// Records a skill and evaluates unlocks, since achievements can require skills.
    #[instrument(skip(self))]
    pub async fn create_user_skill(
        &self,
        caller: AccountId,
        req: &CreateUserSkill,
    ) -> PgResult<UserSkill> {
        let mut tx = Tx::begin(self.pool).await?;

        let result = sqlx::query_as::<_, UserSkill>(&format!(
            r#"
            INSERT INTO user_skill (account_id, skill_id, proficiency)
            VALUES ($1, $2, $3)
            RETURNING {}
            "#,
            sql_fragment::USER_SKILL_FIELDS
        ))
        .bind(caller)
        .bind(req.skill_id)
        .bind(req.proficiency.as_str())
        .fetch_one(tx.conn()?)
        .await
        .map_err(PgError::from);

        let skill = match result {
            Ok(skill) => skill,
            Err(e) if e.is_unique_violation() => {
                return Err(DomainError::conflict("You already have this skill.").into());
            }
            Err(e) if e.is_foreign_key_violation() => {
                return Err(DomainError::not_found(format!("Skill {} not found.", req.skill_id)).into());
            }
            Err(e) => return Err(e),
        };

        let unlocks = tx.evaluate_unlocks(caller).await?;
        tx.commit().await?;

        if !unlocks.is_empty() {
            tracing::debug!(account = %caller, count = unlocks.len(), "skill unlocked rewards");
        }

        Ok(skill)
    }

    #[instrument(skip(self))]
    pub async fn update_user_skill(
        &self,
        caller: AccountId,
        id: UserSkillId,
        req: &UpdateUserSkill,
    ) -> PgResult<UserSkill> {
        sqlx::query_as::<_, UserSkill>(&format!(
            r#"
            UPDATE user_skill SET proficiency = $3, updated_at = NOW()
            WHERE id = $1 AND account_id = $2
            RETURNING {}
            "#,
            sql_fragment::USER_SKILL_FIELDS
        ))
        .bind(id)
        .bind(caller)
        .bind(req.proficiency.as_str())
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("User skill {id} not found.")).into())
    }

    #[instrument(skip(self))]
    pub async fn delete_user_skill(&self, caller: AccountId, id: UserSkillId) -> PgResult<()> {
        let deleted = sqlx::query("DELETE FROM user_skill WHERE id = $1 AND account_id = $2")
            .bind(id)
            .bind(caller)
            .execute(self.pool)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(DomainError::not_found(format!("User skill {id} not found.")).into());
        }

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn step_progress_list(&self, caller: AccountId) -> SqlxResult<Vec<StepProgress>> {
        sqlx::query_as::<_, StepProgress>(&format!(
            "SELECT {} FROM step_progress WHERE account_id = $1 ORDER BY updated_at DESC",
            sql_fragment::STEP_PROGRESS_FIELDS
        ))
        .bind(caller)
        .fetch_all(self.pool)
        .await
    }

    #[instrument(skip(self))]
    pub async fn step_progress(
        &self,
        caller: AccountId,
        id: StepProgressId,
    ) -> PgResult<StepProgress> {
        sqlx::query_as::<_, StepProgress>(&format!(
            "SELECT {} FROM step_progress WHERE id = $1 AND account_id = $2",
            sql_fragment::STEP_PROGRESS_FIELDS
        ))
        .bind(id)
        .bind(caller)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("Step progress {id} not found.")).into())
    }

    #[instrument(skip(self, req))]
    pub async fn create_step_progress(
        &self,
        caller: AccountId,
        req: &CreateStepProgress,
    ) -> PgResult<StepProgress> {
        if req.difficulty_rating.is_some_and(|r| !(1..=5).contains(&r)) {
            return Err(DomainError::validation(
                "Difficulty rating must be an integer between 1 and 5.",
            )
            .into());
        }

        let result = sqlx::query_as::<_, StepProgress>(&format!(
            r#"
            INSERT INTO step_progress (account_id, step_id, status, notes, difficulty_rating)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            sql_fragment::STEP_PROGRESS_FIELDS
        ))
        .bind(caller)
        .bind(req.step_id)
        .bind(StepStatus::NotStarted.as_str())
        .bind(&req.notes)
        .bind(req.difficulty_rating)
        .fetch_one(self.pool)
        .await
        .map_err(PgError::from);

        match result {
            Ok(progress) => Ok(progress),
            Err(e) if e.is_unique_violation() => Err(DomainError::conflict(
                "Progress for this step already exists.",
            )
            .into()),
            Err(e) if e.is_foreign_key_violation() => {
                Err(DomainError::not_found(format!("Step {} not found.", req.step_id)).into())
            }
            Err(e) => Err(e),
        }
    }

    /// Applies a status/percentage/time update under a row lock, paying the step's XP on its
    /// first completion.
    #[instrument(skip(self, update))]
    pub async fn update_step_progress(
        &self,
        caller: AccountId,
        id: StepProgressId,
        update: &StepUpdate,
    ) -> PgResult<StepProgressResult> {
        let mut tx = Tx::begin(self.pool).await?;

        let current = sqlx::query_as::<_, StepProgress>(&format!(
            "SELECT {} FROM step_progress WHERE id = $1 AND account_id = $2 FOR UPDATE",
            sql_fragment::STEP_PROGRESS_FIELDS
        ))
        .bind(id)
        .bind(caller)
        .fetch_optional(tx.conn()?)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("Step progress {id} not found.")))?;

        let outcome = current.state().apply(update, Utc::now())?;

        let progress = sqlx::query_as::<_, StepProgress>(&format!(
            r#"
            UPDATE step_progress SET
                status = $2,
                progress_percentage = $3,
                time_spent_minutes = $4,
                started_at = $5,
                completed_at = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            sql_fragment::STEP_PROGRESS_FIELDS
        ))
        .bind(id)
        .bind(outcome.state.status.as_str())
        .bind(outcome.state.progress_percentage)
        .bind(outcome.state.time_spent_minutes)
        .bind(outcome.state.started_at)
        .bind(outcome.state.completed_at)
        .fetch_one(tx.conn()?)
        .await?;

        let (xp_awarded, level) = if outcome.first_completion {
            let step_xp = sqlx::query_scalar::<_, i64>("SELECT xp_reward FROM step WHERE id = $1")
                .bind(progress.step_id)
                .fetch_one(tx.conn()?)
                .await?;

            let reward = tx
                .reward(caller, XpDelta::new(step_xp)?, XpSource::StepCompleted)
                .await?;
            (reward.award.delta, reward.progression.level)
        } else {
            let level = sqlx::query_scalar::<_, i64>("SELECT level FROM account WHERE id = $1")
                .bind(caller)
                .fetch_one(tx.conn()?)
                .await?;
            (0, level)
        };

        tx.commit().await?;

        Ok(StepProgressResult {
            progress,
            xp_awarded,
            level,
        })
    }

    #[instrument(skip(self))]
    pub async fn achievements(&self) -> SqlxResult<Vec<Achievement>> {
        sqlx::query_as::<_, Achievement>(&format!(
            "SELECT {} FROM achievement ORDER BY id",
            sql_fragment::ACHIEVEMENT_FIELDS
        ))
        .fetch_all(self.pool)
        .await
    }

    #[instrument(skip(self))]
    pub async fn achievement(&self, id: AchievementId) -> PgResult<Achievement> {
        sqlx::query_as::<_, Achievement>(&format!(
            "SELECT {} FROM achievement WHERE id = $1",
            sql_fragment::ACHIEVEMENT_FIELDS
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("Achievement {id} not found.")).into())
    }

    #[instrument(skip(self))]
    pub async fn earned_achievements(
        &self,
        caller: AccountId,
    ) -> SqlxResult<Vec<EarnedAchievement>> {
        sqlx::query_as::<_, EarnedAchievement>(
            r#"
            SELECT
                a.id AS achievement_id,
                a.title,
                a.description,
                a.icon,
                a.xp_reward,
                ua.earned_at
            FROM user_achievement ua
            JOIN achievement a ON a.id = ua.achievement_id
            WHERE ua.account_id = $1
            ORDER BY ua.earned_at DESC
            "#,
        )
        .bind(caller)
        .fetch_all(self.pool)
        .await
    }
}

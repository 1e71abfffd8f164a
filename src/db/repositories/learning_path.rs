use sqlx::{Pool, Postgres, Result as SqlxResult};
use tracing::instrument;

use super::{replace_skills, sql_fragment};
use crate::db::models::learning_path::{
    Category, CreateLearningPath, CreateStep, Enrollment, EnrollmentProgress,
    EnrollmentProgressResult, LearningPath, LearningPathFilter, RateRequest, Skill, Step,
    UpdateLearningPath,
};
use crate::db::models::{AccountId, EnrollmentId, LearningPathId, Pagination, StepId};
use crate::db::repositories::{Repository, Tx};
use crate::db::{PgError, PgResult};
use crate::domain::DomainError;
use crate::domain::gamification::{XpDelta, XpSource};
use crate::domain::progress::{EnrollmentStatus, StepStatus, advance_enrollment, path_percentage};
use crate::domain::rating::{Rating, recompute_average};
use crate::util::{slugify, unique_slug};

#[derive(Debug)]
pub struct LearningPathRepository {
    pool: &'static Pool<Postgres>,
}

/// Paths the caller may see: every published path plus their own drafts.
const VISIBLE_FILTER: &str = r#"
    (is_published OR creator_id = $1)
    AND ($2::BIGINT IS NULL OR category_id = $2)
    AND ($3::TEXT IS NULL OR difficulty = $3)
    AND ($4::BIGINT IS NULL OR EXISTS (
        SELECT 1 FROM learning_path_skill lps
        WHERE lps.learning_path_id = learning_path.id AND lps.skill_id = $4
    ))
    AND ($5::BOOLEAN IS NULL OR is_featured = $5)
"#;

#[async_trait::async_trait]
impl Repository for LearningPathRepository {
    type Ident = LearningPathId;
    type Output = LearningPath;

    const BASE_FIELDS: &'static str = sql_fragment::LEARNING_PATH_FIELDS;
    const TABLE_NAME: &'static str = "learning_path";
    const ENTITY: &'static str = "Learning path";

    #[instrument(skip(pool))]
    fn new(pool: &'static Pool<Postgres>) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    fn pool(&self) -> &'static Pool<Postgres> {
        self.pool
    }
}

impl LearningPathRepository {
    #[instrument(skip(self))]
    pub async fn skills(&self) -> SqlxResult<Vec<Skill>> {
        sqlx::query_as::<_, Skill>("SELECT id, name, description FROM skill ORDER BY name")
            .fetch_all(self.pool)
            .await
    }

    #[instrument(skip(self))]
    pub async fn categories(&self) -> SqlxResult<Vec<Category>> {
        sqlx::query_as::<_, Category>(
            "SELECT id, name, description, slug FROM category ORDER BY name",
        )
        .fetch_all(self.pool)
        .await
    }

    #[instrument(skip(self))]
    pub async fn list_visible(
        &self,
        caller: AccountId,
        filter: &LearningPathFilter,
        pagination: &Pagination,
    ) -> SqlxResult<(Vec<LearningPath>, i64)> {
        let paths = sqlx::query_as::<_, LearningPath>(&format!(
            r#"
            SELECT {}
            FROM learning_path
            WHERE {VISIBLE_FILTER}
            ORDER BY created_at DESC, id DESC
            LIMIT $6 OFFSET $7
            "#,
            Self::BASE_FIELDS
        ))
        .bind(caller)
        .bind(filter.category)
        .bind(filter.difficulty.map(|d| d.as_str()))
        .bind(filter.skill)
        .bind(filter.featured)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM learning_path WHERE {VISIBLE_FILTER}"
        ))
        .bind(caller)
        .bind(filter.category)
        .bind(filter.difficulty.map(|d| d.as_str()))
        .bind(filter.skill)
        .bind(filter.featured)
        .fetch_one(self.pool)
        .await?;

        Ok((paths, total))
    }

    /// Drafts of other accounts read as missing.
    #[instrument(skip(self))]
    pub async fn get_visible(&self, caller: AccountId, id: LearningPathId) -> PgResult<LearningPath> {
        let path = self.require(id).await?;
        if !path.is_published && path.creator_id != caller {
            return Err(DomainError::not_found(format!("Learning path {id} not found.")).into());
        }

        Ok(path)
    }

    #[instrument(skip(self, req), fields(title = %req.title))]
    pub async fn create(&self, caller: AccountId, req: &CreateLearningPath) -> PgResult<LearningPath> {
        if req.title.trim().is_empty() {
            return Err(DomainError::validation("Title is required.").into());
        }
        if req.estimated_duration < 0 || req.xp_reward.is_some_and(|xp| xp < 0) {
            return Err(DomainError::validation(
                "Duration and XP reward cannot be negative.",
            )
            .into());
        }

        let mut tx = Tx::begin(self.pool).await?;

        let base = slugify(&req.title);
        let taken = sqlx::query_scalar::<_, String>(
            "SELECT slug FROM learning_path WHERE slug = $1 OR slug LIKE $1 || '-%'",
        )
        .bind(&base)
        .fetch_all(tx.conn()?)
        .await?;
        let slug = unique_slug(&base, &taken);

        let id = sqlx::query_scalar::<_, LearningPathId>(
            r#"
            INSERT INTO learning_path (
                title,
                slug,
                description,
                difficulty,
                estimated_duration,
                xp_reward,
                image,
                creator_id,
                category_id,
                is_published
            )
            VALUES ($1, $2, $3, $4, $5, COALESCE($6, 100), $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(req.title.trim())
        .bind(&slug)
        .bind(&req.description)
        .bind(req.difficulty.as_str())
        .bind(req.estimated_duration)
        .bind(req.xp_reward)
        .bind(&req.image)
        .bind(caller)
        .bind(req.category_id)
        .bind(req.is_published)
        .fetch_one(tx.conn()?)
        .await?;

        replace_skills(tx.conn()?, "learning_path_skill", "learning_path_id", id.0, &req.skill_ids)
            .await?;

        let path = sqlx::query_as::<_, LearningPath>(&format!(
            "SELECT {} FROM learning_path WHERE id = $1",
            Self::BASE_FIELDS
        ))
        .bind(id)
        .fetch_one(tx.conn()?)
        .await?;

        tx.commit().await?;
        tracing::info!(path = %path.id, slug = %path.slug, "learning path created");

        Ok(path)
    }

    /// Locks the path and checks the caller created it.
    async fn lock_owned(tx: &mut Tx, caller: AccountId, id: LearningPathId) -> PgResult<()> {
        let creator = sqlx::query_scalar::<_, AccountId>(
            "SELECT creator_id FROM learning_path WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(tx.conn()?)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("Learning path {id} not found.")))?;

        if creator != caller {
            return Err(DomainError::forbidden(
                "You do not have permission to modify this learning path.",
            )
            .into());
        }

        Ok(())
    }

    #[instrument(skip(self, req))]
    pub async fn update(
        &self,
        caller: AccountId,
        id: LearningPathId,
        req: &UpdateLearningPath,
    ) -> PgResult<LearningPath> {
        let mut tx = Tx::begin(self.pool).await?;
        Self::lock_owned(&mut tx, caller, id).await?;

        let path = sqlx::query_as::<_, LearningPath>(&format!(
            r#"
            UPDATE learning_path SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                difficulty = COALESCE($4, difficulty),
                estimated_duration = COALESCE($5, estimated_duration),
                xp_reward = COALESCE($6, xp_reward),
                image = COALESCE($7, image),
                category_id = COALESCE($8, category_id),
                is_published = COALESCE($9, is_published),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            Self::BASE_FIELDS
        ))
        .bind(id)
        .bind(&req.title)
        .bind(&req.description)
        .bind(req.difficulty.map(|d| d.as_str()))
        .bind(req.estimated_duration)
        .bind(req.xp_reward.map(|xp| xp.max(0)))
        .bind(&req.image)
        .bind(req.category_id)
        .bind(req.is_published)
        .fetch_one(tx.conn()?)
        .await?;

        let path = match &req.skill_ids {
            Some(skill_ids) => {
                replace_skills(tx.conn()?, "learning_path_skill", "learning_path_id", id.0, skill_ids)
                    .await?;
                sqlx::query_as::<_, LearningPath>(&format!(
                    "SELECT {} FROM learning_path WHERE id = $1",
                    Self::BASE_FIELDS
                ))
                .bind(id)
                .fetch_one(tx.conn()?)
                .await?
            }
            None => path,
        };

        tx.commit().await?;
        Ok(path)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, caller: AccountId, id: LearningPathId) -> PgResult<()> {
        let mut tx = Tx::begin(self.pool).await?;
        Self::lock_owned(&mut tx, caller, id).await?;

        sqlx::query("DELETE FROM learning_path WHERE id = $1")
            .bind(id)
            .execute(tx.conn()?)
            .await?;

        tx.commit().await?;
        tracing::info!(path = %id, "learning path deleted");

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn enroll(&self, caller: AccountId, id: LearningPathId) -> PgResult<Enrollment> {
        self.get_visible(caller, id).await?;

        let result = sqlx::query_as::<_, Enrollment>(&format!(
            r#"
            INSERT INTO enrollment (account_id, learning_path_id, status)
            VALUES ($1, $2, $3)
            RETURNING {}
            "#,
            sql_fragment::ENROLLMENT_FIELDS
        ))
        .bind(caller)
        .bind(id)
        .bind(EnrollmentStatus::Enrolled.as_str())
        .fetch_one(self.pool)
        .await
        .map_err(PgError::from);

        match result {
            Ok(enrollment) => {
                tracing::info!(account = %caller, path = %id, "enrolled");
                Ok(enrollment)
            }
            Err(e) if e.is_unique_violation() => Err(DomainError::conflict(
                "Already enrolled in this learning path.",
            )
            .into()),
            Err(e) => Err(e),
        }
    }

    /// Stores the caller's rating on their enrollment and recomputes the path average under a
    /// lock on the path row.
    #[instrument(skip(self, req))]
    pub async fn rate(
        &self,
        caller: AccountId,
        id: LearningPathId,
        req: &RateRequest,
    ) -> PgResult<LearningPath> {
        let rating = Rating::new(req.rating)?;
        let mut tx = Tx::begin(self.pool).await?;

        sqlx::query_scalar::<_, LearningPathId>(
            "SELECT id FROM learning_path WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(tx.conn()?)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("Learning path {id} not found.")))?;

        let updated = sqlx::query(
            r#"
            UPDATE enrollment
            SET rating = $3, review = COALESCE($4, review), last_activity = NOW()
            WHERE account_id = $1 AND learning_path_id = $2
            "#,
        )
        .bind(caller)
        .bind(id)
        .bind(rating.get())
        .bind(&req.review)
        .execute(tx.conn()?)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(DomainError::validation(
                "You must be enrolled to rate this learning path.",
            )
            .into());
        }

        let ratings = sqlx::query_scalar::<_, i16>(
            "SELECT rating FROM enrollment WHERE learning_path_id = $1 AND rating IS NOT NULL",
        )
        .bind(id)
        .fetch_all(tx.conn()?)
        .await?
        .into_iter()
        .filter_map(|r| Rating::new(i64::from(r)).ok())
        .collect::<Vec<_>>();
        let average = recompute_average(&ratings);

        let path = sqlx::query_as::<_, LearningPath>(&format!(
            r#"
            UPDATE learning_path
            SET average_rating = $2::NUMERIC / 100, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            Self::BASE_FIELDS
        ))
        .bind(id)
        .bind(average.hundredths())
        .fetch_one(tx.conn()?)
        .await?;

        tx.commit().await?;
        tracing::debug!(path = %id, %average, "learning path rated");

        Ok(path)
    }

    #[instrument(skip(self))]
    pub async fn steps(&self, caller: AccountId, id: LearningPathId) -> PgResult<Vec<Step>> {
        self.get_visible(caller, id).await?;

        Ok(sqlx::query_as::<_, Step>(&format!(
            "SELECT {} FROM step WHERE learning_path_id = $1 ORDER BY position",
            sql_fragment::STEP_FIELDS
        ))
        .bind(id)
        .fetch_all(self.pool)
        .await?)
    }

    #[instrument(skip(self, req))]
    pub async fn create_step(
        &self,
        caller: AccountId,
        id: LearningPathId,
        req: &CreateStep,
    ) -> PgResult<Step> {
        if req.title.trim().is_empty() {
            return Err(DomainError::validation("Title is required.").into());
        }

        let mut tx = Tx::begin(self.pool).await?;
        Self::lock_owned(&mut tx, caller, id)
            .await
            .map_err(|e| match e {
                PgError::Domain(DomainError::Forbidden(_)) => DomainError::forbidden(
                    "You do not have permission to add steps to this learning path.",
                )
                .into(),
                other => other,
            })?;

        let result = sqlx::query_as::<_, Step>(&format!(
            r#"
            INSERT INTO step (
                learning_path_id,
                title,
                description,
                position,
                kind,
                content,
                estimated_duration,
                xp_reward
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, COALESCE($8, 10))
            RETURNING {}
            "#,
            sql_fragment::STEP_FIELDS
        ))
        .bind(id)
        .bind(req.title.trim())
        .bind(&req.description)
        .bind(req.position)
        .bind(req.kind.as_str())
        .bind(&req.content)
        .bind(req.estimated_duration.max(0))
        .bind(req.xp_reward.map(|xp| xp.max(0)))
        .fetch_one(tx.conn()?)
        .await
        .map_err(PgError::from);

        let step = match result {
            Ok(step) => step,
            Err(e) if e.is_unique_violation() => {
                return Err(DomainError::conflict(format!(
                    "A step at position {} already exists in this learning path.",
                    req.position
                ))
                .into());
            }
            Err(e) => return Err(e),
        };

        tx.commit().await?;
        Ok(step)
    }

    #[instrument(skip(self))]
    pub async fn enrollments(&self, caller: AccountId) -> SqlxResult<Vec<Enrollment>> {
        sqlx::query_as::<_, Enrollment>(&format!(
            "SELECT {} FROM enrollment WHERE account_id = $1 ORDER BY last_activity DESC",
            sql_fragment::ENROLLMENT_FIELDS
        ))
        .bind(caller)
        .fetch_all(self.pool)
        .await
    }

    /// Another account's enrollment reads as missing.
    #[instrument(skip(self))]
    pub async fn enrollment(&self, caller: AccountId, id: EnrollmentId) -> PgResult<Enrollment> {
        sqlx::query_as::<_, Enrollment>(&format!(
            "SELECT {} FROM enrollment WHERE id = $1 AND account_id = $2",
            sql_fragment::ENROLLMENT_FIELDS
        ))
        .bind(id)
        .bind(caller)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("Enrollment {id} not found.")).into())
    }

    /// Moves the enrollment to `step_id` and, when the step is reported completed, records the
    /// step completion, recomputes the percentage from completed step records and pays any XP
    /// the update earned.
    #[instrument(skip(self, req))]
    pub async fn update_progress(
        &self,
        caller: AccountId,
        id: EnrollmentId,
        req: &EnrollmentProgress,
    ) -> PgResult<EnrollmentProgressResult> {
        let mut tx = Tx::begin(self.pool).await?;

        let (path_id, status) = sqlx::query_as::<_, (LearningPathId, String)>(
            "SELECT learning_path_id, status FROM enrollment WHERE id = $1 AND account_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(caller)
        .fetch_optional(tx.conn()?)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("Enrollment {id} not found.")))?;
        let status = EnrollmentStatus::try_from(status)?;

        let step_xp = sqlx::query_scalar::<_, i64>(
            "SELECT xp_reward FROM step WHERE id = $1 AND learning_path_id = $2",
        )
        .bind(req.step_id)
        .bind(path_id)
        .fetch_optional(tx.conn()?)
        .await?
        .ok_or_else(|| DomainError::not_found("Step not found in this learning path."))?;

        let mut xp_awarded = 0;
        let mut level = None;

        if req.completed {
            if Self::complete_step(&mut tx, caller, req.step_id).await? {
                let reward = tx
                    .reward(caller, XpDelta::new(step_xp)?, XpSource::StepCompleted)
                    .await?;
                xp_awarded += reward.award.delta;
                level = Some(reward.progression.level);
            }

            let (completed, total) = sqlx::query_as::<_, (i64, i64)>(
                r#"
                SELECT
                    (
                        SELECT COUNT(*) FROM step_progress sp
                        JOIN step s ON s.id = sp.step_id
                        WHERE s.learning_path_id = $1 AND sp.account_id = $2 AND sp.status = $3
                    ),
                    (SELECT COUNT(*) FROM step WHERE learning_path_id = $1)
                "#,
            )
            .bind(path_id)
            .bind(caller)
            .bind(StepStatus::Completed.as_str())
            .fetch_one(tx.conn()?)
            .await?;

            let advance = advance_enrollment(status, path_percentage(completed, total));

            sqlx::query(
                r#"
                UPDATE enrollment SET
                    current_step_id = $2,
                    progress_percentage = $3,
                    status = $4,
                    completed_at = CASE WHEN $5 THEN NOW() ELSE completed_at END,
                    last_activity = NOW()
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(req.step_id)
            .bind(advance.progress_percentage)
            .bind(advance.status.as_str())
            .bind(advance.completed_now)
            .execute(tx.conn()?)
            .await?;

            if advance.completed_now {
                let path_xp = sqlx::query_scalar::<_, i64>(
                    "SELECT xp_reward FROM learning_path WHERE id = $1",
                )
                .bind(path_id)
                .fetch_one(tx.conn()?)
                .await?;

                let reward = tx
                    .reward(caller, XpDelta::new(path_xp)?, XpSource::PathCompleted)
                    .await?;
                xp_awarded += reward.award.delta;
                level = Some(reward.progression.level);

                tracing::info!(account = %caller, path = %path_id, "learning path completed");
            }
        } else {
            sqlx::query(
                "UPDATE enrollment SET current_step_id = $2, last_activity = NOW() WHERE id = $1",
            )
            .bind(id)
            .bind(req.step_id)
            .execute(tx.conn()?)
            .await?;
        }

        let level = match level {
            Some(level) => level,
            None => {
                sqlx::query_scalar::<_, i64>("SELECT level FROM account WHERE id = $1")
                    .bind(caller)
                    .fetch_one(tx.conn()?)
                    .await?
            }
        };

        let enrollment = sqlx::query_as::<_, Enrollment>(&format!(
            "SELECT {} FROM enrollment WHERE id = $1",
            sql_fragment::ENROLLMENT_FIELDS
        ))
        .bind(id)
        .fetch_one(tx.conn()?)
        .await?;

        tx.commit().await?;

        Ok(EnrollmentProgressResult {
            enrollment,
            xp_awarded,
            level,
        })
    }

    /// Upserts the caller's step record as completed. True only for the first completion.
    async fn complete_step(tx: &mut Tx, caller: AccountId, step: StepId) -> SqlxResult<bool> {
        let previously_completed = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT completed_at IS NOT NULL FROM step_progress
            WHERE account_id = $1 AND step_id = $2
            FOR UPDATE
            "#,
        )
        .bind(caller)
        .bind(step)
        .fetch_optional(tx.conn()?)
        .await?
        .unwrap_or(false);

        sqlx::query(
            r#"
            INSERT INTO step_progress (
                account_id, step_id, status, progress_percentage, started_at, completed_at
            )
            VALUES ($1, $2, $3, 100, NOW(), NOW())
            ON CONFLICT (account_id, step_id) DO UPDATE SET
                status = EXCLUDED.status,
                progress_percentage = 100,
                started_at = COALESCE(step_progress.started_at, EXCLUDED.started_at),
                completed_at = COALESCE(step_progress.completed_at, EXCLUDED.completed_at),
                updated_at = NOW()
            "#,
        )
        .bind(caller)
        .bind(step)
        .bind(StepStatus::Completed.as_str())
        .execute(tx.conn()?)
        .await?;

        Ok(!previously_completed)
    }
}

#[cfg(test)]
mod test {
    use axum::response::IntoResponse;
    use http::StatusCode;

    use super::*;
    use crate::api::server::RouteError;
    use crate::db::models::CategoryId;
    use crate::db::repositories::account::AccountRepository;
    use crate::db::test_util::{create_account, create_category, test_pool, unique};
    use crate::domain::progress::{Difficulty, StepKind};

    fn new_path(category_id: CategoryId, xp_reward: i64) -> CreateLearningPath {
        CreateLearningPath {
            title: unique("Rust from zero"),
            description: String::from("Ownership, traits and async."),
            difficulty: Difficulty::Beginner,
            estimated_duration: 120,
            xp_reward: Some(xp_reward),
            image: None,
            category_id,
            skill_ids: Vec::new(),
            is_published: true,
        }
    }

    fn new_step(position: i64, xp_reward: i64) -> CreateStep {
        CreateStep {
            title: format!("Step {position}"),
            description: String::new(),
            position,
            kind: StepKind::Lesson,
            content: String::new(),
            estimated_duration: 15,
            xp_reward: Some(xp_reward),
        }
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn test_path_completion_pays_once() {
        let pool = test_pool().await;
        let repo = LearningPathRepository::new(pool);
        let creator = create_account(pool).await;
        let learner = create_account(pool).await;
        let category = create_category(pool).await;

        let path = repo.create(creator, &new_path(category, 200)).await.unwrap();
        let first = repo.create_step(creator, path.id, &new_step(1, 10)).await.unwrap();
        let last = repo.create_step(creator, path.id, &new_step(2, 10)).await.unwrap();
        let enrollment = repo.enroll(learner, path.id).await.unwrap();

        let progress = |step_id| EnrollmentProgress {
            step_id,
            completed: true,
        };

        let halfway = repo
            .update_progress(learner, enrollment.id, &progress(first.id))
            .await
            .unwrap();
        assert_eq!(halfway.xp_awarded, 10);
        assert_eq!(halfway.enrollment.progress_percentage, 50);
        assert_eq!(halfway.enrollment.status, EnrollmentStatus::InProgress);

        let done = repo
            .update_progress(learner, enrollment.id, &progress(last.id))
            .await
            .unwrap();
        assert_eq!(done.xp_awarded, 210);
        assert_eq!(done.enrollment.progress_percentage, 100);
        assert_eq!(done.enrollment.status, EnrollmentStatus::Completed);
        assert!(done.enrollment.completed_at.is_some());

        let repeat = repo
            .update_progress(learner, enrollment.id, &progress(last.id))
            .await
            .unwrap();
        assert_eq!(repeat.xp_awarded, 0);
        assert_eq!(repeat.enrollment.status, EnrollmentStatus::Completed);

        let account = AccountRepository::new(pool).require(learner).await.unwrap();
        assert_eq!(account.xp_points, 220);
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn test_path_ratings_average() {
        let pool = test_pool().await;
        let repo = LearningPathRepository::new(pool);
        let creator = create_account(pool).await;
        let category = create_category(pool).await;
        let path = repo.create(creator, &new_path(category, 100)).await.unwrap();

        let mut rated = None;
        for rating in [3, 4, 5] {
            let learner = create_account(pool).await;
            repo.enroll(learner, path.id).await.unwrap();
            rated = Some(
                repo.rate(learner, path.id, &RateRequest { rating, review: None })
                    .await
                    .unwrap(),
            );
        }

        let rated = rated.unwrap();
        assert_eq!(rated.average_rating.to_string(), "4.00");
        assert_eq!(
            serde_json::to_value(&rated).unwrap()["average_rating"],
            "4.00"
        );
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn test_rating_without_enrollment_is_rejected() {
        let pool = test_pool().await;
        let repo = LearningPathRepository::new(pool);
        let creator = create_account(pool).await;
        let stranger = create_account(pool).await;
        let category = create_category(pool).await;
        let path = repo.create(creator, &new_path(category, 100)).await.unwrap();

        let err = repo
            .rate(stranger, path.id, &RateRequest { rating: 5, review: None })
            .await
            .unwrap_err();
        assert!(matches!(err, PgError::Domain(DomainError::Validation(_))));
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn test_unknown_references_are_bad_requests() {
        let pool = test_pool().await;
        let repo = LearningPathRepository::new(pool);
        let creator = create_account(pool).await;
        let category = create_category(pool).await;

        let unknown_category = repo
            .create(creator, &new_path(CategoryId(i64::MAX), 100))
            .await
            .unwrap_err();
        assert!(unknown_category.is_foreign_key_violation());
        assert_eq!(
            RouteError::from(unknown_category).into_response().status(),
            StatusCode::BAD_REQUEST
        );

        let unknown_skill = repo
            .create(
                creator,
                &CreateLearningPath {
                    skill_ids: vec![i64::MAX],
                    ..new_path(category, 100)
                },
            )
            .await
            .unwrap_err();
        assert_eq!(
            RouteError::from(unknown_skill).into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }
}

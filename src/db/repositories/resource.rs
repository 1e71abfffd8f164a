use sqlx::{Pool, Postgres, Result as SqlxResult};
use tracing::instrument;

use super::{replace_skills, sql_fragment};
use crate::db::models::learning_path::RateRequest;
use crate::db::models::resource::{
    CompletionResult, CreateRecommendation, CreateResource, Recommendation,
    RecommendationFilter, Resource, ResourceFilter, ResourceProvider, ResourceType,
    UpdateResource, UserResource,
};
use crate::db::models::{AccountId, Pagination, ResourceId};
use crate::db::repositories::{Repository, Tx};
use crate::db::{PgError, PgResult};
use crate::domain::DomainError;
use crate::domain::gamification::{XpDelta, XpSource, resource_completion_xp};
use crate::domain::rating::{Rating, recompute_average};

#[derive(Debug)]
pub struct ResourceRepository {
    pool: &'static Pool<Postgres>,
}

const RESOURCE_FILTER: &str = r#"
    ($1::BIGINT IS NULL OR resource_type_id = $1)
    AND ($2::BIGINT IS NULL OR provider_id = $2)
    AND ($3::TEXT IS NULL OR difficulty = $3)
    AND ($4::BIGINT IS NULL OR EXISTS (
        SELECT 1 FROM resource_skill rs
        WHERE rs.resource_id = resource.id AND rs.skill_id = $4
    ))
    AND ($5::BOOLEAN IS NULL OR is_free = $5)
"#;

#[async_trait::async_trait]
impl Repository for ResourceRepository {
    type Ident = ResourceId;
    type Output = Resource;

    const BASE_FIELDS: &'static str = sql_fragment::RESOURCE_FIELDS;
    const TABLE_NAME: &'static str = "resource";
    const ENTITY: &'static str = "Resource";

    #[instrument(skip(pool))]
    fn new(pool: &'static Pool<Postgres>) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    fn pool(&self) -> &'static Pool<Postgres> {
        self.pool
    }
}

impl ResourceRepository {
    #[instrument(skip(self))]
    pub async fn resource_types(&self) -> SqlxResult<Vec<ResourceType>> {
        sqlx::query_as::<_, ResourceType>(
            "SELECT id, name, description, icon FROM resource_type ORDER BY name",
        )
        .fetch_all(self.pool)
        .await
    }

    #[instrument(skip(self))]
    pub async fn providers(&self) -> SqlxResult<Vec<ResourceProvider>> {
        sqlx::query_as::<_, ResourceProvider>(
            "SELECT id, name, website, logo FROM resource_provider ORDER BY name",
        )
        .fetch_all(self.pool)
        .await
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: &ResourceFilter,
        pagination: &Pagination,
    ) -> SqlxResult<(Vec<Resource>, i64)> {
        let resources = sqlx::query_as::<_, Resource>(&format!(
            r#"
            SELECT {}
            FROM resource
            WHERE {RESOURCE_FILTER}
            ORDER BY created_at DESC, id DESC
            LIMIT $6 OFFSET $7
            "#,
            Self::BASE_FIELDS
        ))
        .bind(filter.resource_type)
        .bind(filter.provider)
        .bind(filter.difficulty.map(|d| d.as_str()))
        .bind(filter.skill)
        .bind(filter.is_free)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM resource WHERE {RESOURCE_FILTER}"
        ))
        .bind(filter.resource_type)
        .bind(filter.provider)
        .bind(filter.difficulty.map(|d| d.as_str()))
        .bind(filter.skill)
        .bind(filter.is_free)
        .fetch_one(self.pool)
        .await?;

        Ok((resources, total))
    }

    #[instrument(skip(self, req), fields(title = %req.title))]
    pub async fn create(&self, caller: AccountId, req: &CreateResource) -> PgResult<Resource> {
        if req.title.trim().is_empty() || req.url.trim().is_empty() {
            return Err(DomainError::validation("Title and URL are required.").into());
        }

        let mut tx = Tx::begin(self.pool).await?;

        let id = sqlx::query_scalar::<_, ResourceId>(
            r#"
            INSERT INTO resource (
                title,
                description,
                url,
                thumbnail,
                resource_type_id,
                provider_id,
                duration_minutes,
                difficulty,
                is_free,
                added_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(req.title.trim())
        .bind(&req.description)
        .bind(req.url.trim())
        .bind(&req.thumbnail)
        .bind(req.resource_type_id)
        .bind(req.provider_id)
        .bind(req.duration_minutes.max(0))
        .bind(req.difficulty.as_str())
        .bind(req.is_free)
        .bind(caller)
        .fetch_one(tx.conn()?)
        .await?;

        replace_skills(tx.conn()?, "resource_skill", "resource_id", id.0, &req.skill_ids).await?;
        let resource = Self::fetch(&mut tx, id).await?;

        tx.commit().await?;
        Ok(resource)
    }

    async fn fetch(tx: &mut Tx, id: ResourceId) -> SqlxResult<Resource> {
        sqlx::query_as::<_, Resource>(&format!(
            "SELECT {} FROM resource WHERE id = $1",
            Self::BASE_FIELDS
        ))
        .bind(id)
        .fetch_one(tx.conn()?)
        .await
    }

    /// Only the account that added a resource, or staff, may change it.
    async fn lock_editable(
        tx: &mut Tx,
        caller: AccountId,
        is_staff: bool,
        id: ResourceId,
    ) -> PgResult<()> {
        let added_by = sqlx::query_scalar::<_, Option<AccountId>>(
            "SELECT added_by FROM resource WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(tx.conn()?)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("Resource {id} not found.")))?;

        if !is_staff && added_by != Some(caller) {
            return Err(DomainError::forbidden(
                "You do not have permission to modify this resource.",
            )
            .into());
        }

        Ok(())
    }

    #[instrument(skip(self, req))]
    pub async fn update(
        &self,
        caller: AccountId,
        is_staff: bool,
        id: ResourceId,
        req: &UpdateResource,
    ) -> PgResult<Resource> {
        let mut tx = Tx::begin(self.pool).await?;
        Self::lock_editable(&mut tx, caller, is_staff, id).await?;

        sqlx::query(
            r#"
            UPDATE resource SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                url = COALESCE($4, url),
                thumbnail = COALESCE($5, thumbnail),
                duration_minutes = COALESCE($6, duration_minutes),
                difficulty = COALESCE($7, difficulty),
                is_free = COALESCE($8, is_free),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&req.title)
        .bind(&req.description)
        .bind(&req.url)
        .bind(&req.thumbnail)
        .bind(req.duration_minutes.map(|m| m.max(0)))
        .bind(req.difficulty.map(|d| d.as_str()))
        .bind(req.is_free)
        .execute(tx.conn()?)
        .await?;

        if let Some(skill_ids) = &req.skill_ids {
            replace_skills(tx.conn()?, "resource_skill", "resource_id", id.0, skill_ids).await?;
        }

        let resource = Self::fetch(&mut tx, id).await?;
        tx.commit().await?;

        Ok(resource)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, caller: AccountId, is_staff: bool, id: ResourceId) -> PgResult<()> {
        let mut tx = Tx::begin(self.pool).await?;
        Self::lock_editable(&mut tx, caller, is_staff, id).await?;

        sqlx::query("DELETE FROM resource WHERE id = $1")
            .bind(id)
            .execute(tx.conn()?)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Makes sure the caller has an interaction row for `id` and returns it locked.
    async fn lock_interaction(
        tx: &mut Tx,
        caller: AccountId,
        id: ResourceId,
    ) -> PgResult<UserResource> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO user_resource (account_id, resource_id)
            VALUES ($1, $2)
            ON CONFLICT (account_id, resource_id) DO NOTHING
            "#,
        )
        .bind(caller)
        .bind(id)
        .execute(tx.conn()?)
        .await
        .map_err(PgError::from);

        match inserted {
            Err(e) if e.is_foreign_key_violation() => {
                return Err(DomainError::not_found(format!("Resource {id} not found.")).into());
            }
            Err(e) => return Err(e),
            Ok(_) => (),
        }

        Ok(sqlx::query_as::<_, UserResource>(&format!(
            r#"
            SELECT {} FROM user_resource
            WHERE account_id = $1 AND resource_id = $2
            FOR UPDATE
            "#,
            sql_fragment::USER_RESOURCE_FIELDS
        ))
        .bind(caller)
        .bind(id)
        .fetch_one(tx.conn()?)
        .await?)
    }

    /// Counts a view and refreshes the caller's `viewed_at`.
    #[instrument(skip(self))]
    pub async fn view(&self, caller: AccountId, id: ResourceId) -> PgResult<UserResource> {
        let mut tx = Tx::begin(self.pool).await?;

        let bumped = sqlx::query("UPDATE resource SET view_count = view_count + 1 WHERE id = $1")
            .bind(id)
            .execute(tx.conn()?)
            .await?
            .rows_affected();
        if bumped == 0 {
            return Err(DomainError::not_found(format!("Resource {id} not found.")).into());
        }

        Self::lock_interaction(&mut tx, caller, id).await?;
        let interaction = sqlx::query_as::<_, UserResource>(&format!(
            r#"
            UPDATE user_resource SET viewed_at = NOW()
            WHERE account_id = $1 AND resource_id = $2
            RETURNING {}
            "#,
            sql_fragment::USER_RESOURCE_FIELDS
        ))
        .bind(caller)
        .bind(id)
        .fetch_one(tx.conn()?)
        .await?;

        tx.commit().await?;
        Ok(interaction)
    }

    /// Sets the bookmark flag. The resource counter only moves when the flag actually changes.
    #[instrument(skip(self))]
    pub async fn bookmark(
        &self,
        caller: AccountId,
        id: ResourceId,
        bookmarked: bool,
    ) -> PgResult<UserResource> {
        let mut tx = Tx::begin(self.pool).await?;
        let current = Self::lock_interaction(&mut tx, caller, id).await?;

        if current.is_bookmarked == bookmarked {
            tx.commit().await?;
            return Ok(current);
        }

        let interaction = sqlx::query_as::<_, UserResource>(&format!(
            r#"
            UPDATE user_resource SET is_bookmarked = $3
            WHERE account_id = $1 AND resource_id = $2
            RETURNING {}
            "#,
            sql_fragment::USER_RESOURCE_FIELDS
        ))
        .bind(caller)
        .bind(id)
        .bind(bookmarked)
        .fetch_one(tx.conn()?)
        .await?;

        sqlx::query(
            "UPDATE resource SET bookmark_count = GREATEST(0, bookmark_count + $2) WHERE id = $1",
        )
        .bind(id)
        .bind(if bookmarked { 1_i64 } else { -1_i64 })
        .execute(tx.conn()?)
        .await?;

        tx.commit().await?;
        Ok(interaction)
    }

    #[instrument(skip(self, req))]
    pub async fn rate(
        &self,
        caller: AccountId,
        id: ResourceId,
        req: &RateRequest,
    ) -> PgResult<Resource> {
        let rating = Rating::new(req.rating)?;
        let mut tx = Tx::begin(self.pool).await?;

        sqlx::query_scalar::<_, ResourceId>("SELECT id FROM resource WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(tx.conn()?)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Resource {id} not found.")))?;

        Self::lock_interaction(&mut tx, caller, id).await?;
        sqlx::query("UPDATE user_resource SET rating = $3 WHERE account_id = $1 AND resource_id = $2")
            .bind(caller)
            .bind(id)
            .bind(rating.get())
            .execute(tx.conn()?)
            .await?;

        let ratings = sqlx::query_scalar::<_, i16>(
            "SELECT rating FROM user_resource WHERE resource_id = $1 AND rating IS NOT NULL",
        )
        .bind(id)
        .fetch_all(tx.conn()?)
        .await?
        .into_iter()
        .filter_map(|r| Rating::new(i64::from(r)).ok())
        .collect::<Vec<_>>();
        let average = recompute_average(&ratings);

        sqlx::query(
            "UPDATE resource SET average_rating = $2::NUMERIC / 100, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(average.hundredths())
        .execute(tx.conn()?)
        .await?;

        let resource = Self::fetch(&mut tx, id).await?;
        tx.commit().await?;

        tracing::debug!(resource = %id, %average, "resource rated");
        Ok(resource)
    }

    /// Marks the resource completed or not. XP is paid the first time only; un-completing and
    /// completing again pays nothing.
    #[instrument(skip(self))]
    pub async fn complete(
        &self,
        caller: AccountId,
        id: ResourceId,
        completed: bool,
    ) -> PgResult<CompletionResult> {
        let mut tx = Tx::begin(self.pool).await?;
        let current = Self::lock_interaction(&mut tx, caller, id).await?;

        let mut xp_awarded = 0;
        let interaction = match (completed, current.is_completed) {
            (true, false) => {
                let pay = !current.completion_rewarded;
                let interaction = sqlx::query_as::<_, UserResource>(&format!(
                    r#"
                    UPDATE user_resource
                    SET is_completed = TRUE, completed_at = NOW(), completion_rewarded = TRUE
                    WHERE account_id = $1 AND resource_id = $2
                    RETURNING {}
                    "#,
                    sql_fragment::USER_RESOURCE_FIELDS
                ))
                .bind(caller)
                .bind(id)
                .fetch_one(tx.conn()?)
                .await?;

                if pay {
                    let duration = sqlx::query_scalar::<_, i64>(
                        "SELECT duration_minutes FROM resource WHERE id = $1",
                    )
                    .bind(id)
                    .fetch_one(tx.conn()?)
                    .await?;

                    let delta = XpDelta::new(resource_completion_xp(duration))?;
                    if !delta.is_zero() {
                        let reward = tx.reward(caller, delta, XpSource::ResourceCompleted).await?;
                        xp_awarded = reward.award.delta;
                    }
                }

                interaction
            }
            (false, true) => {
                sqlx::query_as::<_, UserResource>(&format!(
                    r#"
                    UPDATE user_resource SET is_completed = FALSE, completed_at = NULL
                    WHERE account_id = $1 AND resource_id = $2
                    RETURNING {}
                    "#,
                    sql_fragment::USER_RESOURCE_FIELDS
                ))
                .bind(caller)
                .bind(id)
                .fetch_one(tx.conn()?)
                .await?
            }
            _ => current,
        };

        tx.commit().await?;

        Ok(CompletionResult {
            interaction,
            xp_awarded,
        })
    }

    /// The caller's interactions, optionally narrowed to bookmarked or completed ones.
    #[instrument(skip(self))]
    pub async fn interactions(
        &self,
        caller: AccountId,
        bookmarked: Option<bool>,
        completed: Option<bool>,
    ) -> SqlxResult<Vec<UserResource>> {
        sqlx::query_as::<_, UserResource>(&format!(
            r#"
            SELECT {} FROM user_resource
            WHERE account_id = $1
                AND ($2::BOOLEAN IS NULL OR is_bookmarked = $2)
                AND ($3::BOOLEAN IS NULL OR is_completed = $3)
            ORDER BY viewed_at DESC
            "#,
            sql_fragment::USER_RESOURCE_FIELDS
        ))
        .bind(caller)
        .bind(bookmarked)
        .bind(completed)
        .fetch_all(self.pool)
        .await
    }

    /// Empty unless a learning path or step is given.
    #[instrument(skip(self))]
    pub async fn recommendations(
        &self,
        filter: &RecommendationFilter,
    ) -> SqlxResult<Vec<Recommendation>> {
        let (column, target) = match (filter.learning_path, filter.step) {
            (Some(path), _) => ("learning_path_id", path),
            (None, Some(step)) => ("step_id", step),
            (None, None) => return Ok(Vec::new()),
        };

        sqlx::query_as::<_, Recommendation>(&format!(
            "SELECT {} FROM resource_recommendation WHERE {column} = $1 ORDER BY position, id",
            sql_fragment::RECOMMENDATION_FIELDS
        ))
        .bind(target)
        .fetch_all(self.pool)
        .await
    }

    #[instrument(skip(self, req))]
    pub async fn create_recommendation(
        &self,
        is_staff: bool,
        req: &CreateRecommendation,
    ) -> PgResult<Recommendation> {
        if !is_staff {
            return Err(DomainError::forbidden(
                "Only staff can manage recommendations.",
            )
            .into());
        }
        if req.learning_path_id.is_none() && req.step_id.is_none() {
            return Err(DomainError::validation(
                "A recommendation needs a learning path or a step.",
            )
            .into());
        }

        let result = sqlx::query_as::<_, Recommendation>(&format!(
            r#"
            INSERT INTO resource_recommendation (
                resource_id, learning_path_id, step_id, is_required, position
            )
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            sql_fragment::RECOMMENDATION_FIELDS
        ))
        .bind(req.resource_id)
        .bind(req.learning_path_id)
        .bind(req.step_id)
        .bind(req.is_required)
        .bind(req.position)
        .fetch_one(self.pool)
        .await
        .map_err(PgError::from);

        match result {
            Err(e) if e.is_foreign_key_violation() => Err(DomainError::not_found(
                "The recommended resource or its target does not exist.",
            )
            .into()),
            other => other,
        }
    }
}

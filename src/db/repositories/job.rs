use sqlx::{Pool, Postgres, Result as SqlxResult};
use tracing::instrument;

use super::sql_fragment;
use crate::db::models::job::{
    ApplyRequest, Company, JobApplication, JobFilter, JobListing, SavedJob,
};
use crate::db::models::{AccountId, CompanyId, JobApplicationId, JobListingId, Pagination, SavedJobId};
use crate::db::repositories::{Repository, Tx};
use crate::db::{PgError, PgResult};
use crate::domain::DomainError;
use crate::domain::jobs::{ApplicationStatus, check_application};

#[derive(Debug)]
pub struct JobRepository {
    pool: &'static Pool<Postgres>,
}

/// Open listings: active and not past their expiry date.
const OPEN_FILTER: &str = r#"
    is_active AND expires_at >= CURRENT_DATE
    AND ($1::TEXT IS NULL OR job_type = $1)
    AND ($2::TEXT IS NULL OR experience_level = $2)
    AND ($3::BIGINT IS NULL OR EXISTS (
        SELECT 1 FROM job_listing_skill jls
        WHERE jls.job_listing_id = job_listing.id AND jls.skill_id = $3
    ))
    AND ($4::BIGINT IS NULL OR salary_min >= $4)
    AND ($5::BIGINT IS NULL OR salary_max <= $5)
"#;

#[async_trait::async_trait]
impl Repository for JobRepository {
    type Ident = JobListingId;
    type Output = JobListing;

    const BASE_FIELDS: &'static str = sql_fragment::JOB_FIELDS;
    const TABLE_NAME: &'static str = "job_listing";
    const ENTITY: &'static str = "Job listing";

    #[instrument(skip(pool))]
    fn new(pool: &'static Pool<Postgres>) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    fn pool(&self) -> &'static Pool<Postgres> {
        self.pool
    }
}

impl JobRepository {
    #[instrument(skip(self))]
    pub async fn companies(&self) -> SqlxResult<Vec<Company>> {
        sqlx::query_as::<_, Company>(&format!(
            "SELECT {} FROM company ORDER BY name",
            sql_fragment::COMPANY_FIELDS
        ))
        .fetch_all(self.pool)
        .await
    }

    #[instrument(skip(self))]
    pub async fn company(&self, id: CompanyId) -> PgResult<Company> {
        sqlx::query_as::<_, Company>(&format!(
            "SELECT {} FROM company WHERE id = $1",
            sql_fragment::COMPANY_FIELDS
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("Company {id} not found.")).into())
    }

    #[instrument(skip(self))]
    pub async fn listings(
        &self,
        filter: &JobFilter,
        pagination: &Pagination,
    ) -> SqlxResult<(Vec<JobListing>, i64)> {
        let listings = sqlx::query_as::<_, JobListing>(&format!(
            r#"
            SELECT {}
            FROM job_listing
            WHERE {OPEN_FILTER}
            ORDER BY posted_at DESC, id DESC
            LIMIT $6 OFFSET $7
            "#,
            Self::BASE_FIELDS
        ))
        .bind(filter.job_type.map(|t| t.as_str()))
        .bind(filter.experience_level.map(|e| e.as_str()))
        .bind(filter.skill)
        .bind(filter.min_salary)
        .bind(filter.max_salary)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM job_listing WHERE {OPEN_FILTER}"
        ))
        .bind(filter.job_type.map(|t| t.as_str()))
        .bind(filter.experience_level.map(|e| e.as_str()))
        .bind(filter.skill)
        .bind(filter.min_salary)
        .bind(filter.max_salary)
        .fetch_one(self.pool)
        .await?;

        Ok((listings, total))
    }

    /// Fetches an open listing and counts the view.
    #[instrument(skip(self))]
    pub async fn view(&self, id: JobListingId) -> PgResult<JobListing> {
        sqlx::query_as::<_, JobListing>(&format!(
            r#"
            UPDATE job_listing SET view_count = view_count + 1
            WHERE id = $1 AND is_active AND expires_at >= CURRENT_DATE
            RETURNING {}
            "#,
            Self::BASE_FIELDS
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("Job listing {id} not found.")).into())
    }

    async fn require_open(tx: &mut Tx, id: JobListingId) -> PgResult<()> {
        let open = sqlx::query_scalar::<_, bool>(
            "SELECT is_active AND expires_at >= CURRENT_DATE FROM job_listing WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(tx.conn()?)
        .await?
        .unwrap_or(false);

        if !open {
            return Err(DomainError::not_found(format!("Job listing {id} not found.")).into());
        }

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn save(&self, caller: AccountId, id: JobListingId) -> PgResult<SavedJob> {
        let mut tx = Tx::begin(self.pool).await?;
        Self::require_open(&mut tx, id).await?;

        let result = sqlx::query_as::<_, SavedJob>(&format!(
            r#"
            INSERT INTO saved_job (account_id, job_listing_id)
            VALUES ($1, $2)
            RETURNING {}
            "#,
            sql_fragment::SAVED_JOB_FIELDS
        ))
        .bind(caller)
        .bind(id)
        .fetch_one(tx.conn()?)
        .await
        .map_err(PgError::from);

        let saved = match result {
            Ok(saved) => saved,
            Err(e) if e.is_unique_violation() => {
                return Err(DomainError::conflict("Job already saved.").into());
            }
            Err(e) => return Err(e),
        };

        tx.commit().await?;
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn unsave(&self, caller: AccountId, id: JobListingId) -> PgResult<()> {
        let removed = sqlx::query("DELETE FROM saved_job WHERE account_id = $1 AND job_listing_id = $2")
            .bind(caller)
            .bind(id)
            .execute(self.pool)
            .await?
            .rows_affected();

        if removed == 0 {
            return Err(DomainError::validation("Job not in saved jobs.").into());
        }

        Ok(())
    }

    /// Files an application and bumps the listing's application counter in one transaction.
    #[instrument(skip(self, req))]
    pub async fn apply(
        &self,
        caller: AccountId,
        id: JobListingId,
        req: &ApplyRequest,
    ) -> PgResult<JobApplication> {
        let mut tx = Tx::begin(self.pool).await?;
        Self::require_open(&mut tx, id).await?;

        let already_applied = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM job_application WHERE account_id = $1 AND job_listing_id = $2)",
        )
        .bind(caller)
        .bind(id)
        .fetch_one(tx.conn()?)
        .await?;

        if already_applied {
            return Err(DomainError::conflict("Already applied to this job.").into());
        }

        check_application(&req.cover_letter, &req.resume)?;

        let result = sqlx::query_as::<_, JobApplication>(&format!(
            r#"
            INSERT INTO job_application (account_id, job_listing_id, cover_letter, resume, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            sql_fragment::APPLICATION_FIELDS
        ))
        .bind(caller)
        .bind(id)
        .bind(req.cover_letter.trim())
        .bind(req.resume.trim())
        .bind(ApplicationStatus::Applied.as_str())
        .fetch_one(tx.conn()?)
        .await
        .map_err(PgError::from);

        let application = match result {
            Ok(application) => application,
            Err(e) if e.is_unique_violation() => {
                return Err(DomainError::conflict("Already applied to this job.").into());
            }
            Err(e) => return Err(e),
        };

        sqlx::query(
            "UPDATE job_listing SET application_count = application_count + 1 WHERE id = $1",
        )
        .bind(id)
        .execute(tx.conn()?)
        .await?;

        tx.commit().await?;
        tracing::info!(account = %caller, job = %id, "job application filed");

        Ok(application)
    }

    #[instrument(skip(self))]
    pub async fn applications(&self, caller: AccountId) -> SqlxResult<Vec<JobApplication>> {
        sqlx::query_as::<_, JobApplication>(&format!(
            "SELECT {} FROM job_application WHERE account_id = $1 ORDER BY applied_at DESC",
            sql_fragment::APPLICATION_FIELDS
        ))
        .bind(caller)
        .fetch_all(self.pool)
        .await
    }

    #[instrument(skip(self))]
    pub async fn application(
        &self,
        caller: AccountId,
        id: JobApplicationId,
    ) -> PgResult<JobApplication> {
        sqlx::query_as::<_, JobApplication>(&format!(
            "SELECT {} FROM job_application WHERE id = $1 AND account_id = $2",
            sql_fragment::APPLICATION_FIELDS
        ))
        .bind(id)
        .bind(caller)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("Application {id} not found.")).into())
    }

    #[instrument(skip(self))]
    pub async fn withdraw(
        &self,
        caller: AccountId,
        id: JobApplicationId,
    ) -> PgResult<JobApplication> {
        let mut tx = Tx::begin(self.pool).await?;

        let (owner, status) = sqlx::query_as::<_, (AccountId, String)>(
            "SELECT account_id, status FROM job_application WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(tx.conn()?)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("Application {id} not found.")))?;

        if owner != caller {
            return Err(DomainError::forbidden("You are not the applicant.").into());
        }

        let next = ApplicationStatus::try_from(status)?.withdraw()?;

        let application = sqlx::query_as::<_, JobApplication>(&format!(
            r#"
            UPDATE job_application SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            sql_fragment::APPLICATION_FIELDS
        ))
        .bind(id)
        .bind(next.as_str())
        .fetch_one(tx.conn()?)
        .await?;

        tx.commit().await?;
        Ok(application)
    }

    #[instrument(skip(self))]
    pub async fn saved_jobs(&self, caller: AccountId) -> SqlxResult<Vec<SavedJob>> {
        sqlx::query_as::<_, SavedJob>(&format!(
            "SELECT {} FROM saved_job WHERE account_id = $1 ORDER BY saved_at DESC",
            sql_fragment::SAVED_JOB_FIELDS
        ))
        .bind(caller)
        .fetch_all(self.pool)
        .await
    }

    #[instrument(skip(self))]
    pub async fn delete_saved_job(&self, caller: AccountId, id: SavedJobId) -> PgResult<()> {
        let removed = sqlx::query("DELETE FROM saved_job WHERE id = $1 AND account_id = $2")
            .bind(id)
            .bind(caller)
            .execute(self.pool)
            .await?
            .rows_affected();

        if removed == 0 {
            return Err(DomainError::not_found(format!("Saved job {id} not found.")).into());
        }

        Ok(())
    }
}

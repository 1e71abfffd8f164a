use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::{AccountId, CompanyId, JobApplicationId, JobListingId, SavedJobId};
use crate::domain::jobs::{ApplicationStatus, CompanySize, EducationLevel, ExperienceLevel, JobType};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    pub description: String,
    pub website: String,
    pub logo: Option<String>,
    pub location: String,
    #[sqlx(try_from = "String")]
    pub size: CompanySize,
    pub industry: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct JobListing {
    pub id: JobListingId,
    pub title: String,
    pub description: String,
    pub company_id: CompanyId,
    pub company_name: String,
    #[sqlx(try_from = "String")]
    pub job_type: JobType,
    pub location: String,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    #[sqlx(try_from = "String")]
    pub experience_level: ExperienceLevel,
    #[sqlx(try_from = "String")]
    pub education_level: EducationLevel,
    pub skill_ids: Vec<i64>,
    pub is_active: bool,
    pub view_count: i64,
    pub application_count: i64,
    pub posted_at: DateTime<Utc>,
    pub expires_at: NaiveDate,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct JobApplication {
    pub id: JobApplicationId,
    pub account_id: AccountId,
    pub job_listing_id: JobListingId,
    pub job_title: String,
    pub cover_letter: String,
    /// Reference produced by the external file store
    pub resume: String,
    #[sqlx(try_from = "String")]
    pub status: ApplicationStatus,
    pub applied_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SavedJob {
    pub id: SavedJobId,
    pub account_id: AccountId,
    pub job_listing_id: JobListingId,
    pub job_title: String,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobFilter {
    pub job_type: Option<JobType>,
    pub experience_level: Option<ExperienceLevel>,
    pub skill: Option<i64>,
    pub min_salary: Option<i64>,
    pub max_salary: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplyRequest {
    #[serde(default)]
    pub cover_letter: String,
    #[serde(default)]
    pub resume: String,
}

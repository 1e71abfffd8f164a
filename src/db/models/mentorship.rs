use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::{
    AccountId, MentorId, MentorReviewId, MentorshipId, MentorshipMessageId, MentorshipRequestId,
    SkillId,
};
use crate::domain::mentorship::{MentorshipStatus, RequestStatus};
use crate::domain::rating::RatingAverage;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MentorProfile {
    pub id: MentorId,
    pub account_id: AccountId,
    pub username: String,
    pub bio: String,
    pub expertise: String,
    pub years_of_experience: i64,
    pub is_available: bool,
    pub max_mentees: i64,
    #[sqlx(try_from = "i64")]
    pub rating: RatingAverage,
    pub review_count: i64,
    pub skill_ids: Vec<i64>,
    pub active_mentees: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MentorshipRequest {
    pub id: MentorshipRequestId,
    pub mentee_id: AccountId,
    pub mentor_id: MentorId,
    /// Account behind `mentor_id`
    pub mentor_account_id: AccountId,
    pub message: String,
    #[sqlx(try_from = "String")]
    pub status: RequestStatus,
    pub skill_ids: Vec<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Mentorship {
    pub id: MentorshipId,
    pub mentee_id: AccountId,
    pub mentor_id: MentorId,
    pub mentor_account_id: AccountId,
    pub goals: String,
    #[sqlx(try_from = "String")]
    pub status: MentorshipStatus,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub skill_ids: Vec<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Mentorship {
    pub fn is_participant(&self, account: AccountId) -> bool {
        self.mentee_id == account || self.mentor_account_id == account
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MentorReview {
    pub id: MentorReviewId,
    pub mentorship_id: MentorshipId,
    pub rating: i16,
    pub review: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MentorshipMessage {
    pub id: MentorshipMessageId,
    pub mentorship_id: MentorshipId,
    pub sender_id: AccountId,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MentorFilter {
    pub skill: Option<i64>,
    pub available: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateMentorProfile {
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub expertise: String,
    #[serde(default)]
    pub years_of_experience: i64,
    #[serde(default = "default_max_mentees")]
    pub max_mentees: i64,
    #[serde(default)]
    pub skill_ids: Vec<i64>,
}

fn default_max_mentees() -> i64 {
    5
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateMentorProfile {
    pub bio: Option<String>,
    pub expertise: Option<String>,
    pub years_of_experience: Option<i64>,
    pub is_available: Option<bool>,
    pub max_mentees: Option<i64>,
    pub skill_ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateMentorshipRequest {
    pub mentor_id: MentorId,
    pub message: String,
    #[serde(default)]
    pub skill_ids: Vec<SkillId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MentorshipStatusChange {
    pub status: MentorshipStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateMentorReview {
    pub mentorship_id: MentorshipId,
    pub rating: i64,
    #[serde(default)]
    pub review: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateMessage {
    pub content: String,
}

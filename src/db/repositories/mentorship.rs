use sqlx::{Pool, Postgres, Result as SqlxResult};
use tracing::instrument;

use super::{replace_skills, sql_fragment};
use crate::db::models::mentorship::{
    CreateMentorProfile, CreateMentorReview, CreateMentorshipRequest, CreateMessage,
    MentorFilter, MentorProfile, MentorReview, Mentorship, MentorshipMessage, MentorshipRequest,
    MentorshipStatusChange, UpdateMentorProfile,
};
use crate::db::models::{AccountId, MentorId, MentorshipId, MentorshipRequestId, Pagination};
use crate::db::repositories::{Repository, Tx};
use crate::db::{PgError, PgResult};
use crate::domain::DomainError;
use crate::domain::mentorship::{MentorshipStatus, Party, RequestAction, RequestStatus, check_capacity};
use crate::domain::rating::{Rating, recompute_average};

#[derive(Debug)]
pub struct MentorshipRepository {
    pool: &'static Pool<Postgres>,
}

const MENTOR_FILTER: &str = r#"
    is_available = COALESCE($1::BOOLEAN, TRUE)
    AND ($2::BIGINT IS NULL OR EXISTS (
        SELECT 1 FROM mentor_skill ms
        WHERE ms.mentor_id = mentor_profile.id AND ms.skill_id = $2
    ))
"#;

#[async_trait::async_trait]
impl Repository for MentorshipRepository {
    type Ident = MentorId;
    type Output = MentorProfile;

    const BASE_FIELDS: &'static str = sql_fragment::MENTOR_FIELDS;
    const TABLE_NAME: &'static str = "mentor_profile";
    const ENTITY: &'static str = "Mentor profile";

    #[instrument(skip(pool))]
    fn new(pool: &'static Pool<Postgres>) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    fn pool(&self) -> &'static Pool<Postgres> {
        self.pool
    }
}

impl MentorshipRepository {
    /// Available mentors unless `available=false` is asked for explicitly.
    #[instrument(skip(self))]
    pub async fn mentors(
        &self,
        filter: &MentorFilter,
        pagination: &Pagination,
    ) -> SqlxResult<(Vec<MentorProfile>, i64)> {
        let mentors = sqlx::query_as::<_, MentorProfile>(&format!(
            r#"
            SELECT {}
            FROM mentor_profile
            WHERE {MENTOR_FILTER}
            ORDER BY rating DESC, review_count DESC, id
            LIMIT $3 OFFSET $4
            "#,
            Self::BASE_FIELDS
        ))
        .bind(filter.available)
        .bind(filter.skill)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM mentor_profile WHERE {MENTOR_FILTER}"
        ))
        .bind(filter.available)
        .bind(filter.skill)
        .fetch_one(self.pool)
        .await?;

        Ok((mentors, total))
    }

    async fn fetch_mentor(tx: &mut Tx, id: MentorId) -> SqlxResult<MentorProfile> {
        sqlx::query_as::<_, MentorProfile>(&format!(
            "SELECT {} FROM mentor_profile WHERE id = $1",
            Self::BASE_FIELDS
        ))
        .bind(id)
        .fetch_one(tx.conn()?)
        .await
    }

    /// Creates the caller's mentor profile and flags the account as a mentor.
    #[instrument(skip(self, req))]
    pub async fn create_profile(
        &self,
        caller: AccountId,
        req: &CreateMentorProfile,
    ) -> PgResult<MentorProfile> {
        if req.max_mentees < 1 || req.years_of_experience < 0 {
            return Err(DomainError::validation(
                "Mentee capacity must be positive and experience cannot be negative.",
            )
            .into());
        }

        let mut tx = Tx::begin(self.pool).await?;

        let result = sqlx::query_scalar::<_, MentorId>(
            r#"
            INSERT INTO mentor_profile (account_id, bio, expertise, years_of_experience, max_mentees)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(caller)
        .bind(&req.bio)
        .bind(&req.expertise)
        .bind(req.years_of_experience)
        .bind(req.max_mentees)
        .fetch_one(tx.conn()?)
        .await
        .map_err(PgError::from);

        let id = match result {
            Ok(id) => id,
            Err(e) if e.is_unique_violation() => {
                return Err(DomainError::conflict("You already have a mentor profile.").into());
            }
            Err(e) => return Err(e),
        };

        replace_skills(tx.conn()?, "mentor_skill", "mentor_id", id.0, &req.skill_ids).await?;

        sqlx::query("UPDATE account SET is_mentor = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(caller)
            .execute(tx.conn()?)
            .await?;

        let profile = Self::fetch_mentor(&mut tx, id).await?;
        tx.commit().await?;

        tracing::info!(account = %caller, mentor = %id, "mentor profile created");
        Ok(profile)
    }

    #[instrument(skip(self))]
    pub async fn own_profile(&self, caller: AccountId) -> PgResult<MentorProfile> {
        sqlx::query_as::<_, MentorProfile>(&format!(
            "SELECT {} FROM mentor_profile WHERE account_id = $1",
            Self::BASE_FIELDS
        ))
        .bind(caller)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DomainError::not_found("Mentor profile not found.").into())
    }

    #[instrument(skip(self, req))]
    pub async fn update_profile(
        &self,
        caller: AccountId,
        id: MentorId,
        req: &UpdateMentorProfile,
    ) -> PgResult<MentorProfile> {
        if req.max_mentees.is_some_and(|m| m < 1) {
            return Err(DomainError::validation("Mentee capacity must be positive.").into());
        }

        let mut tx = Tx::begin(self.pool).await?;

        let owner = sqlx::query_scalar::<_, AccountId>(
            "SELECT account_id FROM mentor_profile WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(tx.conn()?)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("Mentor profile {id} not found.")))?;

        if owner != caller {
            return Err(DomainError::forbidden("You can only edit your own mentor profile.").into());
        }

        sqlx::query(
            r#"
            UPDATE mentor_profile SET
                bio = COALESCE($2, bio),
                expertise = COALESCE($3, expertise),
                years_of_experience = COALESCE($4, years_of_experience),
                is_available = COALESCE($5, is_available),
                max_mentees = COALESCE($6, max_mentees),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&req.bio)
        .bind(&req.expertise)
        .bind(req.years_of_experience)
        .bind(req.is_available)
        .bind(req.max_mentees)
        .execute(tx.conn()?)
        .await?;

        if let Some(skill_ids) = &req.skill_ids {
            replace_skills(tx.conn()?, "mentor_skill", "mentor_id", id.0, skill_ids).await?;
        }

        let profile = Self::fetch_mentor(&mut tx, id).await?;
        tx.commit().await?;

        Ok(profile)
    }

    /// Requests the caller sent as mentee or received as mentor.
    #[instrument(skip(self))]
    pub async fn requests(&self, caller: AccountId) -> SqlxResult<Vec<MentorshipRequest>> {
        sqlx::query_as::<_, MentorshipRequest>(&format!(
            r#"
            SELECT {} FROM mentorship_request
            WHERE mentee_id = $1
                OR mentor_id IN (SELECT id FROM mentor_profile WHERE account_id = $1)
            ORDER BY created_at DESC
            "#,
            sql_fragment::REQUEST_FIELDS
        ))
        .bind(caller)
        .fetch_all(self.pool)
        .await
    }

    #[instrument(skip(self))]
    pub async fn request(
        &self,
        caller: AccountId,
        id: MentorshipRequestId,
    ) -> PgResult<MentorshipRequest> {
        let request = sqlx::query_as::<_, MentorshipRequest>(&format!(
            "SELECT {} FROM mentorship_request WHERE id = $1",
            sql_fragment::REQUEST_FIELDS
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .filter(|r| r.mentee_id == caller || r.mentor_account_id == caller);

        request.ok_or_else(|| {
            DomainError::not_found(format!("Mentorship request {id} not found.")).into()
        })
    }

    #[instrument(skip(self, req))]
    pub async fn create_request(
        &self,
        caller: AccountId,
        req: &CreateMentorshipRequest,
    ) -> PgResult<MentorshipRequest> {
        if req.message.trim().is_empty() {
            return Err(DomainError::validation("A message is required.").into());
        }

        let mut tx = Tx::begin(self.pool).await?;

        let (mentor_account, is_available) = sqlx::query_as::<_, (AccountId, bool)>(
            "SELECT account_id, is_available FROM mentor_profile WHERE id = $1",
        )
        .bind(req.mentor_id)
        .fetch_optional(tx.conn()?)
        .await?
        .ok_or_else(|| DomainError::validation("Mentor profile not found."))?;

        if mentor_account == caller {
            return Err(DomainError::validation(
                "You cannot request mentorship from yourself.",
            )
            .into());
        }
        if !is_available {
            return Err(DomainError::conflict("This mentor is not accepting requests.").into());
        }

        let id = sqlx::query_scalar::<_, MentorshipRequestId>(
            r#"
            INSERT INTO mentorship_request (mentee_id, mentor_id, message, status)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(caller)
        .bind(req.mentor_id)
        .bind(req.message.trim())
        .bind(RequestStatus::Pending.as_str())
        .fetch_one(tx.conn()?)
        .await?;

        let skill_ids: Vec<i64> = req.skill_ids.iter().map(|s| s.0).collect();
        replace_skills(tx.conn()?, "mentorship_request_skill", "request_id", id.0, &skill_ids)
            .await?;

        let request = Self::fetch_request(&mut tx, id).await?;
        tx.commit().await?;

        tracing::info!(mentee = %caller, mentor = %req.mentor_id, request = %id, "mentorship requested");
        Ok(request)
    }

    async fn fetch_request(tx: &mut Tx, id: MentorshipRequestId) -> SqlxResult<MentorshipRequest> {
        sqlx::query_as::<_, MentorshipRequest>(&format!(
            "SELECT {} FROM mentorship_request WHERE id = $1",
            sql_fragment::REQUEST_FIELDS
        ))
        .bind(id)
        .fetch_one(tx.conn()?)
        .await
    }

    /// Locks the request, runs the state machine for `action` on the caller's behalf and stores
    /// the new status.
    async fn transition_request(
        tx: &mut Tx,
        caller: AccountId,
        id: MentorshipRequestId,
        action: RequestAction,
    ) -> PgResult<MentorshipRequest> {
        let request = sqlx::query_as::<_, MentorshipRequest>(&format!(
            "SELECT {} FROM mentorship_request WHERE id = $1 FOR UPDATE",
            sql_fragment::REQUEST_FIELDS
        ))
        .bind(id)
        .fetch_optional(tx.conn()?)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("Mentorship request {id} not found.")))?;

        let party = if request.mentor_account_id == caller {
            Party::Mentor
        } else if request.mentee_id == caller {
            Party::Mentee
        } else {
            Party::Outsider
        };

        let next = request.status.transition(action, party)?;

        sqlx::query("UPDATE mentorship_request SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(next.as_str())
            .execute(tx.conn()?)
            .await?;

        tracing::info!(request = %id, from = %request.status, to = %next, "mentorship request transitioned");
        Ok(MentorshipRequest {
            status: next,
            ..request
        })
    }

    /// Accepts a pending request and opens the mentorship it asked for.
    #[instrument(skip(self))]
    pub async fn accept(&self, caller: AccountId, id: MentorshipRequestId) -> PgResult<Mentorship> {
        let mut tx = Tx::begin(self.pool).await?;
        let request = Self::transition_request(&mut tx, caller, id, RequestAction::Accept).await?;

        let max_mentees = sqlx::query_scalar::<_, i64>(
            "SELECT max_mentees FROM mentor_profile WHERE id = $1 FOR UPDATE",
        )
        .bind(request.mentor_id)
        .fetch_one(tx.conn()?)
        .await?;

        let active = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM mentorship WHERE mentor_id = $1 AND status = $2",
        )
        .bind(request.mentor_id)
        .bind(MentorshipStatus::Active.as_str())
        .fetch_one(tx.conn()?)
        .await?;

        check_capacity(active, max_mentees)?;

        let result = sqlx::query_scalar::<_, MentorshipId>(
            r#"
            INSERT INTO mentorship (mentee_id, mentor_id, goals, status, start_date)
            VALUES ($1, $2, $3, $4, CURRENT_DATE)
            RETURNING id
            "#,
        )
        .bind(request.mentee_id)
        .bind(request.mentor_id)
        .bind(&request.message)
        .bind(MentorshipStatus::Active.as_str())
        .fetch_one(tx.conn()?)
        .await
        .map_err(PgError::from);

        let mentorship_id = match result {
            Ok(id) => id,
            Err(e) if e.is_unique_violation() => {
                return Err(DomainError::conflict(
                    "A mentorship between this mentor and mentee already exists.",
                )
                .into());
            }
            Err(e) => return Err(e),
        };

        replace_skills(
            tx.conn()?,
            "mentorship_skill",
            "mentorship_id",
            mentorship_id.0,
            &request.skill_ids,
        )
        .await?;

        let mentorship = Self::fetch_mentorship(&mut tx, mentorship_id).await?;
        tx.commit().await?;

        tracing::info!(mentorship = %mentorship_id, request = %id, "mentorship started");
        Ok(mentorship)
    }

    /// Rejects (mentor) or cancels (mentee) a pending request.
    #[instrument(skip(self))]
    pub async fn close_request(
        &self,
        caller: AccountId,
        id: MentorshipRequestId,
        action: RequestAction,
    ) -> PgResult<MentorshipRequest> {
        let mut tx = Tx::begin(self.pool).await?;
        let request = Self::transition_request(&mut tx, caller, id, action).await?;
        tx.commit().await?;

        Ok(request)
    }

    async fn fetch_mentorship(tx: &mut Tx, id: MentorshipId) -> SqlxResult<Mentorship> {
        sqlx::query_as::<_, Mentorship>(&format!(
            "SELECT {} FROM mentorship WHERE id = $1",
            sql_fragment::MENTORSHIP_FIELDS
        ))
        .bind(id)
        .fetch_one(tx.conn()?)
        .await
    }

    #[instrument(skip(self))]
    pub async fn mentorships(&self, caller: AccountId) -> SqlxResult<Vec<Mentorship>> {
        sqlx::query_as::<_, Mentorship>(&format!(
            r#"
            SELECT {} FROM mentorship
            WHERE mentee_id = $1
                OR mentor_id IN (SELECT id FROM mentor_profile WHERE account_id = $1)
            ORDER BY created_at DESC
            "#,
            sql_fragment::MENTORSHIP_FIELDS
        ))
        .bind(caller)
        .fetch_all(self.pool)
        .await
    }

    #[instrument(skip(self))]
    pub async fn mentorship(&self, caller: AccountId, id: MentorshipId) -> PgResult<Mentorship> {
        sqlx::query_as::<_, Mentorship>(&format!(
            "SELECT {} FROM mentorship WHERE id = $1",
            sql_fragment::MENTORSHIP_FIELDS
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .filter(|m| m.is_participant(caller))
        .ok_or_else(|| DomainError::not_found(format!("Mentorship {id} not found.")).into())
    }

    /// Loads a mentorship for a participant-only operation.
    async fn participant_mentorship(
        tx: &mut Tx,
        caller: AccountId,
        id: MentorshipId,
        lock: bool,
    ) -> PgResult<Mentorship> {
        let mentorship = sqlx::query_as::<_, Mentorship>(&format!(
            "SELECT {} FROM mentorship WHERE id = $1 {}",
            sql_fragment::MENTORSHIP_FIELDS,
            if lock { "FOR UPDATE" } else { "" }
        ))
        .bind(id)
        .fetch_optional(tx.conn()?)
        .await?
        .ok_or_else(|| DomainError::not_found("Mentorship not found."))?;

        if !mentorship.is_participant(caller) {
            return Err(DomainError::forbidden("You are not part of this mentorship.").into());
        }

        Ok(mentorship)
    }

    #[instrument(skip(self))]
    pub async fn change_status(
        &self,
        caller: AccountId,
        id: MentorshipId,
        change: &MentorshipStatusChange,
    ) -> PgResult<Mentorship> {
        let mut tx = Tx::begin(self.pool).await?;
        let mentorship = Self::participant_mentorship(&mut tx, caller, id, true).await?;
        let next = mentorship.status.transition(change.status)?;

        sqlx::query(
            r#"
            UPDATE mentorship SET
                status = $2,
                end_date = CASE WHEN $3 THEN CURRENT_DATE ELSE end_date END,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(next.as_str())
        .bind(next.is_terminal())
        .execute(tx.conn()?)
        .await?;

        let mentorship = Self::fetch_mentorship(&mut tx, id).await?;
        tx.commit().await?;

        Ok(mentorship)
    }

    #[instrument(skip(self))]
    pub async fn reviews(&self, caller: AccountId) -> SqlxResult<Vec<MentorReview>> {
        sqlx::query_as::<_, MentorReview>(&format!(
            r#"
            SELECT {} FROM mentor_review
            WHERE mentorship_id IN (SELECT id FROM mentorship WHERE mentee_id = $1)
            ORDER BY created_at DESC
            "#,
            sql_fragment::REVIEW_FIELDS
        ))
        .bind(caller)
        .fetch_all(self.pool)
        .await
    }

    /// Stores the mentee's review and recomputes the mentor's rating under a lock on the mentor
    /// profile.
    #[instrument(skip(self, req))]
    pub async fn create_review(
        &self,
        caller: AccountId,
        req: &CreateMentorReview,
    ) -> PgResult<MentorReview> {
        let rating = Rating::new(req.rating)?;
        let mut tx = Tx::begin(self.pool).await?;

        let (mentee, mentor) = sqlx::query_as::<_, (AccountId, MentorId)>(
            "SELECT mentee_id, mentor_id FROM mentorship WHERE id = $1",
        )
        .bind(req.mentorship_id)
        .fetch_optional(tx.conn()?)
        .await?
        .ok_or_else(|| DomainError::not_found("Mentorship not found."))?;

        if mentee != caller {
            return Err(DomainError::forbidden("Only the mentee can review this mentorship.").into());
        }

        sqlx::query("SELECT id FROM mentor_profile WHERE id = $1 FOR UPDATE")
            .bind(mentor)
            .execute(tx.conn()?)
            .await?;

        let result = sqlx::query_as::<_, MentorReview>(&format!(
            r#"
            INSERT INTO mentor_review (mentorship_id, rating, review)
            VALUES ($1, $2, $3)
            RETURNING {}
            "#,
            sql_fragment::REVIEW_FIELDS
        ))
        .bind(req.mentorship_id)
        .bind(rating.get())
        .bind(&req.review)
        .fetch_one(tx.conn()?)
        .await
        .map_err(PgError::from);

        let review = match result {
            Ok(review) => review,
            Err(e) if e.is_unique_violation() => {
                return Err(DomainError::conflict(
                    "You have already reviewed this mentorship.",
                )
                .into());
            }
            Err(e) => return Err(e),
        };

        let ratings = sqlx::query_scalar::<_, i16>(
            r#"
            SELECT r.rating FROM mentor_review r
            JOIN mentorship m ON m.id = r.mentorship_id
            WHERE m.mentor_id = $1
            "#,
        )
        .bind(mentor)
        .fetch_all(tx.conn()?)
        .await?
        .into_iter()
        .filter_map(|r| Rating::new(i64::from(r)).ok())
        .collect::<Vec<_>>();
        let average = recompute_average(&ratings);

        sqlx::query(
            r#"
            UPDATE mentor_profile
            SET rating = $2::NUMERIC / 100, review_count = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(mentor)
        .bind(average.hundredths())
        .bind(ratings.len() as i64)
        .execute(tx.conn()?)
        .await?;

        tx.commit().await?;
        tracing::debug!(%mentor, %average, "mentor reviewed");

        Ok(review)
    }

    #[instrument(skip(self))]
    pub async fn messages(
        &self,
        caller: AccountId,
        id: MentorshipId,
    ) -> PgResult<Vec<MentorshipMessage>> {
        let mut tx = Tx::begin(self.pool).await?;
        Self::participant_mentorship(&mut tx, caller, id, false).await?;

        let messages = sqlx::query_as::<_, MentorshipMessage>(&format!(
            "SELECT {} FROM mentorship_message WHERE mentorship_id = $1 ORDER BY created_at, id",
            sql_fragment::MENTORSHIP_MESSAGE_FIELDS
        ))
        .bind(id)
        .fetch_all(tx.conn()?)
        .await?;

        tx.commit().await?;
        Ok(messages)
    }

    #[instrument(skip(self, req))]
    pub async fn send_message(
        &self,
        caller: AccountId,
        id: MentorshipId,
        req: &CreateMessage,
    ) -> PgResult<MentorshipMessage> {
        if req.content.trim().is_empty() {
            return Err(DomainError::validation("Message content is required.").into());
        }

        let mut tx = Tx::begin(self.pool).await?;
        Self::participant_mentorship(&mut tx, caller, id, false).await?;

        let message = sqlx::query_as::<_, MentorshipMessage>(&format!(
            r#"
            INSERT INTO mentorship_message (mentorship_id, sender_id, content)
            VALUES ($1, $2, $3)
            RETURNING {}
            "#,
            sql_fragment::MENTORSHIP_MESSAGE_FIELDS
        ))
        .bind(id)
        .bind(caller)
        .bind(&req.content)
        .fetch_one(tx.conn()?)
        .await?;

        tx.commit().await?;
        Ok(message)
    }

    /// Marks the other participant's unread messages read. Returns how many changed.
    #[instrument(skip(self))]
    pub async fn mark_read(&self, caller: AccountId, id: MentorshipId) -> PgResult<u64> {
        let mut tx = Tx::begin(self.pool).await?;
        Self::participant_mentorship(&mut tx, caller, id, false).await?;

        let marked = sqlx::query(
            r#"
            UPDATE mentorship_message SET is_read = TRUE
            WHERE mentorship_id = $1 AND sender_id <> $2 AND NOT is_read
            "#,
        )
        .bind(id)
        .bind(caller)
        .execute(tx.conn()?)
        .await?
        .rows_affected();

        tx.commit().await?;
        Ok(marked)
    }
}

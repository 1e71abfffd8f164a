use sqlx::{Pool, Postgres, Result as SqlxResult};
use tracing::instrument;

use super::sql_fragment;
use crate::db::models::account::{AccountRow, UpdateAccount};
use crate::db::models::{AccountId, Pagination};
use crate::db::repositories::Repository;
use crate::db::{PgError, PgResult};
use crate::domain::DomainError;

#[derive(Debug)]
pub struct AccountRepository {
    pool: &'static Pool<Postgres>,
}

/// Validated registration input; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
}

#[async_trait::async_trait]
impl Repository for AccountRepository {
    type Ident = AccountId;
    type Output = AccountRow;

    const BASE_FIELDS: &'static str = sql_fragment::ACCOUNT_FIELDS;
    const TABLE_NAME: &'static str = "account";
    const ENTITY: &'static str = "Account";

    #[instrument(skip(pool))]
    fn new(pool: &'static Pool<Postgres>) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    fn pool(&self) -> &'static Pool<Postgres> {
        self.pool
    }
}

impl AccountRepository {
    #[instrument(skip(self, account), fields(username = %account.username))]
    pub async fn insert(&self, account: NewAccount) -> PgResult<AccountRow> {
        let result = sqlx::query_as::<_, AccountRow>(&format!(
            r#"
            INSERT INTO account (username, email, password_hash, first_name, last_name)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            Self::BASE_FIELDS
        ))
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .fetch_one(self.pool)
        .await
        .map_err(PgError::from);

        match result {
            Ok(row) => {
                tracing::info!(account = %row.id, "account registered");
                Ok(row)
            }
            Err(e) if e.is_unique_violation() => Err(DomainError::conflict(
                "A user with that username or email already exists.",
            )
            .into()),
            Err(e) => {
                tracing::error!(error = ?e, "failure during account insertion");
                Err(e)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn get_by_email(&self, email: &str) -> SqlxResult<Option<AccountRow>> {
        sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {} FROM account WHERE LOWER(email) = LOWER($1)",
            Self::BASE_FIELDS
        ))
        .bind(email)
        .fetch_optional(self.pool)
        .await
    }

    /// Applies a self-service edit. Fields left `None` keep their stored value.
    #[instrument(skip(self, update))]
    pub async fn update(&self, id: AccountId, update: &UpdateAccount) -> PgResult<AccountRow> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r#"
            UPDATE account SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                bio = COALESCE($4, bio),
                avatar = COALESCE($5, avatar),
                date_of_birth = COALESCE($6, date_of_birth),
                education_level = COALESCE($7, education_level),
                field_of_study = COALESCE($8, field_of_study),
                career_goals = COALESCE($9, career_goals),
                is_mentor = COALESCE($10, is_mentor),
                is_mentee = COALESCE($11, is_mentee),
                receive_notifications = COALESCE($12, receive_notifications),
                public_profile = COALESCE($13, public_profile),
                linkedin_profile = COALESCE($14, linkedin_profile),
                github_profile = COALESCE($15, github_profile),
                personal_website = COALESCE($16, personal_website),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            Self::BASE_FIELDS
        ))
        .bind(id)
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(&update.bio)
        .bind(&update.avatar)
        .bind(update.date_of_birth)
        .bind(&update.education_level)
        .bind(&update.field_of_study)
        .bind(&update.career_goals)
        .bind(update.is_mentor)
        .bind(update.is_mentee)
        .bind(update.receive_notifications)
        .bind(update.public_profile)
        .bind(&update.linkedin_profile)
        .bind(&update.github_profile)
        .bind(&update.personal_website)
        .fetch_optional(self.pool)
        .await?;

        row.ok_or_else(|| DomainError::not_found(format!("Account {id} not found.")).into())
    }

    #[instrument(skip(self, password_hash))]
    pub async fn set_password(&self, id: AccountId, password_hash: &str) -> SqlxResult<()> {
        sqlx::query("UPDATE account SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(self.pool)
            .await?;

        tracing::info!(account = %id, "password changed");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list(&self, pagination: &Pagination) -> SqlxResult<(Vec<AccountRow>, i64)> {
        let rows = self.get_page(pagination.limit(), pagination.offset()).await?;
        let total = self.count().await?;

        Ok((rows, total))
    }
}

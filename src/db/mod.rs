use std::sync::LazyLock;

use sqlx::PgPool;
use sqlx::migrate::MigrateError;
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::domain::DomainError;
use crate::util::env;
use crate::util::env::Var;
use crate::var;

pub mod models;
pub mod repositories;

#[cfg(test)]
pub(crate) mod test_util;

pub mod prelude {
    pub use crate::db::db_pool;
    pub use crate::db::PgError;

    pub use crate::db::models::{PaginatedResponse, Pagination};

    pub use crate::db::repositories::Repository; // + trait to provide base methods
    pub use crate::db::repositories::account::AccountRepository;
    pub use crate::db::repositories::forum::{ForumRepository, StudyGroupRepository};
    pub use crate::db::repositories::gamification::GamificationRepository;
    pub use crate::db::repositories::job::JobRepository;
    pub use crate::db::repositories::learning_path::LearningPathRepository;
    pub use crate::db::repositories::mentorship::MentorshipRepository;
    pub use crate::db::repositories::progress::ProgressRepository;
    pub use crate::db::repositories::resource::ResourceRepository;
}

static DB_POOL: LazyLock<OnceCell<Db>> = LazyLock::new(OnceCell::new);
pub async fn db_pool() -> PgResult<&'static PgPool> {
    Ok(&DB_POOL
        .get_or_try_init(|| async { Db::new_pool().await })
        .await?
        .pool)
}

struct Db {
    pool: PgPool,
}

impl Db {
    pub async fn new_pool() -> PgResult<Self> {
        let db_url = var!(Var::DatabaseUrl).await?;
        let pool = sqlx::PgPool::connect(db_url).await?;

        Ok(Self { pool })
    }
}

/// Applies the embedded migrations under `migrations/`.
pub async fn migrate(pool: &PgPool) -> PgResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("database migrations applied");

    Ok(())
}

pub type PgResult<T> = core::result::Result<T, PgError>;

#[allow(clippy::enum_variant_names)]
#[derive(Debug, Error)]
pub enum PgError {
    #[error(transparent)]
    SqlxError(#[from] sqlx::Error),

    #[error(transparent)]
    MigrateError(#[from] MigrateError),

    #[error("{0}")]
    EnvError(#[from] env::EnvErr),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl PgError {
    /// True for PostgreSQL `23505`.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            PgError::SqlxError(err) => err
                .as_database_error()
                .is_some_and(|db| db.is_unique_violation()),
            _ => false,
        }
    }

    /// True for PostgreSQL `23503`, a reference to a row that does not exist.
    pub fn is_foreign_key_violation(&self) -> bool {
        match self {
            PgError::SqlxError(err) => err
                .as_database_error()
                .is_some_and(|db| db.is_foreign_key_violation()),
            _ => false,
        }
    }
}

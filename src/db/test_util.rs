//! Fixtures for tests that run against a live PostgreSQL at `DATABASE_URL`.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::db::models::{AccountId, CategoryId};
use crate::db::repositories::Repository;
use crate::db::repositories::account::{AccountRepository, NewAccount};

/// Connects and applies migrations. One pool per test; a pool cannot outlive its runtime.
pub async fn test_pool() -> &'static PgPool {
    _ = dotenvy::dotenv();
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for database tests");

    let pool = PgPoolOptions::new()
        .max_connections(32)
        .connect(&url)
        .await
        .unwrap();
    crate::db::migrate(&pool).await.unwrap();

    Box::leak(Box::new(pool))
}

pub fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4().simple())
}

pub trait TestAccount {
    fn generate_test_account() -> NewAccount {
        let username = unique("learner");

        NewAccount {
            email: format!("{username}@example.com"),
            username,
            password_hash: String::from("$argon2id$unused"),
            first_name: String::new(),
            last_name: String::new(),
        }
    }
}

impl TestAccount for NewAccount {}

pub async fn create_account(pool: &'static PgPool) -> AccountId {
    AccountRepository::new(pool)
        .insert(NewAccount::generate_test_account())
        .await
        .unwrap()
        .id
}

pub async fn create_category(pool: &'static PgPool) -> CategoryId {
    let name = unique("category");

    sqlx::query_scalar::<_, CategoryId>(
        "INSERT INTO category (name, slug) VALUES ($1, $1) RETURNING id",
    )
    .bind(&name)
    .fetch_one(pool)
    .await
    .unwrap()
}

use serde::Serialize;
use thiserror::Error;

use crate::db::models::AccountId;

pub mod jwt;
pub mod password;

pub type AuthResult<T> = core::result::Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    InvalidToken(String),

    #[error("token encoding failed: {0}")]
    Encode(#[from] jsonwebtoken::errors::Error),

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("{0}")]
    Config(String),
}

/// The caller behind a verified access token, inserted into request extensions by the bearer
/// middleware.
#[derive(Debug, Clone, Serialize)]
pub struct AuthUser {
    pub id: AccountId,
    pub email: String,
    pub is_staff: bool,
}

impl From<jwt::Claims> for AuthUser {
    fn from(claims: jwt::Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            is_staff: claims.is_staff,
        }
    }
}

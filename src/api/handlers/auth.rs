use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::api::server::{AppState, CreatedResult, JsonResult, RouteError};
use crate::auth::jwt::{TokenInput, TokenKind, TokenPair};
use crate::auth::password::{check_new_password, hash_password, verify_password};
use crate::db::models::account::{AccountDetail, RegisterAccount};
use crate::db::prelude::*;
use crate::db::repositories::account::NewAccount;
use crate::domain::{DomainError, DomainResult};

const BAD_CREDENTIALS: &str = "No active account found with the given credentials";
const MAX_USERNAME_LEN: usize = 150;

#[derive(Deserialize)]
pub struct TokenRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Serialize)]
pub struct AccessToken {
    pub access: String,
}

/// Usernames follow the usual `letters, digits and @/./+/-/_` rule.
fn check_registration(req: &RegisterAccount) -> DomainResult<()> {
    let username = req.username.trim();
    if username.is_empty() || username.chars().count() > MAX_USERNAME_LEN {
        return Err(DomainError::validation(format!(
            "Username is required and may have at most {MAX_USERNAME_LEN} characters."
        )));
    }

    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
    {
        return Err(DomainError::validation(
            "Username may only contain letters, digits and @/./+/-/_ characters.",
        ));
    }

    let email = req.email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => (),
        _ => return Err(DomainError::validation("Enter a valid email address.")),
    }

    check_new_password(&req.password, &req.password2)
}

#[instrument(skip(state, req), fields(username = %req.username))]
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterAccount>,
) -> CreatedResult<AccountDetail> {
    check_registration(&req)?;
    let password_hash = hash_password(&req.password)?;

    let account = AccountRepository::new(state.db_pool)
        .insert(NewAccount {
            username: req.username.trim().to_string(),
            email: req.email.trim().to_lowercase(),
            password_hash,
            first_name: req.first_name,
            last_name: req.last_name,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(account.into_detail())))
}

#[instrument(skip(state, req))]
pub async fn token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TokenRequest>,
) -> JsonResult<TokenPair> {
    let account = AccountRepository::new(state.db_pool)
        .get_by_email(req.email.trim())
        .await?
        .ok_or_else(|| RouteError::unauthorized(BAD_CREDENTIALS))?;

    if !verify_password(&req.password, &account.password_hash)? {
        tracing::debug!(account = %account.id, "password mismatch");
        return Err(RouteError::unauthorized(BAD_CREDENTIALS));
    }

    let pair = state.jwt.issue_pair(&TokenInput {
        account_id: account.id,
        email: account.email,
        is_staff: account.is_staff,
    })?;

    Ok(Json(pair))
}

/// Exchanges a refresh token for a new access token. The account must still exist.
#[instrument(skip(state, req))]
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> JsonResult<AccessToken> {
    let claims = state.jwt.verify(&req.refresh, TokenKind::Refresh)?;

    let account = AccountRepository::new(state.db_pool)
        .get_by_id(claims.sub)
        .await?
        .ok_or_else(|| RouteError::unauthorized("User not found"))?;

    let access = state.jwt.generate(
        &TokenInput {
            account_id: account.id,
            email: account.email,
            is_staff: account.is_staff,
        },
        TokenKind::Access,
    )?;

    Ok(Json(AccessToken { access }))
}

#[cfg(test)]
mod test {
    use super::*;

    fn registration(username: &str, email: &str, password: &str) -> RegisterAccount {
        RegisterAccount {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            password2: password.into(),
            first_name: String::new(),
            last_name: String::new(),
        }
    }

    #[test]
    fn test_registration_accepts_valid_input() {
        assert!(check_registration(&registration("ada_l", "ada@example.com", "correct horse")).is_ok());
    }

    #[test]
    fn test_registration_rejects_bad_fields() {
        for req in [
            registration("", "ada@example.com", "correct horse"),
            registration("ada lovelace", "ada@example.com", "correct horse"),
            registration("ada", "not-an-email", "correct horse"),
            registration("ada", "ada@localhost", "correct horse"),
            registration("ada", "ada@example.com", "short"),
        ] {
            assert!(matches!(
                check_registration(&req),
                Err(DomainError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_registration_needs_matching_passwords() {
        let mut req = registration("ada", "ada@example.com", "correct horse");
        req.password2 = "battery staple".into();

        assert_eq!(
            check_registration(&req),
            Err(DomainError::validation("Password fields didn't match."))
        );
    }
}

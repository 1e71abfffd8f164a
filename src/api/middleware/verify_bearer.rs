use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use http::header::AUTHORIZATION;

use crate::api::server::{AppState, RouteError};
use crate::auth::AuthUser;
use crate::auth::jwt::{TokenKind, extract_token_from_header};

/// Requires a valid access token and hands the caller to handlers as an `AuthUser` extension.
pub async fn verify_bearer(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, RouteError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let token = extract_token_from_header(header).ok_or_else(|| {
        RouteError::unauthorized("Authentication credentials were not provided.")
    })?;

    let claims = state.jwt.verify(token, TokenKind::Access)?;
    tracing::debug!(account = %claims.sub, "bearer token verified");

    req.extensions_mut().insert(AuthUser::from(claims));
    Ok(next.run(req).await)
}

pub mod verify_bearer;

use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::request::Parts as ReqParts;
use http::{HeaderValue, Method};
use thiserror::Error;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::util::env::{EnvErr, Var};
use crate::var;

pub type MiddlewareResult<T> = core::result::Result<T, MiddlewareErr>;

#[derive(Debug, Error)]
pub enum MiddlewareErr {
    #[error(transparent)]
    EnvErr(#[from] EnvErr),
}

/// `CORS_ALLOW_ORIGINS` is either `*` or a domain suffix that allowed origins must end with.
pub async fn cors() -> MiddlewareResult<CorsLayer> {
    let cors_allowed = var!(Var::CorsAllowOrigins).await?;

    let allowed = if cors_allowed == "*" {
        AllowOrigin::any()
    } else {
        AllowOrigin::predicate(|org: &HeaderValue, _: &ReqParts| {
            org.as_bytes().ends_with(cors_allowed.as_bytes())
        })
    };

    Ok(CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_origin(allowed))
}

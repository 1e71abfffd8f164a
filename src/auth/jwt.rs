//! HS256 access and refresh tokens.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthError, AuthResult};
use crate::db::models::AccountId;
use crate::util::env::MIN_JWT_SECRET_LEN;

pub const REFRESH_TTL_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Account id
    pub sub: AccountId,
    pub email: String,
    pub is_staff: bool,
    pub kind: TokenKind,
    pub iat: u64,
    pub exp: u64,
}

/// What a token is minted for.
#[derive(Debug, Clone)]
pub struct TokenInput {
    pub account_id: AccountId,
    pub email: String,
    pub is_staff: bool,
}

impl From<&Claims> for TokenInput {
    fn from(claims: &Claims) -> Self {
        Self {
            account_id: claims.sub,
            email: claims.email.clone(),
            is_staff: claims.is_staff,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Clone)]
pub struct JwtValidator {
    secret: String,
    access_ttl_secs: u64,
}

impl core::fmt::Debug for JwtValidator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("JwtValidator")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .finish_non_exhaustive()
    }
}

impl JwtValidator {
    pub fn new(secret: impl Into<String>, access_ttl_secs: u64) -> AuthResult<Self> {
        let secret = secret.into();
        if secret.len() < MIN_JWT_SECRET_LEN {
            return Err(AuthError::Config(format!(
                "JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} characters"
            )));
        }

        Ok(Self {
            secret,
            access_ttl_secs,
        })
    }

    pub fn issue_pair(&self, input: &TokenInput) -> AuthResult<TokenPair> {
        Ok(TokenPair {
            access: self.generate(input, TokenKind::Access)?,
            refresh: self.generate(input, TokenKind::Refresh)?,
        })
    }

    pub fn generate(&self, input: &TokenInput, kind: TokenKind) -> AuthResult<String> {
        let now = unix_now()?;
        let ttl = match kind {
            TokenKind::Access => self.access_ttl_secs,
            TokenKind::Refresh => REFRESH_TTL_SECS,
        };

        let claims = Claims {
            sub: input.account_id,
            email: input.email.clone(),
            is_staff: input.is_staff,
            kind,
            iat: now,
            exp: now + ttl,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?)
    }

    /// Decodes `token` and requires it to be of `expected` kind.
    pub fn verify(&self, token: &str, expected: TokenKind) -> AuthResult<Claims> {
        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|err| {
            AuthError::InvalidToken(
                match err.kind() {
                    ErrorKind::ExpiredSignature => "Token expired",
                    ErrorKind::InvalidSignature => "Invalid signature",
                    _ => "Token is invalid",
                }
                .into(),
            )
        })?
        .claims;

        if claims.kind != expected {
            return Err(AuthError::InvalidToken("Token has wrong type".into()));
        }

        Ok(claims)
    }
}

fn unix_now() -> AuthResult<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| AuthError::Config(format!("system time error: {e}")))
}

/// Accepts only `Bearer <token>`.
pub fn extract_token_from_header(auth_header: Option<&str>) -> Option<&str> {
    let token = auth_header?.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod test {
    use super::*;

    fn validator() -> JwtValidator {
        JwtValidator::new("test-secret-that-is-at-least-32-characters-long", 3600).unwrap()
    }

    fn input() -> TokenInput {
        TokenInput {
            account_id: AccountId(42),
            email: "ada@example.com".into(),
            is_staff: false,
        }
    }

    #[test]
    fn test_pair_round_trips_with_kinds() {
        let v = validator();
        let pair = v.issue_pair(&input()).unwrap();

        let access = v.verify(&pair.access, TokenKind::Access).unwrap();
        assert_eq!(access.sub, AccountId(42));
        assert_eq!(access.email, "ada@example.com");
        assert_eq!(access.exp - access.iat, 3600);

        let refresh = v.verify(&pair.refresh, TokenKind::Refresh).unwrap();
        assert_eq!(refresh.exp - refresh.iat, REFRESH_TTL_SECS);
    }

    #[test]
    fn test_refresh_token_is_not_an_access_token() {
        let v = validator();
        let pair = v.issue_pair(&input()).unwrap();

        assert!(matches!(
            v.verify(&pair.refresh, TokenKind::Access),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let other =
            JwtValidator::new("different-secret-that-is-at-least-32-characters", 3600).unwrap();
        let token = validator().generate(&input(), TokenKind::Access).unwrap();

        assert!(matches!(
            other.verify(&token, TokenKind::Access),
            Err(AuthError::InvalidToken(_))
        ));
        assert!(validator().verify("garbage", TokenKind::Access).is_err());
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(matches!(
            JwtValidator::new("short", 3600),
            Err(AuthError::Config(_))
        ));
    }

    #[test]
    fn test_extract_token_from_header() {
        assert_eq!(extract_token_from_header(Some("Bearer abc123")), Some("abc123"));
        assert_eq!(extract_token_from_header(Some("Bearer ")), None);
        assert_eq!(extract_token_from_header(Some("Basic abc123")), None);
        assert_eq!(extract_token_from_header(Some("abc123")), None);
        assert_eq!(extract_token_from_header(None), None);
    }
}

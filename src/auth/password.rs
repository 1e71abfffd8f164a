//! Argon2id password hashing.

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};

use crate::auth::{AuthError, AuthResult};
use crate::domain::{DomainError, DomainResult};

pub const MIN_PASSWORD_LEN: usize = 8;

/// Returns the PHC string (algorithm, parameters and salt included).
pub fn hash_password(password: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> AuthResult<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| AuthError::Hash(e.to_string()))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub fn check_new_password(password: &str, confirmation: &str) -> DomainResult<()> {
    if password != confirmation {
        return Err(DomainError::validation("Password fields didn't match."));
    }

    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(DomainError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters."
        )));
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct-horse-battery").unwrap();

        assert!(hash.starts_with("$argon2id"));
        assert!(verify_password("correct-horse-battery", &hash).unwrap());
        assert!(!verify_password("wrong-horse", &hash).unwrap());
    }

    #[test]
    fn test_invalid_hash_format() {
        assert!(matches!(
            verify_password("whatever", "not-a-phc-string"),
            Err(AuthError::Hash(_))
        ));
    }

    #[test]
    fn test_new_password_rules() {
        assert!(check_new_password("longenough", "longenough").is_ok());
        assert!(matches!(
            check_new_password("longenough", "different1"),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            check_new_password("short", "short"),
            Err(DomainError::Validation(_))
        ));
    }
}

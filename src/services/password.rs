//! Password hashing
//!
//! Argon2id with the argon2 crate defaults and a random salt per hash.
//! Accounts created through social login get an unusable password that can
//! never verify.

use crate::models::UNUSABLE_PASSWORD_PREFIX;
use anyhow::{Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use uuid::Uuid;

/// Hash a password, returning the PHC string.
///
/// ```ignore
/// use authors::services::password::hash_password;
///
/// let hash = hash_password("secret123")?;
/// assert!(hash.starts_with("$argon2id$"));
/// ```
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))
        .context("Password hashing failed")?;

    Ok(password_hash.to_string())
}

/// Verify a password against a stored hash.
///
/// Unusable passwords never match. Any other hash that fails to parse is an
/// error.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    if hash.starts_with(UNUSABLE_PASSWORD_PREFIX) {
        return Ok(false);
    }

    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))
        .context("Failed to parse password hash")?;

    let argon2 = Argon2::default();

    match argon2.verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("Password verification failed: {}", e))
            .context("Password verification error"),
    }
}

/// A stored password value that no input can match
pub fn unusable_password() -> String {
    format!("{}{}", UNUSABLE_PASSWORD_PREFIX, Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_produces_argon2id_hash() {
        let hash = hash_password("reader2024").expect("Failed to hash password");
        assert!(hash.starts_with("$argon2id$"));
    }

    #[test]
    fn test_hash_password_salts_each_hash() {
        let hash1 = hash_password("same_password1").unwrap();
        let hash2 = hash_password("same_password1").unwrap();
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("correct1password").unwrap();
        assert!(verify_password("correct1password", &hash).unwrap());
        assert!(!verify_password("wrong1password", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_invalid_hash() {
        assert!(verify_password("password", "invalid_hash_format").is_err());
    }

    #[test]
    fn test_unusable_password_never_verifies() {
        let stored = unusable_password();
        assert!(stored.starts_with(UNUSABLE_PASSWORD_PREFIX));
        assert!(!verify_password("", &stored).unwrap());
        assert!(!verify_password(&stored, &stored).unwrap());
        assert_ne!(stored, unusable_password());
    }

    #[test]
    fn test_hash_password_unicode() {
        let password = "пароль2024🔐";
        let hash = hash_password(password).unwrap();
        assert!(verify_password(password, &hash).unwrap());
    }
}

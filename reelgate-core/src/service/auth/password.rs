use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};
use tokio::task;

use crate::{Error, Result};

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Well-formed hash with the same cost as [`hash_password`] that no password matches.
/// Verified against when a login names an unknown user.
pub const DUMMY_PASSWORD_HASH: &str =
    "$argon2id$v=19$m=65536,t=3,p=4$c29tZXNhbHRzb21lc2FsdA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// Reject passwords outside the accepted length range
pub fn check_password_policy(password: &str) -> Result<()> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LENGTH {
        return Err(Error::InvalidInput(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if len > MAX_PASSWORD_LENGTH {
        return Err(Error::InvalidInput(format!(
            "Password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password with Argon2id (64 MiB, t=3, p=4) on a blocking thread
pub async fn hash_password(password: &str) -> Result<String> {
    let password = password.to_string();

    task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);

        let params = ParamsBuilder::new()
            .m_cost(65536)
            .t_cost(3)
            .p_cost(4)
            .output_len(32)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build Argon2 params: {e}")))?;

        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);
        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| Error::Internal(format!("Failed to hash password: {e}")))?
            .to_string();

        Ok(password_hash)
    })
    .await
    .map_err(|e| Error::Internal(format!("Password hashing task failed: {e}")))?
}

/// Verify a password against a stored PHC hash.
///
/// Parameters are read from the hash itself, so hashes made with older
/// settings keep verifying.
pub async fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let password = password.to_string();
    let hash = hash.to_string();

    task::spawn_blocking(move || {
        let parsed_hash = PasswordHash::new(&hash)
            .map_err(|e| Error::Internal(format!("Invalid password hash format: {e}")))?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::Internal(format!("Password verification failed: {e}"))),
        }
    })
    .await
    .map_err(|e| Error::Internal(format!("Password verification task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_password() {
        let password = "test_password_123";
        let hash = hash_password(password).await.unwrap();

        // PHC format: $argon2id$v=19$m=65536,t=3,p=4$...
        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.len() > 50);
    }

    #[tokio::test]
    async fn test_verify_password_correct() {
        let password = "test_password_123";
        let hash = hash_password(password).await.unwrap();

        let is_valid = verify_password(password, &hash).await.unwrap();
        assert!(is_valid);
    }

    #[tokio::test]
    async fn test_verify_password_incorrect() {
        let password = "test_password_123";
        let hash = hash_password(password).await.unwrap();

        let is_valid = verify_password("wrong_password", &hash).await.unwrap();
        assert!(!is_valid);
    }

    #[tokio::test]
    async fn test_dummy_hash_matches_real_cost() {
        let real = hash_password("test_password_123").await.unwrap();
        let real = PasswordHash::new(&real).unwrap();
        let dummy = PasswordHash::new(DUMMY_PASSWORD_HASH).unwrap();

        assert_eq!(dummy.algorithm, real.algorithm);
        assert_eq!(dummy.params, real.params);
        assert!(!verify_password("test_password_123", DUMMY_PASSWORD_HASH).await.unwrap());
        assert!(!verify_password("", DUMMY_PASSWORD_HASH).await.unwrap());
    }

    #[test]
    fn test_password_policy() {
        assert!(check_password_policy("short").is_err());
        assert!(check_password_policy("exactly8").is_ok());
        assert!(check_password_policy(&"x".repeat(MAX_PASSWORD_LENGTH + 1)).is_err());
    }

    #[tokio::test]
    async fn test_garbage_hash_is_error() {
        assert!(verify_password("whatever", "not-a-phc-string").await.is_err());
    }

    #[tokio::test]
    async fn test_hash_uniqueness() {
        let password = "test_password_123";
        let hash1 = hash_password(password).await.unwrap();
        let hash2 = hash_password(password).await.unwrap();

        assert_ne!(hash1, hash2);

        assert!(verify_password(password, &hash1).await.unwrap());
        assert!(verify_password(password, &hash2).await.unwrap());
    }
}

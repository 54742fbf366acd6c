//! Safe-word hashing (Argon2id, PHC strings).

use std::sync::OnceLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use rand::rngs::OsRng;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("failed to hash secret")]
    Hash,

    #[error("stored credential is not a valid hash")]
    CorruptHash,
}

/// Hash a secret with a fresh random salt.
pub fn hash_secret(secret: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|_| CredentialError::Hash)
}

/// Verify a secret against a stored PHC hash.
pub fn verify_secret(secret: &str, hash: &str) -> Result<bool, CredentialError> {
    let parsed = PasswordHash::new(hash).map_err(|_| CredentialError::CorruptHash)?;
    Ok(Argon2::default()
        .verify_password(secret.as_bytes(), &parsed)
        .is_ok())
}

/// Spend the same work as a real verification, for unknown accounts.
pub fn verify_against_dummy(secret: &str) {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    let dummy = DUMMY.get_or_init(|| hash_secret("stockroom-dummy-secret").ok());
    if let Some(hash) = dummy {
        let _ = verify_secret(secret, hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_secret("open sesame").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_secret("open sesame", &hash).unwrap());
        assert!(!verify_secret("open sesamE", &hash).unwrap());
    }

    #[test]
    fn salts_differ() {
        assert_ne!(hash_secret("same").unwrap(), hash_secret("same").unwrap());
    }

    #[test]
    fn garbage_hash_is_reported() {
        assert_eq!(verify_secret("x", "plain"), Err(CredentialError::CorruptHash));
    }
}

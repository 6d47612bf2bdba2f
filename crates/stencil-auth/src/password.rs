//! Password hashing with Argon2id

use std::sync::OnceLock;

use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use tracing::warn;

use crate::error::AuthError;

/// Hash a password with a fresh random salt
///
/// Returns a PHC-format string carrying algorithm, parameters and salt, so
/// every output verifies on its own.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::PasswordHash(e.to_string()))
}

/// Verify a password against a stored hash
///
/// A stored hash that cannot be parsed verifies as `false`.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed = match PasswordHash::new(hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Stored password hash is malformed: {}", e);
            return false;
        }
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Verify against `stored`, or against a throwaway hash when there is none
///
/// Login runs this for unknown accounts too, so a missing user costs the
/// same Argon2 work as a wrong password.
pub fn verify_password_or_dummy(password: &str, stored: Option<&str>) -> bool {
    static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();

    match stored {
        Some(hash) => verify_password(password, hash),
        None => {
            let dummy = DUMMY_HASH.get_or_init(|| hash_password("stencil-dummy-password").ok());
            if let Some(hash) = dummy {
                let _ = verify_password(password, hash);
            }
            false
        }
    }
}

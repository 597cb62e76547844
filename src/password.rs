use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use std::sync::LazyLock;

use crate::error::{AppError, AppResult};

// Verified against when the account does not exist, so both login failures cost one Argon2 run.
static DUMMY_HASH: LazyLock<String> = LazyLock::new(|| {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(b"opensound-no-such-account", &salt)
        .map(|hash| hash.to_string())
        .unwrap_or_else(|e| {
            tracing::error!("dummy password hash could not be built: {}", e);
            String::new()
        })
});

/// The PHC string used in place of a missing account's hash.
pub fn dummy_hash() -> &'static str {
    DUMMY_HASH.as_str()
}

/// Hashes a plaintext password with Argon2id and a fresh random salt.
///
/// The work runs on the blocking pool so request tasks are not stalled.
pub async fn hash_password(plain: String) -> AppResult<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(plain.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
    })
    .await?
}

/// Checks a plaintext password against a stored PHC hash string.
///
/// With no stored hash the password is checked against `dummy_hash()` and the result is always
/// `false`. A stored hash that cannot be parsed counts as a mismatch (and is logged), so callers
/// only ever see "matches" or "does not match".
pub async fn verify_password(plain: String, stored_hash: Option<String>) -> AppResult<bool> {
    let matches = tokio::task::spawn_blocking(move || {
        let exists = stored_hash.is_some();
        let hash = stored_hash.unwrap_or_else(|| dummy_hash().to_string());
        let verified = match PasswordHash::new(&hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(plain.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                tracing::error!("stored password hash is unreadable: {}", e);
                false
            }
        };
        exists && verified
    })
    .await?;
    Ok(matches)
}

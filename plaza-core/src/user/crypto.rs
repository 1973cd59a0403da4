//! Password digest helpers.

use crate::error::{Result, ServiceError};
use bcrypt::{hash, verify};
use tracing::warn;

/// Hashes on a blocking thread; bcrypt is deliberately slow.
pub async fn hash_password(password: &str, cost: u32) -> Result<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash(&password, cost))
        .await
        .map_err(|e| ServiceError::Other(format!("spawn_blocking failed: {}", e)))?
        .map_err(|e| ServiceError::Other(format!("bcrypt hash failed: {}", e)))
}

/// Compares `password` against `digest`.
///
/// An empty digest never matches and is not handed to bcrypt. A digest bcrypt
/// cannot parse is treated as a mismatch.
pub fn password_matches(password: &str, digest: &str) -> bool {
    if digest.is_empty() {
        return false;
    }
    match verify(password, digest) {
        Ok(matches) => matches,
        Err(e) => {
            warn!(error = %e, "stored password digest is not a valid bcrypt hash");
            false
        }
    }
}

/// [`password_matches`] on a blocking thread.
pub async fn verify_password(password: &str, digest: &str) -> Result<bool> {
    if digest.is_empty() {
        return Ok(false);
    }
    let password = password.to_string();
    let digest = digest.to_string();
    tokio::task::spawn_blocking(move || password_matches(&password, &digest))
        .await
        .map_err(|e| ServiceError::Other(format!("spawn_blocking failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_digest_never_matches() {
        assert!(!password_matches("", ""));
        assert!(!password_matches("spaceship", ""));
    }

    #[test]
    fn garbage_digest_is_a_mismatch() {
        assert!(!password_matches("spaceship", "not-a-bcrypt-hash"));
    }

    #[tokio::test]
    async fn matches_only_the_original_password() {
        let digest = hash_password("spaceship", crate::user::MIN_HASH_COST).await.unwrap();
        assert!(verify_password("spaceship", &digest).await.unwrap());
        assert!(!verify_password("spaceshiP", &digest).await.unwrap());
        assert!(!verify_password("", &digest).await.unwrap());
    }
}

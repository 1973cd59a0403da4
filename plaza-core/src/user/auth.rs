//! Authentication: credential checks and JWT session tokens.

use super::crypto::verify_password;
use super::models::*;
use super::UserManager;
use crate::error::{Result, ServiceError};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use tracing::{info, instrument, warn};

impl UserManager {
    /// Returns the user whose email (case-insensitive) and password match.
    ///
    /// Unknown emails, empty digests and wrong passwords all come back as
    /// `None`; only storage faults are errors.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Option<User>> {
        let Some(user) = self.find_by_email(email).await? else {
            return Ok(None);
        };
        if user.password_digest.is_empty() {
            return Ok(None);
        }
        if verify_password(password, &user.password_digest).await? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    /// Checks credentials and opens a session.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        let Some(user) = self.authenticate(email, password).await? else {
            warn!(email = %email, "login failed");
            return Err(ServiceError::InvalidCredentials);
        };
        info!(user_id = user.id, "user logged in");
        self.issue_session(&user)
    }

    /// Revokes every session of the user by bumping its session version.
    #[instrument(skip(self))]
    pub async fn logout(&self, id: u64) -> Result<()> {
        self.store
            .modify(id, |user| {
                user.session_version = user.session_version.saturating_add(1);
                user.updated_at = Some(Utc::now());
            })
            .await?;
        info!(user_id = id, "user logged out");
        Ok(())
    }

    /// Signs a session token for `user`.
    pub fn issue_session(&self, user: &User) -> Result<Session> {
        let now = Utc::now();
        let exp = Duration::try_seconds(self.session_ttl)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                ServiceError::Other(format!("session ttl out of range: {}", self.session_ttl))
            })?;
        let claims = SessionClaims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            iss: Some(self.jwt_issuer.clone()),
            aud: Some(self.jwt_audience.clone()),
            session_version: user.session_version,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| ServiceError::Other(e.to_string()))?;

        Ok(Session {
            token,
            expires_in: self.session_ttl,
            user: user.clone().into(),
        })
    }

    /// Verifies a session token and resolves the acting identity from the
    /// current stored record.
    pub async fn verify_session(&self, token: &str) -> Result<Identity> {
        let mut validation = Validation::default();
        validation.set_audience(&[self.jwt_audience.clone()]);
        validation.set_issuer(&[self.jwt_issuer.clone()]);
        let token_data = decode::<SessionClaims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| ServiceError::Unauthorized(format!("invalid token: {}", e)))?;

        let claims = token_data.claims;
        let id: u64 = claims
            .sub
            .parse()
            .map_err(|_| ServiceError::Unauthorized("invalid subject".into()))?;
        let user = match self.store.get(id).await {
            Ok(user) => user,
            Err(ServiceError::NotFound(_)) => {
                return Err(ServiceError::Unauthorized("user no longer exists".into()))
            }
            Err(e) => return Err(e),
        };
        if claims.session_version != user.session_version {
            return Err(ServiceError::Unauthorized("session revoked".into()));
        }
        Ok(Identity::from(&user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup(dir: &TempDir) -> (UserManager, User) {
        let manager =
            UserManager::new(dir.path(), "test-secret".into()).with_hash_cost(crate::user::MIN_HASH_COST);
        let user = manager
            .register(RegisterRequest {
                name: "Example User".into(),
                email: "user@example.com".into(),
                password: "spaceship".into(),
                password_confirmation: "spaceship".into(),
            })
            .await
            .unwrap();
        (manager, user)
    }

    #[tokio::test]
    async fn authenticate_is_case_insensitive_on_email() {
        let dir = TempDir::new().unwrap();
        let (manager, user) = setup(&dir).await;
        let found = manager.authenticate("USER@Example.com", "spaceship").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));
    }

    #[tokio::test]
    async fn authenticate_rejects_wrong_password_and_unknown_email() {
        let dir = TempDir::new().unwrap();
        let (manager, _) = setup(&dir).await;
        assert!(manager.authenticate("user@example.com", "spaceshi").await.unwrap().is_none());
        assert!(manager.authenticate("nobody@example.com", "spaceship").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn authenticate_false_for_empty_digest() {
        let dir = TempDir::new().unwrap();
        let (manager, user) = setup(&dir).await;
        manager
            .store
            .modify(user.id, |u| u.password_digest.clear())
            .await
            .unwrap();
        for password in ["", "spaceship"] {
            assert!(manager.authenticate("user@example.com", password).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn login_errors_are_uniform() {
        let dir = TempDir::new().unwrap();
        let (manager, _) = setup(&dir).await;
        let wrong_password = manager.login("user@example.com", "nope-nope").await.unwrap_err();
        let wrong_email = manager.login("x@example.com", "spaceship").await.unwrap_err();
        assert_eq!(wrong_password.to_string(), wrong_email.to_string());
        assert!(matches!(wrong_password, ServiceError::InvalidCredentials));
    }

    #[tokio::test]
    async fn session_round_trip_and_logout_revokes() {
        let dir = TempDir::new().unwrap();
        let (manager, user) = setup(&dir).await;
        let session = manager.login("user@example.com", "spaceship").await.unwrap();
        let identity = manager.verify_session(&session.token).await.unwrap();
        assert_eq!(identity.id, user.id);
        assert!(!identity.admin);

        manager.logout(user.id).await.unwrap();
        let err = manager.verify_session(&session.token).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn session_reflects_current_admin_flag() {
        let dir = TempDir::new().unwrap();
        let (manager, user) = setup(&dir).await;
        let session = manager.issue_session(&user).unwrap();
        manager.set_admin(user.id, true).await.unwrap();
        assert!(manager.verify_session(&session.token).await.unwrap().admin);
    }

    #[tokio::test]
    async fn token_from_other_secret_rejected() {
        let dir = TempDir::new().unwrap();
        let (manager, user) = setup(&dir).await;
        let other = UserManager::new(dir.path(), "other-secret".into());
        let session = other.issue_session(&user).unwrap();
        assert!(manager.verify_session(&session.token).await.is_err());
    }

    #[tokio::test]
    async fn deleted_user_session_rejected() {
        let dir = TempDir::new().unwrap();
        let (manager, user) = setup(&dir).await;
        let session = manager.issue_session(&user).unwrap();
        manager.delete_user(user.id).await.unwrap();
        assert!(manager.verify_session(&session.token).await.is_err());
    }

    #[tokio::test]
    async fn oversized_session_ttl_is_an_error() {
        let dir = TempDir::new().unwrap();
        let (manager, user) = setup(&dir).await;
        let manager = manager.with_session_ttl(i64::MAX);
        let err = manager.issue_session(&user).unwrap_err();
        assert!(matches!(err, ServiceError::Other(_)));
    }
}

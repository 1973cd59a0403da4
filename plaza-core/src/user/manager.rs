//! User manager: core structure and account CRUD.

use super::crypto::hash_password;
use super::models::*;
use super::store::UserStore;
use super::validation::{normalize_email, validate_fields, Field, PasswordChange, Violations};
use crate::error::{Result, ServiceError};
use crate::pagination::{Page, DEFAULT_PER_PAGE};
use chrono::Utc;
use std::path::Path;
use tracing::{error, info, instrument};

const DEFAULT_JWT_ISSUER: &str = "plaza-api";
const DEFAULT_JWT_AUDIENCE: &str = "plaza-clients";

/// bcrypt cost used unless configured otherwise.
pub const DEFAULT_HASH_COST: u32 = bcrypt::DEFAULT_COST;
/// Cheapest cost bcrypt accepts; for tests and local development.
pub const MIN_HASH_COST: u32 = 4; // bcrypt::MIN_COST is private in bcrypt 0.16

#[derive(Debug, Clone)]
pub struct UserManager {
    pub(super) store: UserStore,
    /// JWT signing secret
    pub(super) jwt_secret: String,
    pub(super) jwt_issuer: String,
    pub(super) jwt_audience: String,
    /// Session token lifetime in seconds
    pub(super) session_ttl: i64,
    pub(super) hash_cost: u32,
    pub(super) per_page: usize,
}

// ============================================================================
// Construction and configuration
// ============================================================================

impl UserManager {
    pub fn new<P: AsRef<Path>>(data_dir: P, jwt_secret: String) -> Self {
        Self {
            store: UserStore::new(data_dir),
            jwt_secret,
            jwt_issuer: DEFAULT_JWT_ISSUER.to_string(),
            jwt_audience: DEFAULT_JWT_AUDIENCE.to_string(),
            session_ttl: 24 * 3600,
            hash_cost: DEFAULT_HASH_COST,
            per_page: DEFAULT_PER_PAGE,
        }
    }

    /// Sets JWT iss/aud.
    pub fn with_claims_context(
        mut self,
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> Self {
        self.jwt_issuer = issuer.into();
        self.jwt_audience = audience.into();
        self
    }

    pub fn with_session_ttl(mut self, seconds: i64) -> Self {
        self.session_ttl = seconds;
        self
    }

    /// bcrypt cost factor for new digests.
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    pub fn with_per_page(mut self, per_page: usize) -> Self {
        self.per_page = per_page;
        self
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        self.store.ensure_dirs()
    }
}

// ============================================================================
// Internal helpers
// ============================================================================

impl UserManager {
    /// Adds the uniqueness violation if `email` belongs to someone else.
    async fn check_email_unique(
        &self,
        email: &str,
        except: Option<u64>,
        violations: &mut Violations,
    ) -> Result<()> {
        if !violations.has(Field::Email) && self.store.email_taken(email, except).await? {
            violations.add(Field::Email, "has already been taken");
        }
        Ok(())
    }

    /// Maps a failed store write onto the violation set returned to the client.
    fn write_failure(err: ServiceError) -> ServiceError {
        match err {
            ServiceError::AlreadyExists(_) => {
                Violations::single(Field::Email, "has already been taken").into()
            }
            ServiceError::NotFound(_) => err,
            other => {
                error!(error = %other, "failed to write user record");
                Violations::single(Field::Base, "could not be saved").into()
            }
        }
    }
}

// ============================================================================
// Account CRUD
// ============================================================================

impl UserManager {
    /// Validates, hashes and persists a new account.
    #[instrument(skip(self, req))]
    pub async fn register(&self, req: RegisterRequest) -> Result<User> {
        let email = normalize_email(&req.email);
        let mut violations = validate_fields(
            &req.name,
            &email,
            Some(PasswordChange {
                password: &req.password,
                confirmation: &req.password_confirmation,
            }),
        );
        self.check_email_unique(&email, None, &mut violations).await?;
        violations.into_result()?;

        let password_digest = hash_password(&req.password, self.hash_cost).await?;
        let now = Utc::now();
        let user = User {
            id: 0,
            name: req.name,
            email,
            password_digest,
            admin: false,
            session_version: 0,
            created_at: Some(now),
            updated_at: Some(now),
        };
        let user = self.store.insert(user).await.map_err(Self::write_failure)?;

        info!(user_id = user.id, email = %user.email, "registered user");
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, id: u64) -> Result<User> {
        self.store.get(id).await
    }

    /// Case-insensitive lookup by email.
    #[instrument(skip(self))]
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.store.find_by_email(&normalize_email(email)).await
    }

    /// One page of users ordered by id.
    #[instrument(skip(self))]
    pub async fn list_users(&self, page: usize) -> Result<Page<UserSummary>> {
        let users = self.store.list().await?;
        Ok(Page::paginate(users, page, self.per_page).map(UserSummary::from))
    }

    /// Applies a profile update. Fields left out keep their value; a blank
    /// password keeps the current digest.
    #[instrument(skip(self, req))]
    pub async fn update_user(&self, id: u64, req: UpdateUserRequest) -> Result<User> {
        let current = self.store.get(id).await?;

        let name = req.name.clone().unwrap_or(current.name);
        let email = req
            .email
            .as_deref()
            .map(normalize_email)
            .unwrap_or(current.email);
        let new_password = req.password_being_set();
        let confirmation = req.password_confirmation.as_deref().unwrap_or_default();

        let mut violations = validate_fields(
            &name,
            &email,
            new_password.map(|password| PasswordChange {
                password,
                confirmation,
            }),
        );
        self.check_email_unique(&email, Some(id), &mut violations).await?;
        violations.into_result()?;

        // hashed before the store lock is taken
        let new_digest = match new_password {
            Some(password) => Some(hash_password(password, self.hash_cost).await?),
            None => None,
        };
        let user = self
            .store
            .modify(id, |user| {
                user.name = name;
                user.email = email;
                if let Some(digest) = new_digest {
                    user.password_digest = digest;
                }
                user.updated_at = Some(Utc::now());
            })
            .await
            .map_err(Self::write_failure)?;

        info!(user_id = id, "updated user");
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: u64) -> Result<()> {
        self.store.delete(id).await?;
        info!(user_id = id, "deleted user");
        Ok(())
    }

    /// Grants or revokes the admin flag.
    #[instrument(skip(self))]
    pub async fn set_admin(&self, id: u64, admin: bool) -> Result<User> {
        let user = self
            .store
            .modify(id, |user| {
                if user.admin != admin {
                    user.admin = admin;
                    user.updated_at = Some(Utc::now());
                }
            })
            .await?;
        info!(user_id = id, admin, "set admin flag");
        Ok(user)
    }

    /// Makes sure an admin account exists for `email`, registering it if absent
    /// and promoting it otherwise. Used to seed the first administrator.
    #[instrument(skip(self, password))]
    pub async fn ensure_admin(&self, name: &str, email: &str, password: &str) -> Result<User> {
        if let Some(existing) = self.find_by_email(email).await? {
            return self.set_admin(existing.id, true).await;
        }
        let user = self
            .register(RegisterRequest {
                name: name.to_string(),
                email: email.to_string(),
                password: password.to_string(),
                password_confirmation: password.to_string(),
            })
            .await?;
        self.set_admin(user.id, true).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> UserManager {
        UserManager::new(dir.path(), "test-secret".into()).with_hash_cost(crate::user::MIN_HASH_COST)
    }

    fn registration(name: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: name.into(),
            email: email.into(),
            password: password.into(),
            password_confirmation: password.into(),
        }
    }

    fn violations(err: ServiceError) -> Violations {
        match err {
            ServiceError::Validation(v) => v,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn register_stores_lowercase_email() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let user = manager
            .register(registration("Example User", "UsEr@eXAmPlE.coM", "spaceship"))
            .await
            .unwrap();
        assert_eq!(user.email, "user@example.com");
        let reloaded = manager.get_user(user.id).await.unwrap();
        assert_eq!(reloaded.email, "user@example.com");
        assert!(!reloaded.password_digest.is_empty());
        assert_ne!(reloaded.password_digest, "spaceship");
        assert!(!reloaded.admin);
    }

    #[tokio::test]
    async fn duplicate_email_differing_by_case_is_taken() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        manager
            .register(registration("Example User", "user@example.com", "spaceship"))
            .await
            .unwrap();
        let err = manager
            .register(registration("Example User", "USER@EXAMPLE.COM", "spaceship"))
            .await
            .unwrap_err();
        let v = violations(err);
        assert_eq!(v.by_field()["email"], vec!["has already been taken".to_string()]);
    }

    #[tokio::test]
    async fn register_reports_every_field() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let err = manager
            .register(RegisterRequest {
                name: " ".into(),
                email: "user@example,com".into(),
                password: "foo".into(),
                password_confirmation: "bar".into(),
            })
            .await
            .unwrap_err();
        let v = violations(err);
        for field in [Field::Name, Field::Email, Field::Password, Field::PasswordConfirmation] {
            assert!(v.has(field), "missing {field:?}");
        }
        assert!(manager.list_users(1).await.unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn update_keeps_digest_when_password_blank() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let user = manager
            .register(registration("Example User", "user@example.com", "spaceship"))
            .await
            .unwrap();
        let updated = manager
            .update_user(
                user.id,
                UpdateUserRequest {
                    name: Some("Foo Bar".into()),
                    email: Some("Foo@Bar.com".into()),
                    password: Some(String::new()),
                    password_confirmation: Some(String::new()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Foo Bar");
        assert_eq!(updated.email, "foo@bar.com");
        assert_eq!(updated.password_digest, user.password_digest);
    }

    #[tokio::test]
    async fn update_validates_new_password() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let user = manager
            .register(registration("Example User", "user@example.com", "spaceship"))
            .await
            .unwrap();
        let err = manager
            .update_user(
                user.id,
                UpdateUserRequest {
                    password: Some("foo".into()),
                    password_confirmation: Some("bar".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        let v = violations(err);
        assert!(v.has(Field::Password));
        assert!(v.has(Field::PasswordConfirmation));
    }

    #[tokio::test]
    async fn update_allows_own_email_but_not_others() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let a = manager
            .register(registration("A", "a@example.com", "spaceship"))
            .await
            .unwrap();
        manager
            .register(registration("B", "b@example.com", "spaceship"))
            .await
            .unwrap();

        let same = UpdateUserRequest {
            email: Some("A@EXAMPLE.COM".into()),
            ..Default::default()
        };
        manager.update_user(a.id, same).await.unwrap();

        let taken = UpdateUserRequest {
            email: Some("b@example.com".into()),
            ..Default::default()
        };
        let v = violations(manager.update_user(a.id, taken).await.unwrap_err());
        assert!(v.has(Field::Email));
    }

    #[tokio::test]
    async fn list_is_paginated_by_id() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir).with_per_page(2);
        for i in 0..5 {
            manager
                .register(registration("User", &format!("user{i}@example.com"), "spaceship"))
                .await
                .unwrap();
        }
        let page = manager.list_users(2).await.unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.total_pages, 3);
        let ids: Vec<u64> = page.items.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![3, 4]);
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let err = manager.delete_user(7).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn ensure_admin_registers_then_promotes() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let admin = manager
            .ensure_admin("Admin", "Admin@Example.com", "spaceship")
            .await
            .unwrap();
        assert!(admin.admin);
        let again = manager
            .ensure_admin("Admin", "admin@example.com", "ignored")
            .await
            .unwrap();
        assert_eq!(again.id, admin.id);
        assert_eq!(manager.list_users(1).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn password_change_keeps_concurrent_logout() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let user = manager
            .register(registration("Example User", "user@example.com", "spaceship"))
            .await
            .unwrap();
        let token = manager.issue_session(&user).unwrap().token;
        let id = user.id;

        // a real cost keeps the update busy hashing while the logout lands
        let manager = manager.with_hash_cost(10);
        let updating = {
            let manager = manager.clone();
            tokio::spawn(async move {
                manager
                    .update_user(
                        id,
                        UpdateUserRequest {
                            password: Some("new-spaceship".into()),
                            password_confirmation: Some("new-spaceship".into()),
                            ..Default::default()
                        },
                    )
                    .await
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        manager.logout(id).await.unwrap();
        updating.await.unwrap().unwrap();

        let stored = manager.get_user(id).await.unwrap();
        assert_eq!(stored.session_version, 1);
        assert!(manager.verify_session(&token).await.is_err());
        assert!(manager
            .authenticate("user@example.com", "new-spaceship")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn set_admin_and_logout_both_persist() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let user = manager
            .register(registration("Example User", "user@example.com", "spaceship"))
            .await
            .unwrap();
        let (promoted, logged_out) =
            tokio::join!(manager.set_admin(user.id, true), manager.logout(user.id));
        promoted.unwrap();
        logged_out.unwrap();
        let stored = manager.get_user(user.id).await.unwrap();
        assert!(stored.admin);
        assert_eq!(stored.session_version, 1);
    }

    #[tokio::test]
    async fn racing_registrations_report_email_taken() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let (first, second) = tokio::join!(
            manager.register(registration("First", "race@example.com", "spaceship")),
            manager.register(registration("Second", "RACE@example.com", "spaceship")),
        );
        let (won, lost) = match (first, second) {
            (Ok(user), Err(err)) | (Err(err), Ok(user)) => (user, err),
            other => panic!("expected one winner, got {other:?}"),
        };
        assert_eq!(won.email, "race@example.com");
        assert_eq!(
            violations(lost).by_field()["email"],
            vec!["has already been taken".to_string()]
        );
        assert_eq!(manager.list_users(1).await.unwrap().total, 1);
    }

    #[test]
    fn store_conflict_maps_to_email_taken() {
        let err = UserManager::write_failure(ServiceError::AlreadyExists("email: a@b.co".into()));
        assert_eq!(
            violations(err).by_field()["email"],
            vec!["has already been taken".to_string()]
        );
    }

    #[tokio::test]
    async fn failed_write_reports_could_not_be_saved() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        manager.ensure_dirs().unwrap();
        // occupy the index temp path so the index write fails
        std::fs::create_dir(dir.path().join("users").join("index.json.tmp")).unwrap();

        let err = manager
            .register(registration("Example User", "user@example.com", "spaceship"))
            .await
            .unwrap_err();
        assert_eq!(
            violations(err).by_field()["base"],
            vec!["could not be saved".to_string()]
        );
        assert!(manager.list_users(1).await.unwrap().items.is_empty());
    }
}

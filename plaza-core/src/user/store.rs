//! File-backed user table: one JSON file per user plus an email index.
//!
//! All writes go through one async mutex. The email index claim made inside
//! that critical section is the storage-level unique constraint on emails, so
//! two racing registrations for the same address cannot both persist. Only one
//! `UserStore` (and its clones) may own a data directory.

use super::models::User;
use crate::error::{Result, ServiceError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct UserIndex {
    /// Last id handed out; ids are never reused
    #[serde(default)]
    last_id: u64,
    /// Normalized email -> user id
    #[serde(default)]
    emails: BTreeMap<String, u64>,
}

#[derive(Debug, Clone)]
pub struct UserStore {
    dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl UserStore {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            dir: data_dir.as_ref().join("users"),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    fn user_path(&self, id: u64) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    async fn load_index(&self) -> Result<UserIndex> {
        match tokio::fs::read(self.index_path()).await {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(UserIndex::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes through a temp file so readers never see a half-written file.
    async fn write_atomic(path: &Path, data: Vec<u8>) -> Result<()> {
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn save_index(&self, index: &UserIndex) -> Result<()> {
        Self::write_atomic(&self.index_path(), serde_json::to_vec_pretty(index)?).await
    }

    async fn write_user(&self, user: &User) -> Result<()> {
        Self::write_atomic(&self.user_path(user.id), serde_json::to_vec_pretty(user)?).await
    }

    /// Persists a new user, assigning its id. Fails with `AlreadyExists` if the
    /// email is already claimed.
    pub async fn insert(&self, mut user: User) -> Result<User> {
        let _guard = self.write_lock.lock().await;
        self.ensure_dirs()?;
        let mut index = self.load_index().await?;
        if index.emails.contains_key(&user.email) {
            return Err(ServiceError::AlreadyExists(format!("email: {}", user.email)));
        }

        index.last_id += 1;
        user.id = index.last_id;
        self.write_user(&user).await?;
        index.emails.insert(user.email.clone(), user.id);
        if let Err(e) = self.save_index(&index).await {
            let _ = tokio::fs::remove_file(self.user_path(user.id)).await;
            return Err(e);
        }
        Ok(user)
    }

    /// Re-reads the user under the write lock, applies `apply` and persists the
    /// result. Fields the closure leaves alone keep whatever a concurrent writer
    /// stored last. Fails with `AlreadyExists` if the new email is claimed by
    /// another user.
    pub async fn modify<F>(&self, id: u64, apply: F) -> Result<User>
    where
        F: FnOnce(&mut User),
    {
        let _guard = self.write_lock.lock().await;
        let mut user = self.get(id).await?;
        let previous_email = user.email.clone();
        apply(&mut user);
        user.id = id;

        if user.email == previous_email {
            self.write_user(&user).await?;
            return Ok(user);
        }

        let previous = self.load_index().await?;
        if matches!(previous.emails.get(&user.email), Some(owner) if *owner != id) {
            return Err(ServiceError::AlreadyExists(format!("email: {}", user.email)));
        }
        let mut index = previous.clone();
        index.emails.retain(|_, uid| *uid != id);
        index.emails.insert(user.email.clone(), id);

        // claim first; the record only changes once the index agrees with it
        self.save_index(&index).await?;
        if let Err(e) = self.write_user(&user).await {
            self.restore_index(&previous).await;
            return Err(e);
        }
        Ok(user)
    }

    pub async fn delete(&self, id: u64) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.user_path(id);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(ServiceError::NotFound(format!("user: {}", id)));
        }
        let previous = self.load_index().await?;
        let mut index = previous.clone();
        index.emails.retain(|_, uid| *uid != id);
        self.save_index(&index).await?;
        if let Err(e) = tokio::fs::remove_file(&path).await {
            self.restore_index(&previous).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn restore_index(&self, previous: &UserIndex) {
        if let Err(e) = self.save_index(previous).await {
            warn!(error = %e, "failed to restore user index");
        }
    }

    pub async fn get(&self, id: u64) -> Result<User> {
        match tokio::fs::read(self.user_path(id)).await {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ServiceError::NotFound(format!("user: {}", id)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Looks up by an already-normalized email.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let index = self.load_index().await?;
        let Some(id) = index.emails.get(email) else {
            return Ok(None);
        };
        match self.get(*id).await {
            Ok(user) => Ok(Some(user)),
            Err(ServiceError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Whether `email` (normalized) belongs to a user other than `except`.
    pub async fn email_taken(&self, email: &str, except: Option<u64>) -> Result<bool> {
        let index = self.load_index().await?;
        Ok(matches!(index.emails.get(email), Some(id) if Some(*id) != except))
    }

    /// All users ordered by ascending id.
    pub async fn list(&self) -> Result<Vec<User>> {
        let mut users = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(users),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_user_file = path.extension().map(|e| e == "json").unwrap_or(false)
                && path.file_name().map(|n| n != INDEX_FILE).unwrap_or(false);
            if !is_user_file {
                continue;
            }
            let data = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<User>(&data) {
                Ok(user) => users.push(user),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable user file"),
            }
        }
        users.sort_by_key(|u| u.id);
        Ok(users)
    }
}

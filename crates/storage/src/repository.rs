use async_trait::async_trait;
use doric_core::model::{PendingProgressEntry, ProgressRecord, StepProgress, UserId, UserProfile};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::feed::{ProgressFeed, ProgressSubscription};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("subscription closed")]
    Closed,
}

/// Locally confirmed progress, one row per user.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Insert a row unless one already exists for the user.
    ///
    /// Returns `true` when a row was written.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the insert fails.
    async fn insert_progress(&self, record: &ProgressRecord) -> Result<bool, StorageError>;

    /// Create or overwrite the user's row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn save_progress(&self, record: &ProgressRecord) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the read fails.
    async fn get_progress(&self, user_id: &UserId) -> Result<Option<ProgressRecord>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    async fn delete_progress(&self, user_id: &UserId) -> Result<(), StorageError>;

    /// Subscribe to every subsequent write of the user's row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the initial value cannot be loaded.
    async fn subscribe_progress(
        &self,
        user_id: &UserId,
    ) -> Result<ProgressSubscription, StorageError>;
}

/// Durable buffer of progress not yet confirmed by the remote store.
#[async_trait]
pub trait PendingProgressRepository: Send + Sync {
    /// Store an entry, replacing any existing entry for the same user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn queue_pending(&self, entry: &PendingProgressEntry) -> Result<(), StorageError>;

    /// All entries for the user, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the read fails.
    async fn list_pending(&self, user_id: &UserId)
    -> Result<Vec<PendingProgressEntry>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    async fn delete_pending(&self, user_id: &UserId) -> Result<(), StorageError>;

    /// Delete the user's entry only if it still holds `progress`.
    ///
    /// Returns `true` when an entry was removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    async fn delete_pending_matching(
        &self,
        user_id: &UserId,
        progress: StepProgress,
    ) -> Result<bool, StorageError>;
}

/// Cached profiles of users who signed in on this device.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a profile unless one already exists. Returns `true` when written.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the insert fails.
    async fn insert_user(&self, profile: &UserProfile) -> Result<bool, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the read fails.
    async fn get_user(&self, user_id: &UserId) -> Result<Option<UserProfile>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    async fn delete_user(&self, user_id: &UserId) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    users: Arc<Mutex<HashMap<UserId, UserProfile>>>,
    progress: Arc<Mutex<HashMap<UserId, ProgressRecord>>>,
    pending: Arc<Mutex<HashMap<UserId, PendingProgressEntry>>>,
    feed: ProgressFeed,
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn insert_progress(&self, record: &ProgressRecord) -> Result<bool, StorageError> {
        let inserted = {
            let mut guard = self.progress.lock().map_err(poisoned)?;
            if guard.contains_key(record.user_id()) {
                false
            } else {
                guard.insert(record.user_id().clone(), record.clone());
                true
            }
        };
        if inserted {
            self.feed.publish(record.user_id(), Some(record.clone()));
        }
        Ok(inserted)
    }

    async fn save_progress(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        self.progress
            .lock()
            .map_err(poisoned)?
            .insert(record.user_id().clone(), record.clone());
        self.feed.publish(record.user_id(), Some(record.clone()));
        Ok(())
    }

    async fn get_progress(&self, user_id: &UserId) -> Result<Option<ProgressRecord>, StorageError> {
        let guard = self.progress.lock().map_err(poisoned)?;
        Ok(guard.get(user_id).cloned())
    }

    async fn delete_progress(&self, user_id: &UserId) -> Result<(), StorageError> {
        self.progress.lock().map_err(poisoned)?.remove(user_id);
        self.feed.publish(user_id, None);
        Ok(())
    }

    async fn subscribe_progress(
        &self,
        user_id: &UserId,
    ) -> Result<ProgressSubscription, StorageError> {
        let mut subscription = self.feed.subscribe(user_id)?;
        let stored = self.get_progress(user_id).await?;
        self.feed.seed(&mut subscription, stored)?;
        Ok(subscription)
    }
}

#[async_trait]
impl PendingProgressRepository for InMemoryRepository {
    async fn queue_pending(&self, entry: &PendingProgressEntry) -> Result<(), StorageError> {
        self.pending
            .lock()
            .map_err(poisoned)?
            .insert(entry.user_id().clone(), entry.clone());
        Ok(())
    }

    async fn list_pending(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<PendingProgressEntry>, StorageError> {
        let guard = self.pending.lock().map_err(poisoned)?;
        Ok(guard.get(user_id).cloned().into_iter().collect())
    }

    async fn delete_pending(&self, user_id: &UserId) -> Result<(), StorageError> {
        self.pending.lock().map_err(poisoned)?.remove(user_id);
        Ok(())
    }

    async fn delete_pending_matching(
        &self,
        user_id: &UserId,
        progress: StepProgress,
    ) -> Result<bool, StorageError> {
        let mut guard = self.pending.lock().map_err(poisoned)?;
        let matches = guard
            .get(user_id)
            .is_some_and(|entry| entry.progress() == progress);
        if matches {
            guard.remove(user_id);
        }
        Ok(matches)
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn insert_user(&self, profile: &UserProfile) -> Result<bool, StorageError> {
        let mut guard = self.users.lock().map_err(poisoned)?;
        if guard.contains_key(profile.id()) {
            return Ok(false);
        }
        guard.insert(profile.id().clone(), profile.clone());
        Ok(true)
    }

    async fn get_user(&self, user_id: &UserId) -> Result<Option<UserProfile>, StorageError> {
        let guard = self.users.lock().map_err(poisoned)?;
        Ok(guard.get(user_id).cloned())
    }

    async fn delete_user(&self, user_id: &UserId) -> Result<(), StorageError> {
        self.users.lock().map_err(poisoned)?.remove(user_id);
        Ok(())
    }
}

/// Aggregates the local tables behind trait objects for easy backend swapping.
///
/// Built once by the composition root and shared by every service.
#[derive(Clone)]
pub struct Storage {
    pub users: Arc<dyn UserRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub pending: Arc<dyn PendingProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    /// Wires a single repository that implements every table trait.
    #[must_use]
    pub fn from_repository<R>(repo: R) -> Self
    where
        R: UserRepository + ProgressRepository + PendingProgressRepository + Clone + 'static,
    {
        let users: Arc<dyn UserRepository> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo.clone());
        let pending: Arc<dyn PendingProgressRepository> = Arc::new(repo);
        Self {
            users,
            progress,
            pending,
        }
    }
}

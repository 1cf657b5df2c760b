use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use doric_core::model::{StepProgress, UserId};

use super::RemoteProgressStore;
use crate::error::RemoteError;

/// In-memory remote store for tests and offline demos.
///
/// Writes can be made to fail, either permanently or for the next `n` pushes.
#[derive(Clone, Default)]
pub struct InMemoryRemoteStore {
    documents: Arc<Mutex<HashMap<UserId, StepProgress>>>,
    users: Arc<Mutex<HashSet<UserId>>>,
    failing: Arc<AtomicBool>,
    fail_next: Arc<AtomicUsize>,
    push_calls: Arc<AtomicUsize>,
}

impl InMemoryRemoteStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Fail only the next `count` pushes.
    pub fn fail_next_pushes(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Number of push attempts seen, successful or not.
    #[must_use]
    pub fn push_count(&self) -> usize {
        self.push_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn document(&self, user_id: &UserId) -> Option<StepProgress> {
        self.documents
            .lock()
            .ok()
            .and_then(|docs| docs.get(user_id).copied())
    }

    pub fn insert_document(&self, user_id: UserId, progress: StepProgress) {
        if let Ok(mut docs) = self.documents.lock() {
            docs.insert(user_id, progress);
        }
    }

    pub fn insert_user_document(&self, user_id: UserId) {
        if let Ok(mut users) = self.users.lock() {
            users.insert(user_id);
        }
    }

    #[must_use]
    pub fn has_user_document(&self, user_id: &UserId) -> bool {
        self.users
            .lock()
            .is_ok_and(|users| users.contains(user_id))
    }

    fn check_available(&self) -> Result<(), RemoteError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteError::Rejected("store offline".into()));
        }
        Ok(())
    }

    fn take_scheduled_failure(&self) -> bool {
        self.fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl RemoteProgressStore for InMemoryRemoteStore {
    async fn push_progress(
        &self,
        user_id: &UserId,
        progress: StepProgress,
    ) -> Result<(), RemoteError> {
        self.push_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        if self.take_scheduled_failure() {
            return Err(RemoteError::Rejected("scheduled failure".into()));
        }
        self.documents
            .lock()
            .map_err(|e| RemoteError::Rejected(e.to_string()))?
            .insert(user_id.clone(), progress);
        Ok(())
    }

    async fn fetch_progress(&self, user_id: &UserId) -> Result<Option<StepProgress>, RemoteError> {
        self.check_available()?;
        Ok(self.document(user_id))
    }

    async fn delete_progress(&self, user_id: &UserId) -> Result<(), RemoteError> {
        self.check_available()?;
        self.documents
            .lock()
            .map_err(|e| RemoteError::Rejected(e.to_string()))?
            .remove(user_id);
        Ok(())
    }

    async fn delete_user(&self, user_id: &UserId) -> Result<(), RemoteError> {
        self.check_available()?;
        self.users
            .lock()
            .map_err(|e| RemoteError::Rejected(e.to_string()))?
            .remove(user_id);
        Ok(())
    }
}

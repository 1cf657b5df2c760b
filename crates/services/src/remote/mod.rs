//! The authoritative, cloud-hosted copy of each user's progress.

use async_trait::async_trait;
use doric_core::model::{StepProgress, UserId};
use serde::{Deserialize, Serialize};

use crate::error::RemoteError;

mod http;
mod memory;

pub use http::{HttpRemoteStore, RemoteConfig};
pub use memory::InMemoryRemoteStore;

/// Collection that holds one progress document per user.
pub const PROGRESS_COLLECTION: &str = "progress";

/// Collection that holds one profile document per user.
pub const USERS_COLLECTION: &str = "users";

/// Wire shape of the per-user progress document.
///
/// Missing fields read as zero, matching a freshly created document.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProgressDocument {
    #[serde(default)]
    pub conversation: f32,
    #[serde(default)]
    pub last_conversation: u32,
}

impl From<StepProgress> for ProgressDocument {
    fn from(progress: StepProgress) -> Self {
        Self {
            conversation: progress.value,
            last_conversation: progress.last_step_index,
        }
    }
}

impl From<ProgressDocument> for StepProgress {
    fn from(doc: ProgressDocument) -> Self {
        StepProgress::new(doc.conversation, doc.last_conversation)
    }
}

/// Contract for the remote document store.
///
/// Each call resolves once the store has confirmed or refused the operation.
#[async_trait]
pub trait RemoteProgressStore: Send + Sync {
    /// Partially update the user's document with both progress fields.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` if the write is not confirmed.
    async fn push_progress(&self, user_id: &UserId, progress: StepProgress)
    -> Result<(), RemoteError>;

    /// Point read; `None` when the user has no document.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` if the read fails.
    async fn fetch_progress(&self, user_id: &UserId) -> Result<Option<StepProgress>, RemoteError>;

    /// Remove the user's document. Deleting a missing document succeeds.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` if the delete fails.
    async fn delete_progress(&self, user_id: &UserId) -> Result<(), RemoteError>;

    /// Remove the user's profile document. Deleting a missing document
    /// succeeds.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` if the delete fails.
    async fn delete_user(&self, user_id: &UserId) -> Result<(), RemoteError>;
}

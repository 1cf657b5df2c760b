//! Offline-first reconciliation of training progress.
//!
//! Every advance lands in the local store first. The remote copy is written
//! when the network is available; otherwise, or when the write is not
//! confirmed, the advance waits in the pending queue until the next drain.
//!
//! Remote writes for one user are serialised, and after each confirmed write
//! the local row is checked again: if it moved past the value just pushed,
//! the newer value goes back into the queue.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use doric_core::lesson::LessonSequence;
use doric_core::model::{PendingProgressEntry, ProgressRecord, StepProgress, UserId};
use doric_core::{Clock, ConnectivityStatus};
use storage::repository::{PendingProgressRepository, ProgressRepository};
use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::remote::RemoteProgressStore;

/// Where an advance ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// The remote store confirmed the write.
    Synced { index: u32 },
    /// The write sits in the pending queue.
    Queued { index: u32 },
}

impl AdvanceOutcome {
    /// The step index actually stored after clamping.
    #[must_use]
    pub fn index(self) -> u32 {
        match self {
            AdvanceOutcome::Synced { index } | AdvanceOutcome::Queued { index } => index,
        }
    }

    #[must_use]
    pub fn is_synced(self) -> bool {
        matches!(self, AdvanceOutcome::Synced { .. })
    }
}

pub struct SyncOrchestrator {
    clock: Clock,
    last_index: u32,
    progress: Arc<dyn ProgressRepository>,
    pending: Arc<dyn PendingProgressRepository>,
    remote: Arc<dyn RemoteProgressStore>,
    remote_locks: Mutex<HashMap<UserId, Arc<TokioMutex<()>>>>,
}

impl SyncOrchestrator {
    #[must_use]
    pub fn new(
        clock: Clock,
        lesson: &LessonSequence,
        progress: Arc<dyn ProgressRepository>,
        pending: Arc<dyn PendingProgressRepository>,
        remote: Arc<dyn RemoteProgressStore>,
    ) -> Self {
        Self {
            clock,
            last_index: lesson.last_index(),
            progress,
            pending,
            remote,
            remote_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Record that `user_id` completed step `new_index`.
    ///
    /// The index is clamped to the lesson. The local row is always written;
    /// the remote write is only attempted when `status` is `Available`.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Storage` if the local store or pending queue
    /// cannot be written. Remote failures are absorbed by queueing.
    pub async fn advance(
        &self,
        user_id: &UserId,
        new_index: u32,
        status: ConnectivityStatus,
    ) -> Result<AdvanceOutcome, SyncError> {
        let index = new_index.min(self.last_index);
        let progress = StepProgress::at_step(index);

        self.progress
            .save_progress(&ProgressRecord::new(user_id.clone(), progress))
            .await?;

        if !status.is_available() {
            debug!(user_id = %user_id, index, %status, "offline, queueing progress");
            self.queue(user_id, progress).await?;
            return Ok(AdvanceOutcome::Queued { index });
        }

        let lock = self.remote_lock(user_id);
        let _guard = lock.lock().await;
        match self.remote.push_progress(user_id, progress).await {
            Ok(()) => {
                self.clear_superseded(user_id).await?;
                self.requeue_if_newer(user_id, progress).await?;
                debug!(user_id = %user_id, index, "progress synced");
                Ok(AdvanceOutcome::Synced { index })
            }
            Err(err) => {
                warn!(user_id = %user_id, index, error = %err, "remote progress write failed, queueing");
                self.queue(user_id, progress).await?;
                self.requeue_if_newer(user_id, progress).await?;
                Ok(AdvanceOutcome::Queued { index })
            }
        }
    }

    /// Push every queued entry for `user_id` to the remote store, oldest first.
    ///
    /// Entries are removed only after their write is confirmed. Returns
    /// `false` when nothing worth syncing was queued or when any write failed;
    /// failed entries stay queued for the next drain.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Storage` if the queue cannot be read or updated.
    pub async fn drain_pending(&self, user_id: &UserId) -> Result<bool, SyncError> {
        let lock = self.remote_lock(user_id);
        let _guard = lock.lock().await;
        let entries: Vec<PendingProgressEntry> = self
            .pending
            .list_pending(user_id)
            .await?
            .into_iter()
            .filter(|entry| !entry.is_trivially_zero())
            .collect();

        if entries.is_empty() {
            debug!(user_id = %user_id, "no pending progress to sync");
            return Ok(false);
        }

        let mut all_synced = true;
        let mut last_pushed = None;
        for entry in &entries {
            let progress = entry.progress();
            match self.remote.push_progress(user_id, progress).await {
                Ok(()) => {
                    // A newer advance may have replaced the entry meanwhile; leave it queued.
                    self.pending
                        .delete_pending_matching(user_id, progress)
                        .await?;
                    last_pushed = Some(progress);
                }
                Err(err) => {
                    all_synced = false;
                    warn!(
                        user_id = %user_id,
                        index = progress.last_step_index,
                        error = %err,
                        "failed to push pending progress"
                    );
                }
            }
        }

        if let Some(progress) = last_pushed {
            self.requeue_if_newer(user_id, progress).await?;
        }

        info!(user_id = %user_id, entries = entries.len(), all_synced, "pending progress drain finished");
        Ok(all_synced)
    }

    /// Entries still queued for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Storage` if the queue cannot be read.
    pub async fn pending(&self, user_id: &UserId) -> Result<Vec<PendingProgressEntry>, SyncError> {
        Ok(self.pending.list_pending(user_id).await?)
    }

    async fn queue(&self, user_id: &UserId, progress: StepProgress) -> Result<(), SyncError> {
        let entry = PendingProgressEntry::new(user_id.clone(), progress, self.clock.now());
        self.pending.queue_pending(&entry).await?;
        Ok(())
    }

    fn remote_lock(&self, user_id: &UserId) -> Arc<TokioMutex<()>> {
        self.remote_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(user_id.clone())
            .or_insert_with(|| Arc::new(TokioMutex::new(())))
            .clone()
    }

    /// `pushed` was just written to the remote or the queue. If the local row
    /// has moved on since, the newer value must still reach the remote, so it
    /// takes the queue slot.
    async fn requeue_if_newer(
        &self,
        user_id: &UserId,
        pushed: StepProgress,
    ) -> Result<(), SyncError> {
        let Some(local) = self.progress.get_progress(user_id).await? else {
            return Ok(());
        };
        if local.progress() != pushed {
            debug!(
                user_id = %user_id,
                pushed = pushed.last_step_index,
                local = local.last_step_index(),
                "local progress moved during remote write, requeueing"
            );
            self.queue(user_id, local.progress()).await?;
        }
        Ok(())
    }

    /// After a confirmed write of the latest step, anything still queued is older.
    async fn clear_superseded(&self, user_id: &UserId) -> Result<(), SyncError> {
        for entry in self.pending.list_pending(user_id).await? {
            if self
                .pending
                .delete_pending_matching(user_id, entry.progress())
                .await?
            {
                debug!(
                    user_id = %user_id,
                    index = entry.progress().last_step_index,
                    "cleared superseded pending progress"
                );
            }
        }
        Ok(())
    }
}

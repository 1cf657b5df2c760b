use std::sync::Arc;

use doric_core::ConnectivityStatus;
use doric_core::lesson::{LessonSequence, Sentence};
use doric_core::model::UserId;
use storage::repository::ProgressRepository;

use crate::error::TrainingError;
use crate::sync::{AdvanceOutcome, SyncOrchestrator};

/// A user's walk through the lesson, one phrase at a time.
pub struct TrainingSession {
    user_id: UserId,
    lesson: Arc<LessonSequence>,
    orchestrator: Arc<SyncOrchestrator>,
    current: u32,
}

impl TrainingSession {
    /// Resume at the last completed step stored locally.
    ///
    /// A missing or unreadable row starts the user at the first phrase.
    pub async fn start(
        user_id: UserId,
        lesson: Arc<LessonSequence>,
        orchestrator: Arc<SyncOrchestrator>,
        progress: &dyn ProgressRepository,
    ) -> Self {
        let current = match progress.get_progress(&user_id).await {
            Ok(Some(record)) => lesson.clamp(record.last_step_index()),
            Ok(None) => 0,
            Err(err) => {
                tracing::error!(user_id = %user_id, error = %err, "error reading user progress");
                0
            }
        };
        tracing::debug!(user_id = %user_id, current, "training session resumed");
        Self {
            user_id,
            lesson,
            orchestrator,
            current,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn current_index(&self) -> u32 {
        self.current
    }

    #[must_use]
    pub fn current_sentence(&self) -> Option<&Sentence> {
        self.lesson.get(self.current)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.current == self.lesson.last_index()
    }

    #[must_use]
    pub fn lesson(&self) -> &LessonSequence {
        &self.lesson
    }

    /// Move to the next phrase and record the advance.
    ///
    /// At the final phrase the index stays put but the advance is still
    /// recorded.
    ///
    /// # Errors
    ///
    /// Returns `TrainingError::Sync` if the local write fails; the session
    /// index is left unchanged in that case.
    pub async fn next(&mut self, status: ConnectivityStatus) -> Result<AdvanceOutcome, TrainingError> {
        let next = self.lesson.next_index(self.current);
        let outcome = self.orchestrator.advance(&self.user_id, next, status).await?;
        self.current = outcome.index();
        Ok(outcome)
    }
}

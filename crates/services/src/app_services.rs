use std::sync::Arc;

use doric_core::lesson::LessonSequence;
use doric_core::model::UserId;
use storage::repository::Storage;

use crate::Clock;
use crate::connectivity::ConnectivityStream;
use crate::error::AppServicesError;
use crate::progress_service::ProgressService;
use crate::remote::RemoteProgressStore;
use crate::sync::SyncOrchestrator;
use crate::sync_worker::SyncWorker;
use crate::training::TrainingSession;

/// Assembles app-facing services over one storage backend and remote store.
#[derive(Clone)]
pub struct AppServices {
    lesson: Arc<LessonSequence>,
    storage: Storage,
    orchestrator: Arc<SyncOrchestrator>,
    progress: Arc<ProgressService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        lesson: LessonSequence,
        remote: Arc<dyn RemoteProgressStore>,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::with_storage(storage, clock, lesson, remote))
    }

    /// Build services over an already constructed storage backend.
    #[must_use]
    pub fn with_storage(
        storage: Storage,
        clock: Clock,
        lesson: LessonSequence,
        remote: Arc<dyn RemoteProgressStore>,
    ) -> Self {
        let orchestrator = Arc::new(SyncOrchestrator::new(
            clock,
            &lesson,
            Arc::clone(&storage.progress),
            Arc::clone(&storage.pending),
            Arc::clone(&remote),
        ));
        let progress = Arc::new(ProgressService::new(
            Arc::clone(&storage.users),
            Arc::clone(&storage.progress),
            Arc::clone(&storage.pending),
            remote,
        ));

        Self {
            lesson: Arc::new(lesson),
            storage,
            orchestrator,
            progress,
        }
    }

    #[must_use]
    pub fn lesson(&self) -> Arc<LessonSequence> {
        Arc::clone(&self.lesson)
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn orchestrator(&self) -> Arc<SyncOrchestrator> {
        Arc::clone(&self.orchestrator)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    /// Open a training session resumed from the user's local progress.
    pub async fn start_training(&self, user_id: UserId) -> TrainingSession {
        TrainingSession::start(
            user_id,
            Arc::clone(&self.lesson),
            Arc::clone(&self.orchestrator),
            self.storage.progress.as_ref(),
        )
        .await
    }

    /// Drain `user_id`'s queue whenever `connectivity` reports the network is back.
    #[must_use]
    pub fn spawn_sync_worker(&self, connectivity: ConnectivityStream, user_id: UserId) -> SyncWorker {
        SyncWorker::spawn(Arc::clone(&self.orchestrator), connectivity, user_id)
    }
}

use std::sync::Arc;

use doric_core::model::{CourseProgress, ProgressRecord, StepProgress, UserId, UserProfile};
use storage::feed::ProgressSubscription;
use storage::repository::{PendingProgressRepository, ProgressRepository, UserRepository};

use crate::error::ProgressServiceError;
use crate::remote::RemoteProgressStore;

/// Widget text shown when nobody is signed in.
pub const NO_PROGRESS_SAVED: &str = "No progress saved";

/// Account-level progress operations: signup bootstrap, reads, reset, deletion.
#[derive(Clone)]
pub struct ProgressService {
    users: Arc<dyn UserRepository>,
    progress: Arc<dyn ProgressRepository>,
    pending: Arc<dyn PendingProgressRepository>,
    remote: Arc<dyn RemoteProgressStore>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        users: Arc<dyn UserRepository>,
        progress: Arc<dyn ProgressRepository>,
        pending: Arc<dyn PendingProgressRepository>,
        remote: Arc<dyn RemoteProgressStore>,
    ) -> Self {
        Self {
            users,
            progress,
            pending,
            remote,
        }
    }

    /// Per-course progress for charts; empty when the user has no row.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the read fails.
    pub async fn course_progress(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<CourseProgress>, ProgressServiceError> {
        let record = self.progress.get_progress(user_id).await?;
        Ok(record.iter().map(ProgressRecord::course_progress).collect())
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the initial value cannot be read.
    pub async fn subscribe(
        &self,
        user_id: &UserId,
    ) -> Result<ProgressSubscription, ProgressServiceError> {
        Ok(self.progress.subscribe_progress(user_id).await?)
    }

    /// Prepare local state after signup or login.
    ///
    /// The profile is cached and a progress row is created from the remote
    /// document, or with zero values when the remote read fails or finds
    /// nothing. An existing local row is kept as is.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if local writes fail.
    pub async fn bootstrap_user(
        &self,
        profile: &UserProfile,
    ) -> Result<ProgressRecord, ProgressServiceError> {
        let user_id = profile.id();
        if self.users.insert_user(profile).await? {
            tracing::info!(user_id = %user_id, "cached new user profile");
        }

        if let Some(existing) = self.progress.get_progress(user_id).await? {
            return Ok(existing);
        }

        let progress = match self.remote.fetch_progress(user_id).await {
            Ok(Some(progress)) => progress,
            Ok(None) => StepProgress::zero(),
            Err(err) => {
                tracing::warn!(user_id = %user_id, error = %err, "remote progress fetch failed, starting from zero");
                StepProgress::zero()
            }
        };

        let record = ProgressRecord::new(user_id.clone(), progress);
        self.progress.insert_progress(&record).await?;
        Ok(self.progress.get_progress(user_id).await?.unwrap_or(record))
    }

    /// Zero the user's progress locally and remotely.
    ///
    /// The local reset and queue clear always apply; a remote failure is
    /// returned so the caller can report it.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` for local failures and
    /// `ProgressServiceError::Remote` if the remote reset was not confirmed.
    pub async fn reset_progress(&self, user_id: &UserId) -> Result<(), ProgressServiceError> {
        self.progress
            .save_progress(&ProgressRecord::zeroed(user_id.clone()))
            .await?;
        self.pending.delete_pending(user_id).await?;
        self.remote
            .push_progress(user_id, StepProgress::zero())
            .await?;
        tracing::info!(user_id = %user_id, "progress reset");
        Ok(())
    }

    /// Remove the remote profile and progress documents, then every local row
    /// for the user.
    ///
    /// Local data is kept when the remote delete fails so the call can be retried.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Remote` if the remote delete fails and
    /// `ProgressServiceError::Storage` if a local delete fails.
    pub async fn delete_account(&self, user_id: &UserId) -> Result<(), ProgressServiceError> {
        self.remote.delete_user(user_id).await?;
        self.remote.delete_progress(user_id).await?;
        self.pending.delete_pending(user_id).await?;
        self.progress.delete_progress(user_id).await?;
        self.users.delete_user(user_id).await?;
        tracing::info!(user_id = %user_id, "account data deleted");
        Ok(())
    }

    /// Text for the home-screen progress widget.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the read fails.
    pub async fn widget_text(
        &self,
        user_id: Option<&UserId>,
    ) -> Result<String, ProgressServiceError> {
        let Some(user_id) = user_id else {
            return Ok(NO_PROGRESS_SAVED.to_owned());
        };
        let percent = self
            .progress
            .get_progress(user_id)
            .await?
            .map_or(0, |record| record.progress().percent());
        Ok(format!("Your progress: {percent}%"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::InMemoryRemoteStore;
    use doric_core::model::PendingProgressEntry;
    use doric_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    fn uid() -> UserId {
        UserId::new("u1").unwrap()
    }

    fn profile() -> UserProfile {
        UserProfile::new(uid(), "Morag", "morag@example.com").unwrap()
    }

    fn service(repo: &InMemoryRepository, remote: &InMemoryRemoteStore) -> ProgressService {
        ProgressService::new(
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(remote.clone()),
        )
    }

    #[tokio::test]
    async fn bootstrap_pulls_remote_progress() {
        let repo = InMemoryRepository::new();
        let remote = InMemoryRemoteStore::new();
        remote.insert_document(uid(), StepProgress::at_step(6));

        let record = service(&repo, &remote).bootstrap_user(&profile()).await.unwrap();
        assert_eq!(record.last_step_index(), 6);
        assert!(repo.get_user(&uid()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn bootstrap_falls_back_to_zero_when_remote_fails() {
        let repo = InMemoryRepository::new();
        let remote = InMemoryRemoteStore::new();
        remote.set_failing(true);

        let record = service(&repo, &remote).bootstrap_user(&profile()).await.unwrap();
        assert_eq!(record.progress(), StepProgress::zero());
    }

    #[tokio::test]
    async fn bootstrap_keeps_existing_local_row() {
        let repo = InMemoryRepository::new();
        let remote = InMemoryRemoteStore::new();
        remote.insert_document(uid(), StepProgress::at_step(1));
        repo.save_progress(&ProgressRecord::new(uid(), StepProgress::at_step(7)))
            .await
            .unwrap();

        let record = service(&repo, &remote).bootstrap_user(&profile()).await.unwrap();
        assert_eq!(record.last_step_index(), 7);
    }

    #[tokio::test]
    async fn reset_zeroes_local_remote_and_queue() {
        let repo = InMemoryRepository::new();
        let remote = InMemoryRemoteStore::new();
        remote.insert_document(uid(), StepProgress::at_step(4));
        repo.save_progress(&ProgressRecord::new(uid(), StepProgress::at_step(4)))
            .await
            .unwrap();
        repo.queue_pending(&PendingProgressEntry::new(
            uid(),
            StepProgress::at_step(4),
            fixed_now(),
        ))
        .await
        .unwrap();

        service(&repo, &remote).reset_progress(&uid()).await.unwrap();
        let local = repo.get_progress(&uid()).await.unwrap().unwrap();
        assert_eq!(local.progress(), StepProgress::zero());
        assert!(repo.list_pending(&uid()).await.unwrap().is_empty());
        assert_eq!(remote.document(&uid()), Some(StepProgress::zero()));
    }

    #[tokio::test]
    async fn reset_reports_remote_failure_after_local_reset() {
        let repo = InMemoryRepository::new();
        let remote = InMemoryRemoteStore::new();
        repo.save_progress(&ProgressRecord::new(uid(), StepProgress::at_step(4)))
            .await
            .unwrap();
        remote.set_failing(true);

        let err = service(&repo, &remote).reset_progress(&uid()).await.unwrap_err();
        assert!(matches!(err, ProgressServiceError::Remote(_)));
        let local = repo.get_progress(&uid()).await.unwrap().unwrap();
        assert_eq!(local.last_step_index(), 0);
    }

    #[tokio::test]
    async fn delete_account_removes_every_local_row() {
        let repo = InMemoryRepository::new();
        let remote = InMemoryRemoteStore::new();
        let svc = service(&repo, &remote);
        svc.bootstrap_user(&profile()).await.unwrap();
        repo.queue_pending(&PendingProgressEntry::new(
            uid(),
            StepProgress::at_step(2),
            fixed_now(),
        ))
        .await
        .unwrap();
        remote.insert_document(uid(), StepProgress::at_step(2));
        remote.insert_user_document(uid());

        svc.delete_account(&uid()).await.unwrap();
        assert!(repo.get_user(&uid()).await.unwrap().is_none());
        assert!(repo.get_progress(&uid()).await.unwrap().is_none());
        assert!(repo.list_pending(&uid()).await.unwrap().is_empty());
        assert!(remote.document(&uid()).is_none());
        assert!(!remote.has_user_document(&uid()));
    }

    #[tokio::test]
    async fn delete_account_keeps_local_data_when_remote_fails() {
        let repo = InMemoryRepository::new();
        let remote = InMemoryRemoteStore::new();
        let svc = service(&repo, &remote);
        svc.bootstrap_user(&profile()).await.unwrap();
        remote.set_failing(true);

        assert!(svc.delete_account(&uid()).await.is_err());
        assert!(repo.get_progress(&uid()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn widget_text_reflects_progress() {
        let repo = InMemoryRepository::new();
        let remote = InMemoryRemoteStore::new();
        let svc = service(&repo, &remote);

        assert_eq!(svc.widget_text(None).await.unwrap(), NO_PROGRESS_SAVED);
        assert_eq!(svc.widget_text(Some(&uid())).await.unwrap(), "Your progress: 0%");

        repo.save_progress(&ProgressRecord::new(uid(), StepProgress::at_step(3)))
            .await
            .unwrap();
        assert_eq!(svc.widget_text(Some(&uid())).await.unwrap(), "Your progress: 30%");
    }

    #[tokio::test]
    async fn course_progress_is_empty_without_row() {
        let repo = InMemoryRepository::new();
        let remote = InMemoryRemoteStore::new();
        let svc = service(&repo, &remote);
        assert!(svc.course_progress(&uid()).await.unwrap().is_empty());

        svc.bootstrap_user(&profile()).await.unwrap();
        let courses = svc.course_progress(&uid()).await.unwrap();
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].course, "Conversation");
    }
}

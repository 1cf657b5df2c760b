use std::sync::Arc;

use doric_core::model::UserId;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::connectivity::ConnectivityStream;
use crate::sync::SyncOrchestrator;

/// Background task that drains the pending queue whenever the network comes back.
pub struct SyncWorker {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl SyncWorker {
    /// Start watching `connectivity` for `user_id`.
    ///
    /// If the network is already available a drain runs immediately.
    #[must_use]
    pub fn spawn(
        orchestrator: Arc<SyncOrchestrator>,
        mut connectivity: ConnectivityStream,
        user_id: UserId,
    ) -> Self {
        let (stop, mut stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            if connectivity.current().is_available() {
                drain(&orchestrator, &user_id).await;
            }
            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    next = connectivity.changed() => match next {
                        Some(status) => {
                            tracing::debug!(user_id = %user_id, %status, "sync worker saw connectivity change");
                            if status.is_available() {
                                drain(&orchestrator, &user_id).await;
                            }
                        }
                        None => {
                            tracing::debug!(user_id = %user_id, "connectivity source closed");
                            break;
                        }
                    },
                }
            }
        });
        Self { stop, task }
    }

    /// Whether the task has exited on its own.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the worker and wait for an in-flight drain to finish.
    pub async fn shutdown(self) {
        let _ = self.stop.send(());
        if let Err(err) = self.task.await {
            tracing::warn!(error = %err, "sync worker ended abnormally");
        }
    }
}

async fn drain(orchestrator: &SyncOrchestrator, user_id: &UserId) {
    match orchestrator.drain_pending(user_id).await {
        Ok(true) => tracing::info!(user_id = %user_id, "pending progress synced"),
        Ok(false) => tracing::debug!(user_id = %user_id, "pending progress not fully synced"),
        Err(err) => {
            tracing::error!(user_id = %user_id, error = %err, "pending progress drain failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::{ConnectivityObserver, ManualConnectivity};
    use crate::remote::InMemoryRemoteStore;
    use doric_core::lesson::LessonSequence;
    use doric_core::model::StepProgress;
    use doric_core::{Clock, ConnectivityStatus};
    use std::time::Duration;
    use storage::repository::{InMemoryRepository, PendingProgressRepository};

    async fn wait_until(mut check: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition reached in time");
    }

    #[tokio::test]
    async fn drains_when_network_returns() {
        let repo = InMemoryRepository::new();
        let remote = InMemoryRemoteStore::new();
        let orchestrator = Arc::new(SyncOrchestrator::new(
            Clock::default(),
            &LessonSequence::conversation(),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(remote.clone()),
        ));
        let user = UserId::new("u1").unwrap();
        orchestrator
            .advance(&user, 3, ConnectivityStatus::Unavailable)
            .await
            .unwrap();

        let network = ManualConnectivity::new(ConnectivityStatus::Unavailable);
        let worker = SyncWorker::spawn(Arc::clone(&orchestrator), network.observe(), user.clone());

        network.set(ConnectivityStatus::Available);
        wait_until(|| remote.document(&user).is_some()).await;
        assert_eq!(remote.document(&user), Some(StepProgress::at_step(3)));

        let pending_repo = repo.clone();
        let check_user = user.clone();
        tokio::time::timeout(Duration::from_secs(2), async move {
            while !pending_repo.list_pending(&check_user).await.unwrap().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("queue drained");

        worker.shutdown().await;
    }

    #[tokio::test]
    async fn exits_when_source_closes() {
        let repo = InMemoryRepository::new();
        let orchestrator = Arc::new(SyncOrchestrator::new(
            Clock::default(),
            &LessonSequence::conversation(),
            Arc::new(repo.clone()),
            Arc::new(repo),
            Arc::new(InMemoryRemoteStore::new()),
        ));
        let network = ManualConnectivity::new(ConnectivityStatus::Unavailable);
        let worker = SyncWorker::spawn(
            orchestrator,
            network.observe(),
            UserId::new("u1").unwrap(),
        );
        drop(network);
        wait_until(|| worker.is_finished()).await;
        worker.shutdown().await;
    }
}

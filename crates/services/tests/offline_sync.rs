use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use doric_core::ConnectivityStatus;
use doric_core::lesson::LessonSequence;
use doric_core::model::{StepProgress, UserId, UserProfile};
use doric_core::time::fixed_now;
use services::{
    AdvanceOutcome, AppServices, Clock, ConnectivityObserver, InMemoryRemoteStore,
    ManualConnectivity, RemoteError, RemoteProgressStore, SyncOrchestrator,
};
use storage::repository::{
    InMemoryRepository, PendingProgressRepository, ProgressRepository, Storage,
};
use tokio::sync::Notify;

fn uid() -> UserId {
    UserId::new("u-42").unwrap()
}

fn orchestrator(
    repo: &InMemoryRepository,
    remote: Arc<dyn RemoteProgressStore>,
) -> Arc<SyncOrchestrator> {
    Arc::new(SyncOrchestrator::new(
        Clock::fixed(fixed_now()),
        &LessonSequence::conversation(),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        remote,
    ))
}

#[tokio::test]
async fn local_progress_always_matches_latest_advance() {
    let repo = InMemoryRepository::new();
    let remote = InMemoryRemoteStore::new();
    let sync = orchestrator(&repo, Arc::new(remote.clone()));

    for (index, status) in [
        (1, ConnectivityStatus::Available),
        (2, ConnectivityStatus::Lost),
        (3, ConnectivityStatus::Unavailable),
        (4, ConnectivityStatus::Available),
    ] {
        sync.advance(&uid(), index, status).await.unwrap();
        let local = repo.get_progress(&uid()).await.unwrap().unwrap();
        assert_eq!(local.last_step_index(), index);
        assert_eq!(local.progress_value(), index as f32);
    }
}

#[tokio::test]
async fn available_advance_leaves_nothing_queued() {
    let repo = InMemoryRepository::new();
    let remote = InMemoryRemoteStore::new();
    let sync = orchestrator(&repo, Arc::new(remote.clone()));

    let outcome = sync
        .advance(&uid(), 2, ConnectivityStatus::Available)
        .await
        .unwrap();
    assert_eq!(outcome, AdvanceOutcome::Synced { index: 2 });
    assert!(repo.list_pending(&uid()).await.unwrap().is_empty());
    assert_eq!(remote.document(&uid()), Some(StepProgress::at_step(2)));
}

#[tokio::test]
async fn failed_remote_write_is_queued() {
    let repo = InMemoryRepository::new();
    let remote = InMemoryRemoteStore::new();
    remote.set_failing(true);
    let sync = orchestrator(&repo, Arc::new(remote.clone()));

    let outcome = sync
        .advance(&uid(), 5, ConnectivityStatus::Available)
        .await
        .unwrap();
    assert_eq!(outcome, AdvanceOutcome::Queued { index: 5 });
    let pending = repo.list_pending(&uid()).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].progress(), StepProgress::at_step(5));
}

#[tokio::test]
async fn offline_advance_queues_and_drain_clears() {
    let repo = InMemoryRepository::new();
    let remote = InMemoryRemoteStore::new();
    let sync = orchestrator(&repo, Arc::new(remote.clone()));

    sync.advance(&uid(), 3, ConnectivityStatus::Unavailable)
        .await
        .unwrap();
    let pending = repo.list_pending(&uid()).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].progress(), StepProgress::new(3.0, 3));
    assert_eq!(remote.push_count(), 0);

    assert!(sync.drain_pending(&uid()).await.unwrap());
    assert!(repo.list_pending(&uid()).await.unwrap().is_empty());
    assert_eq!(remote.document(&uid()), Some(StepProgress::new(3.0, 3)));

    // Second drain has nothing to do.
    assert!(!sync.drain_pending(&uid()).await.unwrap());
    assert_eq!(remote.push_count(), 1);
}

#[tokio::test]
async fn zero_entries_are_never_pushed() {
    let repo = InMemoryRepository::new();
    let remote = InMemoryRemoteStore::new();
    let sync = orchestrator(&repo, Arc::new(remote.clone()));

    sync.advance(&uid(), 0, ConnectivityStatus::Unavailable)
        .await
        .unwrap();
    assert_eq!(repo.list_pending(&uid()).await.unwrap().len(), 1);

    assert!(!sync.drain_pending(&uid()).await.unwrap());
    assert_eq!(remote.push_count(), 0);
}

#[tokio::test]
async fn queue_is_scoped_per_user() {
    let repo = InMemoryRepository::new();
    let remote = InMemoryRemoteStore::new();
    let sync = orchestrator(&repo, Arc::new(remote.clone()));
    let other = UserId::new("u-7").unwrap();

    sync.advance(&uid(), 2, ConnectivityStatus::Unavailable)
        .await
        .unwrap();
    sync.advance(&other, 6, ConnectivityStatus::Unavailable)
        .await
        .unwrap();

    assert!(sync.drain_pending(&uid()).await.unwrap());
    assert!(repo.list_pending(&uid()).await.unwrap().is_empty());
    assert_eq!(repo.list_pending(&other).await.unwrap().len(), 1);
    assert!(remote.document(&other).is_none());
}

/// Remote store whose first push blocks until released.
struct GatedRemote {
    inner: InMemoryRemoteStore,
    armed: AtomicBool,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl RemoteProgressStore for GatedRemote {
    async fn push_progress(
        &self,
        user_id: &UserId,
        progress: StepProgress,
    ) -> Result<(), RemoteError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.push_progress(user_id, progress).await
    }

    async fn fetch_progress(&self, user_id: &UserId) -> Result<Option<StepProgress>, RemoteError> {
        self.inner.fetch_progress(user_id).await
    }

    async fn delete_progress(&self, user_id: &UserId) -> Result<(), RemoteError> {
        self.inner.delete_progress(user_id).await
    }

    async fn delete_user(&self, user_id: &UserId) -> Result<(), RemoteError> {
        self.inner.delete_user(user_id).await
    }
}

fn gated_remote() -> Arc<GatedRemote> {
    Arc::new(GatedRemote {
        inner: InMemoryRemoteStore::new(),
        armed: AtomicBool::new(false),
        entered: Notify::new(),
        release: Notify::new(),
    })
}

async fn wait_for_local_step(repo: &InMemoryRepository, index: u32) {
    tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            let local = repo.get_progress(&uid()).await.unwrap();
            if local.map(|r| r.last_step_index()) == Some(index) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("local row written");
}

#[tokio::test]
async fn advance_during_drain_is_not_lost() {
    let repo = InMemoryRepository::new();
    let gated = gated_remote();
    let sync = orchestrator(&repo, Arc::clone(&gated) as Arc<dyn RemoteProgressStore>);

    sync.advance(&uid(), 3, ConnectivityStatus::Unavailable)
        .await
        .unwrap();

    gated.armed.store(true, Ordering::SeqCst);
    let drain = tokio::spawn({
        let sync = Arc::clone(&sync);
        async move { sync.drain_pending(&uid()).await }
    });
    gated.entered.notified().await;

    sync.advance(&uid(), 4, ConnectivityStatus::Unavailable)
        .await
        .unwrap();
    gated.release.notify_one();

    assert!(drain.await.unwrap().unwrap());
    let pending = repo.list_pending(&uid()).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].progress(), StepProgress::at_step(4));
    assert_eq!(gated.inner.document(&uid()), Some(StepProgress::at_step(3)));

    assert!(sync.drain_pending(&uid()).await.unwrap());
    assert_eq!(gated.inner.document(&uid()), Some(StepProgress::at_step(4)));
}

#[tokio::test]
async fn online_advance_during_drain_leaves_remote_current() {
    let repo = InMemoryRepository::new();
    let gated = gated_remote();
    let sync = orchestrator(&repo, Arc::clone(&gated) as Arc<dyn RemoteProgressStore>);

    sync.advance(&uid(), 3, ConnectivityStatus::Unavailable)
        .await
        .unwrap();

    gated.armed.store(true, Ordering::SeqCst);
    let drain = tokio::spawn({
        let sync = Arc::clone(&sync);
        async move { sync.drain_pending(&uid()).await }
    });
    gated.entered.notified().await;

    let advance = tokio::spawn({
        let sync = Arc::clone(&sync);
        async move {
            sync.advance(&uid(), 4, ConnectivityStatus::Available)
                .await
        }
    });
    wait_for_local_step(&repo, 4).await;
    gated.release.notify_one();

    assert!(drain.await.unwrap().unwrap());
    assert_eq!(
        advance.await.unwrap().unwrap(),
        AdvanceOutcome::Synced { index: 4 }
    );
    assert_eq!(gated.inner.document(&uid()), Some(StepProgress::at_step(4)));
    assert!(repo.list_pending(&uid()).await.unwrap().is_empty());
}

#[tokio::test]
async fn offline_advance_during_online_push_is_requeued() {
    let repo = InMemoryRepository::new();
    let gated = gated_remote();
    let sync = orchestrator(&repo, Arc::clone(&gated) as Arc<dyn RemoteProgressStore>);

    gated.armed.store(true, Ordering::SeqCst);
    let online = tokio::spawn({
        let sync = Arc::clone(&sync);
        async move {
            sync.advance(&uid(), 4, ConnectivityStatus::Available)
                .await
        }
    });
    gated.entered.notified().await;

    sync.advance(&uid(), 5, ConnectivityStatus::Unavailable)
        .await
        .unwrap();
    gated.release.notify_one();

    assert!(online.await.unwrap().unwrap().is_synced());
    assert_eq!(gated.inner.document(&uid()), Some(StepProgress::at_step(4)));
    let pending = repo.list_pending(&uid()).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].progress(), StepProgress::at_step(5));

    assert!(sync.drain_pending(&uid()).await.unwrap());
    assert_eq!(gated.inner.document(&uid()), Some(StepProgress::at_step(5)));
    assert!(repo.list_pending(&uid()).await.unwrap().is_empty());
}

#[tokio::test]
async fn offline_session_syncs_when_network_returns() {
    let remote = InMemoryRemoteStore::new();
    let services = AppServices::with_storage(
        Storage::in_memory(),
        Clock::fixed(fixed_now()),
        LessonSequence::conversation(),
        Arc::new(remote.clone()),
    );
    let profile = UserProfile::new(uid(), "Morag", "morag@example.com").unwrap();
    services.progress().bootstrap_user(&profile).await.unwrap();

    let network = ManualConnectivity::new(ConnectivityStatus::Unavailable);
    let worker = services.spawn_sync_worker(network.observe(), uid());
    let mut feed = services.progress().subscribe(&uid()).await.unwrap();

    let mut session = services.start_training(uid()).await;
    for _ in 0..3 {
        let outcome = session.next(network.current()).await.unwrap();
        assert!(!outcome.is_synced());
    }
    let seen = tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            let record = feed.changed().await.unwrap();
            if record.as_ref().map(|r| r.last_step_index()) == Some(3) {
                return record;
            }
        }
    })
    .await
    .expect("feed delivered latest progress");
    assert!(seen.is_some());
    assert!(remote.document(&uid()).is_none());

    network.set(ConnectivityStatus::Available);
    tokio::time::timeout(Duration::from_secs(2), async {
        while remote.document(&uid()) != Some(StepProgress::at_step(3)) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("remote caught up");

    worker.shutdown().await;
    assert!(services.orchestrator().pending(&uid()).await.unwrap().is_empty());
    assert_eq!(
        services.progress().widget_text(Some(&uid())).await.unwrap(),
        "Your progress: 30%"
    );
}

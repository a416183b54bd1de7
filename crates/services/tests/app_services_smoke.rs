use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use services::{AppConfig, AppServices, Clock, LocalSessionProvider};
use storage::repository::{
    InMemoryProgressTable, ProgressRow, ProgressTable, RemoteCompletion, Storage, StorageError,
};
use tracker_core::model::{QuestionId, Session, UserId};
use tracker_core::stats::ProgressSummary;
use tracker_core::time::fixed_now;

#[tokio::test]
async fn local_only_services_track_progress() {
    let services = AppServices::with_storage(
        &AppConfig::default(),
        Clock::fixed(fixed_now()),
        Storage::in_memory(),
    )
    .await
    .unwrap();

    assert!(services.auth().is_none());
    assert!(services.sessions().current_session().await.is_none());

    let catalog = services.catalog();
    let first = catalog.topics()[0].questions()[0].id().clone();
    let progress = services.progress();
    progress.toggle(&first, true).await.unwrap();
    progress.flush().await;

    let summary = ProgressSummary::compute(&catalog, &progress.snapshot());
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.total, catalog.total_questions());

    let unknown = QuestionId::new("not-in-catalog").unwrap();
    assert!(!progress.is_completed(&unknown));
}

#[tokio::test]
async fn bootstrap_opens_sqlite_and_survives_restart() {
    let config = AppConfig {
        db_url: "sqlite:file:services_smoke?mode=memory&cache=shared".to_string(),
        ..AppConfig::default()
    };
    let clock = Clock::fixed(fixed_now());
    let first = AppServices::bootstrap(&config, clock).await.unwrap();
    let id = first.catalog().topics()[0].questions()[0].id().clone();
    first.progress().toggle(&id, true).await.unwrap();

    let second = AppServices::bootstrap(&config, clock).await.unwrap();
    assert!(second.progress().is_completed(&id));
    assert_eq!(
        second.progress().completed_at(&id).as_deref(),
        Some("2023-11-14T22:13:20.000Z")
    );
}

/// Counts reads, delegating to an in-memory table.
#[derive(Default)]
struct CountingTable {
    inner: InMemoryProgressTable,
    pulls: AtomicUsize,
}

#[async_trait]
impl ProgressTable for CountingTable {
    async fn completed_rows(&self, session: &Session) -> Result<Vec<RemoteCompletion>, StorageError> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        self.inner.completed_rows(session).await
    }

    async fn upsert_rows(&self, session: &Session, rows: &[ProgressRow]) -> Result<(), StorageError> {
        self.inner.upsert_rows(session, rows).await
    }

    async fn delete_rows(&self, session: &Session, ids: &[QuestionId]) -> Result<(), StorageError> {
        self.inner.delete_rows(session, ids).await
    }
}

#[tokio::test]
async fn sign_in_pulls_exactly_once() {
    let table = Arc::new(CountingTable::default());
    let sessions = Arc::new(LocalSessionProvider::signed_out());
    let services = AppServices::with_backends(
        &AppConfig::default(),
        Clock::fixed(fixed_now()),
        Storage::in_memory(),
        sessions.clone(),
        table.clone(),
    )
    .await
    .unwrap();
    let progress = services.progress();

    let seen = progress.auth_events_seen();
    sessions.sign_in(Session::local(UserId::random()));
    progress.settle_auth(seen).await;
    assert_eq!(table.pulls.load(Ordering::SeqCst), 1);

    progress.flush().await;
    assert_eq!(table.pulls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn sign_out_clears_once_the_store_has_reacted() {
    let session = Session::local(UserId::random());
    let sessions = Arc::new(LocalSessionProvider::signed_in(session));
    let services = AppServices::with_backends(
        &AppConfig::default(),
        Clock::fixed(fixed_now()),
        Storage::in_memory(),
        sessions.clone(),
        Arc::new(InMemoryProgressTable::new()),
    )
    .await
    .unwrap();
    let progress = services.progress();
    let id = services.catalog().topics()[0].questions()[0].id().clone();
    progress.toggle(&id, true).await.unwrap();

    let seen = progress.auth_events_seen();
    sessions.sign_out();
    progress.settle_auth(seen).await;

    assert!(progress.snapshot().is_empty());
}

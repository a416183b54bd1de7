use std::sync::Arc;

use storage::local::{COMPLETED_KEY, LocalProgressStore, TIMESTAMPS_KEY};
use storage::repository::{KeyValueStore, Storage};
use storage::sqlite::SqliteRepository;
use tracker_core::model::{ProgressMaps, QuestionId};

#[tokio::test]
async fn sqlite_kv_roundtrip_and_overwrite() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_kv_roundtrip?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    repo.set_entries(&[("a", "1".to_string()), ("b", "2".to_string())])
        .await
        .unwrap();
    repo.set_entries(&[("a", "3".to_string())]).await.unwrap();

    assert_eq!(repo.get("a").await.unwrap().as_deref(), Some("3"));
    assert_eq!(repo.get("b").await.unwrap().as_deref(), Some("2"));
    assert_eq!(repo.get("missing").await.unwrap(), None);

    repo.remove_entries(&["a", "missing"]).await.unwrap();
    assert_eq!(repo.get("a").await.unwrap(), None);
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_migrate_twice?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("first migrate");
    repo.migrate().await.expect("second migrate");
}

#[tokio::test]
async fn local_progress_survives_reopen() {
    let url = "sqlite:file:memdb_local_progress?mode=memory&cache=shared";
    // Keep one pool alive so the shared in-memory database outlives the first handle.
    let keeper = SqliteRepository::connect(url).await.expect("connect");

    let storage = Storage::sqlite(url).await.expect("storage");
    let local = LocalProgressStore::new(Arc::clone(&storage.kv));
    let mut maps = ProgressMaps::new();
    maps.mark_completed(
        QuestionId::new("two-sum").unwrap(),
        "2024-01-01T00:00:00.000Z".into(),
    );
    local.save(&maps).await.unwrap();
    drop(local);
    drop(storage);

    let reopened = Storage::sqlite(url).await.expect("reopen");
    let local = LocalProgressStore::new(Arc::clone(&reopened.kv));
    let stored = local.load().await.unwrap();
    assert_eq!(stored.completed, *maps.completed());
    assert_eq!(stored.timestamps, *maps.timestamps());

    local.clear().await.unwrap();
    assert_eq!(keeper.get(COMPLETED_KEY).await.unwrap(), None);
    assert_eq!(keeper.get(TIMESTAMPS_KEY).await.unwrap(), None);
}

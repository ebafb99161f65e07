use log_viewer::store::{insert_batch, NewLogRow};
use log_viewer::tail::{TailFilter, TailRegistry};

async fn test_pool() -> sqlx::SqlitePool {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs.db");
    std::mem::forget(dir);
    let pool = monlight_core::storage::open_db(path.to_str().unwrap())
        .await
        .unwrap();
    monlight_core::storage::run_migrations(&pool, log_viewer::db::MIGRATIONS)
        .await
        .unwrap();
    pool
}

fn row(n: usize, container: &str) -> NewLogRow {
    NewLogRow {
        timestamp: format!("2024-01-01T00:00:{:02}Z", n % 60),
        container: container.to_string(),
        stream: "stdout".to_string(),
        level: "INFO".to_string(),
        message: format!("request handled #{n}"),
        raw: "{}".to_string(),
    }
}

#[tokio::test]
async fn ingested_rows_are_searchable_via_fts() {
    let pool = test_pool().await;
    let registry = TailRegistry::new();
    insert_batch(&pool, &[row(1, "web"), row(2, "worker")], 1000, &registry)
        .await
        .unwrap();

    let hits: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM logs_fts WHERE logs_fts MATCH 'handled'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(hits, 2);
}

#[tokio::test]
async fn tail_registry_delivers_only_matching_rows_after_commit() {
    let pool = test_pool().await;
    let registry = TailRegistry::new();
    let (_id, mut rx) = registry
        .register(TailFilter { container: Some("web".to_string()), level: None }, 8)
        .unwrap();

    insert_batch(&pool, &[row(1, "worker"), row(2, "web")], 1000, &registry)
        .await
        .unwrap();

    let received = rx.recv().await.unwrap();
    assert_eq!(received.container, "web");
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn fifth_client_fills_cap_and_unregister_frees_a_slot() {
    let registry = TailRegistry::new();
    let mut ids = Vec::new();
    for _ in 0..5 {
        let (id, _rx) = registry.register(TailFilter::default(), 4).unwrap();
        ids.push(id);
    }
    assert!(registry.register(TailFilter::default(), 4).is_none());
    registry.unregister(ids[0]);
    assert!(registry.register(TailFilter::default(), 4).is_some());
}

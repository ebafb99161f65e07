use error_tracker::ingest::{ingest_error, resolve_error, IngestRequest};

async fn test_pool() -> sqlx::SqlitePool {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("errors.db");
    // leak the tempdir so the file isn't removed before the pool closes
    std::mem::forget(dir);
    let pool = monlight_core::storage::open_db(path.to_str().unwrap())
        .await
        .unwrap();
    monlight_core::storage::run_migrations(&pool, error_tracker::db::MIGRATIONS)
        .await
        .unwrap();
    pool
}

fn sample_request() -> IngestRequest {
    IngestRequest {
        project: "p".to_string(),
        environment: Some("production".to_string()),
        exception_type: "ValueError".to_string(),
        message: "x".to_string(),
        traceback: "File \"/a.py\", line 1, in f\n  raise ValueError('x')".to_string(),
        request_url: None,
        request_method: None,
        request_headers: None,
        user_id: None,
        extra: None,
    }
}

#[tokio::test]
async fn fingerprint_stability_increments_count() {
    let pool = test_pool().await;
    let req = sample_request();

    let first = ingest_error(&pool, &req).await.unwrap();
    assert_eq!(first.status, error_tracker::ingest::Outcome::Created);
    assert_eq!(first.count, 1);

    let second = ingest_error(&pool, &req).await.unwrap();
    assert_eq!(second.status, error_tracker::ingest::Outcome::Incremented);
    assert_eq!(second.count, 2);
    assert_eq!(second.id, first.id);

    let groups: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM errors")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(groups, 1);

    let occurrences: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM error_occurrences")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(occurrences, 2);
}

#[tokio::test]
async fn occurrence_ring_bounds_at_five() {
    let pool = test_pool().await;
    let req = sample_request();
    let mut last_id = 0;
    for _ in 0..7 {
        let result = ingest_error(&pool, &req).await.unwrap();
        last_id = result.id;
    }
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM error_occurrences WHERE error_id = ?1",
    )
    .bind(last_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(count, 5);

    let ids: Vec<i64> = sqlx::query_scalar(
        "SELECT id FROM error_occurrences WHERE error_id = ?1 ORDER BY id ASC",
    )
    .bind(last_id)
    .fetch_all(&pool)
    .await
    .unwrap();
    // the remaining ids are the tail (3..=7), contiguous, oldest two gone
    assert_eq!(ids.len(), 5);
    for pair in ids.windows(2) {
        assert_eq!(pair[1] - pair[0], 1);
    }
}

#[tokio::test]
async fn resolve_then_reingest_reopens() {
    let pool = test_pool().await;
    let req = sample_request();
    let created = ingest_error(&pool, &req).await.unwrap();
    assert!(created.should_alert);

    let resolved = resolve_error(&pool, created.id).await.unwrap();
    assert!(resolved);

    let row: (bool, Option<String>) =
        sqlx::query_as("SELECT resolved, resolved_at FROM errors WHERE id = ?1")
            .bind(created.id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(row.0);
    assert!(row.1.is_some());

    let reopened = ingest_error(&pool, &req).await.unwrap();
    assert_eq!(reopened.status, error_tracker::ingest::Outcome::Reopened);
    assert_eq!(reopened.count, 2);
    assert!(reopened.should_alert);

    let row: (bool, Option<String>) =
        sqlx::query_as("SELECT resolved, resolved_at FROM errors WHERE id = ?1")
            .bind(created.id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(!row.0);
    assert!(row.1.is_none());
}

#[tokio::test]
async fn resolve_unknown_id_returns_false() {
    let pool = test_pool().await;
    let resolved = resolve_error(&pool, 9999).await.unwrap();
    assert!(!resolved);
}

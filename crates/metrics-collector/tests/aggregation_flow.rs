use metrics_collector::ingest::{ingest_batch, IngestBatch, MetricPoint};
use metrics_collector::rollup;

async fn test_pool() -> sqlx::SqlitePool {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metrics.db");
    std::mem::forget(dir);
    let pool = monlight_core::storage::open_db(path.to_str().unwrap())
        .await
        .unwrap();
    monlight_core::storage::run_migrations(&pool, metrics_collector::db::MIGRATIONS)
        .await
        .unwrap();
    pool
}

#[tokio::test]
async fn ingest_then_rollup_produces_minute_aggregate() {
    let pool = test_pool().await;

    let metrics: Vec<MetricPoint> = (1..=10)
        .map(|v| MetricPoint {
            name: "req_latency".to_string(),
            kind: "histogram".to_string(),
            value: v as f64,
            labels: None,
            timestamp: Some("2020-06-01T12:00:00Z".to_string()),
        })
        .collect();
    let response = ingest_batch(&pool, &IngestBatch { metrics }).await.unwrap();
    assert_eq!(response.count, 10);

    let written = rollup::minute::run_once(&pool).await.unwrap();
    assert_eq!(written, 1);

    let row: (i64, f64, f64) = sqlx::query_as(
        "SELECT count, min, max FROM metrics_aggregated WHERE name = 'req_latency'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(row.0, 10);
    assert_eq!(row.1, 1.0);
    assert_eq!(row.2, 10.0);
}

#[tokio::test]
async fn rejects_batch_over_1000_points() {
    let pool = test_pool().await;
    let metrics: Vec<MetricPoint> = (0..1001)
        .map(|_| MetricPoint {
            name: "x".to_string(),
            kind: "counter".to_string(),
            value: 1.0,
            labels: None,
            timestamp: None,
        })
        .collect();
    let err = ingest_batch(&pool, &IngestBatch { metrics }).await.unwrap_err();
    assert!(matches!(err, monlight_core::error::AppError::Validation(_)));
}

#[tokio::test]
async fn labels_with_distinct_keys_group_separately() {
    let pool = test_pool().await;
    let mut labels_a = serde_json::Map::new();
    labels_a.insert("region".to_string(), serde_json::json!("us"));
    let mut labels_b = serde_json::Map::new();
    labels_b.insert("region".to_string(), serde_json::json!("eu"));

    let metrics = vec![
        MetricPoint {
            name: "reqs".to_string(),
            kind: "counter".to_string(),
            value: 5.0,
            labels: Some(labels_a),
            timestamp: Some("2020-06-01T12:00:00Z".to_string()),
        },
        MetricPoint {
            name: "reqs".to_string(),
            kind: "counter".to_string(),
            value: 3.0,
            labels: Some(labels_b),
            timestamp: Some("2020-06-01T12:00:00Z".to_string()),
        },
    ];
    ingest_batch(&pool, &IngestBatch { metrics }).await.unwrap();
    rollup::minute::run_once(&pool).await.unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM metrics_aggregated WHERE name = 'reqs'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 2);
}

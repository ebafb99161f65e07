use browser_relay::dsn::{self, CreateDsnRequest};
use browser_relay::sourcemap::{self, UploadSourceMapRequest};

async fn test_pool() -> sqlx::SqlitePool {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("browser_relay.db");
    std::mem::forget(dir);
    let pool = monlight_core::storage::open_db(path.to_str().unwrap())
        .await
        .unwrap();
    monlight_core::storage::run_migrations(&pool, browser_relay::db::MIGRATIONS)
        .await
        .unwrap();
    pool
}

#[tokio::test]
async fn dsn_key_created_resolved_then_deactivated() {
    let pool = test_pool().await;
    let key = dsn::create(&pool, &CreateDsnRequest { project: "acme".to_string() })
        .await
        .unwrap();
    assert_eq!(key.public_key.len(), 32);
    assert!(key.active);

    let resolved = dsn::resolve_project(&pool, &key.public_key).await.unwrap();
    assert_eq!(resolved.as_deref(), Some("acme"));

    let deactivated = dsn::deactivate(&pool, key.id).await.unwrap();
    assert!(deactivated);

    // soft-deactivated: row still exists, but no longer resolves
    let resolved_after = dsn::resolve_project(&pool, &key.public_key).await.unwrap();
    assert_eq!(resolved_after, None);
    let keys = dsn::list(&pool).await.unwrap();
    assert_eq!(keys.len(), 1);
    assert!(!keys[0].active);
}

fn sample_map() -> UploadSourceMapRequest {
    UploadSourceMapRequest {
        project: "acme".to_string(),
        release: "1.0.0".to_string(),
        file_url: "/static/app.js".to_string(),
        map_content: serde_json::json!({
            "version": 3,
            "sources": ["app.ts"],
            "names": ["fn"],
            "mappings": "AAAAA"
        }),
    }
}

#[tokio::test]
async fn source_map_upsert_is_idempotent_on_the_unique_key() {
    let pool = test_pool().await;
    let first = sourcemap::upsert(&pool, &sample_map()).await.unwrap();
    let second = sourcemap::upsert(&pool, &sample_map()).await.unwrap();
    assert_eq!(first.id, second.id);

    let rows = sourcemap::list(&pool, Some("acme")).await.unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn source_map_rejects_malformed_shape() {
    let pool = test_pool().await;
    let mut req = sample_map();
    req.map_content = serde_json::json!({"version": 3});
    let err = sourcemap::upsert(&pool, &req).await.unwrap_err();
    assert!(matches!(err, monlight_core::error::AppError::Validation(_)));
}

#[tokio::test]
async fn source_map_delete_removes_row() {
    let pool = test_pool().await;
    let row = sourcemap::upsert(&pool, &sample_map()).await.unwrap();
    assert!(sourcemap::delete(&pool, row.id).await.unwrap());
    let rows = sourcemap::list(&pool, None).await.unwrap();
    assert!(rows.is_empty());
}

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use browser_relay::{app, AppState, Config};
use monlight_core::gates::RateLimiter;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

async fn test_state() -> AppState {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("browser_relay.db");
    std::mem::forget(dir);
    let pool = monlight_core::storage::open_db(path.to_str().unwrap())
        .await
        .unwrap();
    monlight_core::storage::run_migrations(&pool, browser_relay::db::MIGRATIONS)
        .await
        .unwrap();
    AppState {
        pool,
        config: Arc::new(Config {
            admin_api_key: "admin-secret".to_string(),
            error_tracker_url: "http://127.0.0.1:1".to_string(),
            error_tracker_api_key: "x".to_string(),
            metrics_collector_url: "http://127.0.0.1:1".to_string(),
            metrics_collector_api_key: "x".to_string(),
            cors_origins: vec!["https://a".to_string(), "https://b".to_string()],
            database_path: "unused".to_string(),
            max_body_size: 64 * 1024,
            rate_limit: 200,
            retention_days: 90,
            port: 8083,
        }),
        limiter: Arc::new(RateLimiter::new(200, Duration::from_secs(60))),
    }
}

fn router(state: AppState) -> Router {
    app(state)
}

#[tokio::test]
async fn admin_route_rejects_missing_api_key() {
    let app = router(test_state().await);
    let req = Request::builder()
        .method("GET")
        .uri("/api/dsn-keys")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_route_accepts_api_key() {
    let app = router(test_state().await);
    let req = Request::builder()
        .method("GET")
        .uri("/api/dsn-keys")
        .header("x-api-key", "admin-secret")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

/// Testable property 9: admin credentials on a browser route are rejected.
#[tokio::test]
async fn browser_route_rejects_admin_api_key() {
    let app = router(test_state().await);
    let req = Request::builder()
        .method("POST")
        .uri("/api/browser/errors")
        .header("x-api-key", "admin-secret")
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

/// Testable property 9, other direction: `X-Monlight-Key` on an admin
/// route is not a substitute for `X-API-Key`.
#[tokio::test]
async fn admin_route_rejects_monlight_key() {
    let app = router(test_state().await);
    let req = Request::builder()
        .method("GET")
        .uri("/api/dsn-keys")
        .header("x-monlight-key", "deadbeef")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

/// Testable property 10.
#[tokio::test]
async fn cors_preflight_echoes_allowed_origin() {
    let app = router(test_state().await);
    let req = Request::builder()
        .method("OPTIONS")
        .uri("/api/browser/errors")
        .header("origin", "https://a")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        resp.headers().get("access-control-allow-origin").unwrap(),
        "https://a"
    );
}

#[tokio::test]
async fn cors_preflight_from_disallowed_origin_has_no_header() {
    let app = router(test_state().await);
    let req = Request::builder()
        .method("OPTIONS")
        .uri("/api/browser/errors")
        .header("origin", "https://c")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(resp.headers().get("access-control-allow-origin").is_none());
}

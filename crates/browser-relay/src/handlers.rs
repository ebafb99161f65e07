//! Browser-facing ingestion handlers (spec §4.6): error reports and
//! metric batches, both resolved against a DSN project then forwarded
//! upstream.

use std::collections::HashMap;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use monlight_core::error::{AppError, AppResult};
use monlight_core::time::now_iso;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;

use crate::sourcemap;
use crate::stack::{self, ResolvedMap};
use crate::vlq::{self, MappingEntry};
use crate::{dsn, forward, AppState};

async fn resolve_dsn_project(pool: &SqlitePool, headers: &HeaderMap) -> AppResult<String> {
    let key = headers
        .get("x-monlight-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if key.is_empty() {
        return Err(AppError::Unauthorized("missing X-Monlight-Key".to_string()));
    }
    dsn::resolve_project(pool, key)
        .await?
        .ok_or_else(|| AppError::Unauthorized("invalid or inactive key".to_string()))
}

fn strip_to_path(url: &str) -> String {
    let without_scheme = match url.find("://") {
        Some(idx) => &url[idx + 3..],
        None => url,
    };
    let path_start = without_scheme.find('/').unwrap_or(without_scheme.len());
    let path = &without_scheme[path_start..];
    let end = path.find(['?', '#']).unwrap_or(path.len());
    if path.is_empty() { "/".to_string() } else { path[..end].to_string() }
}

#[derive(Debug, Deserialize)]
pub struct BrowserErrorRequest {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
    pub stack: String,
    pub url: Option<String>,
    pub user_agent: Option<String>,
    pub session_id: Option<String>,
    pub release: Option<String>,
    pub timestamp: Option<String>,
    pub environment: Option<String>,
    pub context: Option<Value>,
}

struct MapCache {
    decoded: HashMap<String, (Vec<MappingEntry>, Vec<String>, Vec<String>)>,
}

async fn rewrite_stack(
    pool: &SqlitePool,
    project: &str,
    release: &str,
    stack_text: &str,
) -> AppResult<String> {
    let mut cache = MapCache { decoded: HashMap::new() };
    let mut missing: Vec<String> = Vec::new();

    // First pass: figure out which file_urls the stack references so we
    // can fetch+decode each source map at most once per request.
    for line in stack_text.lines() {
        let Some(frame) = stack::parse_frame(line) else { continue };
        let normalized = stack::normalize_file_url(&frame.file_url);
        if cache.decoded.contains_key(&normalized) || missing.contains(&normalized) {
            continue;
        }
        missing.push(normalized);
    }
    for file_url in missing {
        if let Some(content) =
            sourcemap::fetch_content(pool, project, release, &file_url).await?
        {
            let parsed: Value = match serde_json::from_str(&content) {
                Ok(v) => v,
                Err(_) => continue,
            };
            let mappings = parsed.get("mappings").and_then(|v| v.as_str()).unwrap_or("");
            let sources: Vec<String> = parsed
                .get("sources")
                .and_then(|v| v.as_array())
                .map(|arr| arr.iter().filter_map(|s| s.as_str().map(String::from)).collect())
                .unwrap_or_default();
            let names: Vec<String> = parsed
                .get("names")
                .and_then(|v| v.as_array())
                .map(|arr| arr.iter().filter_map(|s| s.as_str().map(String::from)).collect())
                .unwrap_or_default();
            let entries = vlq::decode_mappings(mappings);
            cache.decoded.insert(file_url, (entries, sources, names));
        }
    }

    Ok(stack::rewrite(stack_text, |file_url| {
        cache.decoded.get(file_url).map(|(entries, sources, names)| ResolvedMap {
            entries,
            sources,
            names,
        })
    }))
}

pub async fn ingest_browser_error(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<BrowserErrorRequest>,
) -> impl IntoResponse {
    match handle_browser_error(state, &headers, req).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn handle_browser_error(
    state: AppState,
    headers: &HeaderMap,
    req: BrowserErrorRequest,
) -> AppResult<Value> {
    if req.error_type.trim().is_empty() || req.message.trim().is_empty() || req.stack.trim().is_empty() {
        return Err(AppError::Validation(
            "type, message, and stack are required".to_string(),
        ));
    }
    let project = resolve_dsn_project(&state.pool, headers).await?;

    let traceback = match &req.release {
        Some(release) => rewrite_stack(&state.pool, &project, release, &req.stack).await?,
        None => req.stack.clone(),
    };

    let payload = serde_json::json!({
        "project": project,
        "exception_type": req.error_type,
        "message": req.message,
        "traceback": traceback,
        "environment": req.environment.unwrap_or_else(|| "prod".to_string()),
        "request_url": req.url,
        "request_method": "BROWSER",
        "extra": {
            "user_agent": req.user_agent,
            "session_id": req.session_id,
            "release": req.release,
            "timestamp": req.timestamp,
            "context": req.context,
        },
    });

    // DB handle (a pooled connection only, never held open) is not
    // borrowed past this point; the upstream call happens with no
    // outstanding transaction.
    forward::to_error_tracker(
        &state.config.error_tracker_url,
        &state.config.error_tracker_api_key,
        payload,
    )
    .await
}

#[derive(Debug, Deserialize)]
pub struct BrowserMetricPoint {
    pub name: String,
    #[serde(rename = "type")]
    pub metric_type: String,
    pub value: f64,
    pub labels: Option<HashMap<String, Value>>,
    pub timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BrowserMetricsRequest {
    pub metrics: Vec<BrowserMetricPoint>,
    pub session_id: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
struct AcceptedResponse {
    status: &'static str,
    count: usize,
}

pub async fn ingest_browser_metrics(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<BrowserMetricsRequest>,
) -> impl IntoResponse {
    match handle_browser_metrics(state, &headers, req).await {
        Ok(count) => (StatusCode::ACCEPTED, Json(AcceptedResponse { status: "accepted", count })).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn handle_browser_metrics(
    state: AppState,
    headers: &HeaderMap,
    req: BrowserMetricsRequest,
) -> AppResult<usize> {
    if req.metrics.is_empty() {
        return Err(AppError::Validation("metrics must be non-empty".to_string()));
    }
    let project = resolve_dsn_project(&state.pool, headers).await?;
    let page = req.url.as_deref().map(strip_to_path);

    let points: Vec<Value> = req
        .metrics
        .into_iter()
        .map(|point| {
            let mut labels = point.labels.unwrap_or_default();
            labels.insert("project".to_string(), Value::String(project.clone()));
            labels.insert("source".to_string(), Value::String("browser".to_string()));
            if let Some(page) = &page {
                labels.insert("page".to_string(), Value::String(page.clone()));
            }
            serde_json::json!({
                "name": point.name,
                "type": point.metric_type,
                "value": point.value,
                "labels": labels,
                "timestamp": point.timestamp.unwrap_or_else(now_iso),
            })
        })
        .collect();
    let count = points.len();

    let payload = serde_json::json!({ "metrics": points });
    forward::to_metrics_collector(
        &state.config.metrics_collector_url,
        &state.config.metrics_collector_api_key,
        payload,
    )
    .await?;
    Ok(count)
}

pub use dsn::CreateDsnRequest;

pub async fn create_dsn_key(
    State(state): State<AppState>,
    Json(req): Json<CreateDsnRequest>,
) -> AppResult<impl IntoResponse> {
    let key = dsn::create(&state.pool, &req).await?;
    Ok((StatusCode::CREATED, Json(key)))
}

pub async fn list_dsn_keys(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let keys = dsn::list(&state.pool).await?;
    Ok(Json(keys))
}

pub async fn deactivate_dsn_key(
    State(state): State<AppState>,
    axum::extract::Path(id): axum::extract::Path<i64>,
) -> AppResult<impl IntoResponse> {
    if !dsn::deactivate(&state.pool, id).await? {
        return Err(AppError::NotFound("dsn key not found".to_string()));
    }
    Ok(Json(serde_json::json!({ "status": "deactivated", "id": id })))
}

pub async fn upload_source_map(
    State(state): State<AppState>,
    Json(req): Json<sourcemap::UploadSourceMapRequest>,
) -> AppResult<impl IntoResponse> {
    let row = sourcemap::upsert(&state.pool, &req).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn list_source_maps(
    State(state): State<AppState>,
    axum::extract::Query(q): axum::extract::Query<HashMap<String, String>>,
) -> AppResult<impl IntoResponse> {
    let rows = sourcemap::list(&state.pool, q.get("project").map(String::as_str)).await?;
    Ok(Json(rows))
}

pub async fn delete_source_map(
    State(state): State<AppState>,
    axum::extract::Path(id): axum::extract::Path<i64>,
) -> AppResult<impl IntoResponse> {
    if !sourcemap::delete(&state.pool, id).await? {
        return Err(AppError::NotFound("source map not found".to_string()));
    }
    Ok(Json(serde_json::json!({ "status": "deleted", "id": id })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sourcemap::UploadSourceMapRequest;

    #[test]
    fn strips_query_and_fragment_from_page_url() {
        assert_eq!(strip_to_path("https://app.example.com/dash?x=1#y"), "/dash");
        assert_eq!(strip_to_path("https://app.example.com/"), "/");
    }

    async fn test_pool() -> SqlitePool {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handlers.db");
        std::mem::forget(dir);
        let pool = monlight_core::storage::open_db(path.to_str().unwrap())
            .await
            .unwrap();
        monlight_core::storage::run_migrations(&pool, crate::db::MIGRATIONS)
            .await
            .unwrap();
        pool
    }

    #[tokio::test]
    async fn rewrites_frame_using_uploaded_source_map() {
        let pool = test_pool().await;
        sourcemap::upsert(
            &pool,
            &UploadSourceMapRequest {
                project: "acme".to_string(),
                release: "1.0.0".to_string(),
                file_url: "/static/app.js".to_string(),
                map_content: serde_json::json!({
                    "version": 3,
                    "sources": ["app.ts"],
                    "names": ["fn"],
                    "mappings": "AAAAA"
                }),
            },
        )
        .await
        .unwrap();

        let stack = "TypeError: boom\n    at foo (https://cdn.example.com/static/app.js:1:1)";
        let rewritten = rewrite_stack(&pool, "acme", "1.0.0", stack).await.unwrap();
        assert_eq!(
            rewritten,
            "TypeError: boom\n    at fn (app.ts:1:1)"
        );
    }

    #[tokio::test]
    async fn rewrite_leaves_frame_untouched_without_a_matching_map() {
        let pool = test_pool().await;
        let stack = "    at foo (https://cdn.example.com/static/missing.js:1:1)";
        let rewritten = rewrite_stack(&pool, "acme", "1.0.0", stack).await.unwrap();
        assert_eq!(rewritten, stack);
    }
}

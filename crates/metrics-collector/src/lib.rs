pub mod config;
pub mod dashboard;
pub mod db;
pub mod ingest;
pub mod percentile;
pub mod query;
pub mod retention;
pub mod rollup;

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use monlight_core::error::AppError;
use monlight_core::gates::{check_api_key, check_content_length, RateLimiter};
use sqlx::SqlitePool;

pub use config::Config;

const MAX_BODY_BYTES: usize = 512 * 1024;
const RATE_LIMIT: usize = 500;
const RATE_WINDOW: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<Config>,
    pub limiter: Arc<RateLimiter>,
}

pub async fn build_state_from_env() -> anyhow::Result<AppState> {
    let config = Config::from_env()?;
    let pool = monlight_core::storage::open_db(&config.database_path).await?;
    monlight_core::storage::run_migrations(&pool, db::MIGRATIONS).await?;
    Ok(AppState {
        pool,
        config: Arc::new(config),
        limiter: Arc::new(RateLimiter::new(RATE_LIMIT, RATE_WINDOW)),
    })
}

async fn gate(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<axum::response::Response, AppError> {
    check_api_key(req.headers(), &state.config.api_key)?;
    check_content_length(req.headers(), MAX_BODY_BYTES)?;
    state.limiter.admit(Instant::now())?;
    Ok(next.run(req).await)
}

async fn ingest_handler(
    State(state): State<AppState>,
    Json(batch): Json<ingest::IngestBatch>,
) -> impl IntoResponse {
    match ingest::ingest_batch(&state.pool, &batch).await {
        Ok(resp) => (StatusCode::ACCEPTED, Json(resp)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn app(state: AppState) -> Router {
    let gated = Router::new()
        .route("/api/metrics", get(query::get_metrics).post(ingest_handler))
        .route("/api/dashboard", get(dashboard::get_dashboard))
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn_with_state(state.clone(), gate));

    Router::new()
        .route("/health", get(monlight_core::health::health_handler))
        .merge(gated)
        .with_state(state)
}

pub mod alerts;
pub mod config;
pub mod db;
pub mod fingerprint;
pub mod ingest;
pub mod retention;
pub mod routes;

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::routing::{get, post};
use axum::Router;
use monlight_core::error::AppError;
use monlight_core::gates::{check_api_key, check_content_length, RateLimiter};
use sqlx::SqlitePool;

pub use config::Config;

const MAX_BODY_BYTES: usize = 64 * 1024;
const RATE_LIMIT: usize = 100;
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

pub fn app(state: AppState) -> Router {
    let gated = Router::new()
        .route("/api/errors", get(routes::list_errors).post(routes::ingest))
        .route("/api/errors/:id", get(routes::get_error))
        .route("/api/errors/:id/resolve", post(routes::resolve))
        .route("/api/projects", get(routes::list_projects))
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn_with_state(state.clone(), gate));

    Router::new()
        .route("/health", get(monlight_core::health::health_handler))
        .merge(gated)
        .with_state(state)
}

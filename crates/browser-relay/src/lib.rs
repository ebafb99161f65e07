pub mod config;
pub mod cors;
pub mod db;
pub mod dsn;
pub mod forward;
pub mod handlers;
pub mod retention;
pub mod sourcemap;
pub mod stack;
pub mod vlq;

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::routing::get;
use axum::Router;
use monlight_core::error::AppError;
use monlight_core::gates::{check_content_length, constant_time_eq, RateLimiter};
use sqlx::SqlitePool;

pub use config::Config;

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
    let rate_limit = config.rate_limit;
    Ok(AppState {
        pool,
        config: Arc::new(config),
        limiter: Arc::new(RateLimiter::new(rate_limit, RATE_WINDOW)),
    })
}

/// Admin routes (`/api/dsn-keys`, `/api/source-maps`) require `X-API-Key`
/// and reject `X-Monlight-Key`; browser routes are the reverse (testable
/// property 9). Keeping the two auth schemes in separate middleware
/// functions means a route can never accidentally accept both.
async fn admin_gate(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<axum::response::Response, AppError> {
    let provided = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if provided.is_empty() || !constant_time_eq(provided, &state.config.admin_api_key) {
        return Err(AppError::Unauthorized("Invalid API key".to_string()));
    }
    state.limiter.admit(Instant::now())?;
    Ok(next.run(req).await)
}

/// Browser routes authenticate via `X-Monlight-Key` resolved against
/// `dsn_keys` inside the handler itself (it needs the resolved project),
/// so this gate only enforces body size and rate limiting.
async fn browser_gate(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<axum::response::Response, AppError> {
    if req.headers().get("x-api-key").is_some() {
        return Err(AppError::Unauthorized(
            "admin credentials not accepted here".to_string(),
        ));
    }
    check_content_length(req.headers(), state.config.max_body_size)?;
    state.limiter.admit(Instant::now())?;
    Ok(next.run(req).await)
}

const SOURCE_MAP_BODY_LIMIT: usize = 5 * 1024 * 1024;

pub fn app(state: AppState) -> Router {
    let max_body_size = state.config.max_body_size;

    let dsn_routes = Router::new()
        .route(
            "/api/dsn-keys",
            get(handlers::list_dsn_keys).post(handlers::create_dsn_key),
        )
        .route("/api/dsn-keys/:id", axum::routing::delete(handlers::deactivate_dsn_key))
        .route("/api/source-maps/:id", axum::routing::delete(handlers::delete_source_map))
        .route("/api/source-maps", get(handlers::list_source_maps))
        .layer(axum::extract::DefaultBodyLimit::max(max_body_size));

    let source_map_upload = Router::new()
        .route("/api/source-maps", axum::routing::post(handlers::upload_source_map))
        .layer(axum::extract::DefaultBodyLimit::max(SOURCE_MAP_BODY_LIMIT));

    let admin = dsn_routes
        .merge(source_map_upload)
        .layer(middleware::from_fn_with_state(state.clone(), admin_gate));

    let browser = Router::new()
        .route("/api/browser/errors", axum::routing::post(handlers::ingest_browser_error))
        .route("/api/browser/metrics", axum::routing::post(handlers::ingest_browser_metrics))
        .layer(axum::extract::DefaultBodyLimit::max(max_body_size))
        .layer(middleware::from_fn_with_state(state.clone(), browser_gate))
        .layer(middleware::from_fn_with_state(state.clone(), cors::layer));

    Router::new()
        .route("/health", get(monlight_core::health::health_handler))
        .merge(admin)
        .merge(browser)
        .with_state(state)
}

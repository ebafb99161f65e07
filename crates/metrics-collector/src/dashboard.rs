//! `GET /api/dashboard` (spec §4.5): pre-formatted series for request
//! rate, latency percentiles, error rate, and the top-10 endpoints, read
//! from the `http_requests_total` counter and the
//! `http_request_duration_seconds` histogram.

use axum::extract::{Query, State};
use axum::Json;
use monlight_core::error::AppResult;
use serde::{Deserialize, Serialize};

use crate::query::parse_period_seconds;
use crate::AppState;

const REQUEST_COUNTER: &str = "http_requests_total";
const LATENCY_HISTOGRAM: &str = "http_request_duration_seconds";

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub period: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SeriesPoint {
    pub bucket: String,
    pub value: f64,
}

#[derive(Debug, Serialize)]
pub struct LatencyPoint {
    pub bucket: String,
    pub p50: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct EndpointCount {
    pub endpoint: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub request_rate: Vec<SeriesPoint>,
    pub latency_percentiles: Vec<LatencyPoint>,
    pub error_rate: Vec<SeriesPoint>,
    pub top_endpoints: Vec<EndpointCount>,
}

pub async fn get_dashboard(
    State(state): State<AppState>,
    Query(q): Query<DashboardQuery>,
) -> AppResult<Json<DashboardResponse>> {
    let period_seconds = parse_period_seconds(&q.period)?;
    let resolution = if period_seconds <= 86_400 { "minute" } else { "hour" };
    let cutoff = monlight_core::time::format_iso(
        chrono::Utc::now() - chrono::Duration::seconds(period_seconds),
    );

    let request_rate: Vec<(String, i64)> = sqlx::query_as(
        "SELECT bucket, count FROM metrics_aggregated
         WHERE name = ?1 AND resolution = ?2 AND bucket >= ?3 ORDER BY bucket ASC",
    )
    .bind(REQUEST_COUNTER)
    .bind(resolution)
    .bind(&cutoff)
    .fetch_all(&state.pool)
    .await?;

    let latency_percentiles: Vec<(String, Option<f64>, Option<f64>, Option<f64>)> = sqlx::query_as(
        "SELECT bucket, p50, p95, p99 FROM metrics_aggregated
         WHERE name = ?1 AND resolution = ?2 AND bucket >= ?3 ORDER BY bucket ASC",
    )
    .bind(LATENCY_HISTOGRAM)
    .bind(resolution)
    .bind(&cutoff)
    .fetch_all(&state.pool)
    .await?;

    let error_rate: Vec<(String, i64)> = sqlx::query_as(
        "SELECT bucket, count FROM metrics_aggregated
         WHERE name = ?1 AND resolution = ?2 AND bucket >= ?3
           AND json_extract(labels, '$.status') >= '500' ORDER BY bucket ASC",
    )
    .bind(REQUEST_COUNTER)
    .bind(resolution)
    .bind(&cutoff)
    .fetch_all(&state.pool)
    .await?;

    let top_endpoints: Vec<(String, i64)> = sqlx::query_as(
        "SELECT json_extract(labels, '$.endpoint') AS endpoint, SUM(count) AS total
         FROM metrics_aggregated
         WHERE name = ?1 AND resolution = ?2 AND bucket >= ?3
         GROUP BY endpoint ORDER BY total DESC LIMIT 10",
    )
    .bind(REQUEST_COUNTER)
    .bind(resolution)
    .bind(&cutoff)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(DashboardResponse {
        request_rate: request_rate
            .into_iter()
            .map(|(bucket, value)| SeriesPoint { bucket, value: value as f64 })
            .collect(),
        latency_percentiles: latency_percentiles
            .into_iter()
            .map(|(bucket, p50, p95, p99)| LatencyPoint { bucket, p50, p95, p99 })
            .collect(),
        error_rate: error_rate
            .into_iter()
            .map(|(bucket, value)| SeriesPoint { bucket, value: value as f64 })
            .collect(),
        top_endpoints: top_endpoints
            .into_iter()
            .map(|(endpoint, count)| EndpointCount { endpoint, count })
            .collect(),
    }))
}

//! Upstream HTTP forwarding to error-tracker and metrics-collector (spec
//! §5): the DB handle for the current request must be dropped before
//! either call so a slow upstream never holds a SQLite connection open.

use std::time::Duration;

use monlight_core::error::{AppError, AppResult};
use serde_json::Value;

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(5);

async fn post_json(url: &str, api_key: &str, body: &Value) -> AppResult<Value> {
    let client = reqwest::Client::builder()
        .timeout(UPSTREAM_TIMEOUT)
        .build()
        .map_err(|err| AppError::Upstream(err.to_string()))?;

    let response = client
        .post(url)
        .header("X-API-Key", api_key)
        .json(body)
        .send()
        .await
        .map_err(|err| AppError::Upstream(err.to_string()))?;

    if !response.status().is_success() {
        return Err(AppError::Upstream(format!(
            "upstream returned {}",
            response.status()
        )));
    }

    response
        .json::<Value>()
        .await
        .map_err(|err| AppError::Upstream(err.to_string()))
}

pub async fn to_error_tracker(base_url: &str, api_key: &str, payload: Value) -> AppResult<Value> {
    let url = format!("{}/api/errors", base_url.trim_end_matches('/'));
    post_json(&url, api_key, &payload).await
}

pub async fn to_metrics_collector(base_url: &str, api_key: &str, payload: Value) -> AppResult<Value> {
    let url = format!("{}/api/metrics", base_url.trim_end_matches('/'));
    post_json(&url, api_key, &payload).await
}

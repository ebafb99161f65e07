//! Batch ingest (spec §4.5): up to 1000 points per request, canonical
//! (lexicographically key-sorted) label JSON so rollup grouping is
//! deterministic, prepared-once bound-and-reset insert in one
//! transaction.

use monlight_core::error::AppError;
use monlight_core::time::now_iso;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

const MAX_BATCH: usize = 1000;
const MAX_NAME_LEN: usize = 200;

#[derive(Debug, Deserialize)]
pub struct MetricPoint {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: f64,
    pub labels: Option<serde_json::Map<String, serde_json::Value>>,
    pub timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IngestBatch {
    pub metrics: Vec<MetricPoint>,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub status: &'static str,
    pub count: usize,
}

/// Serializes labels with keys sorted lexicographically so two payloads
/// carrying the same label set always hash to the same text, which is
/// what rollup grouping and the `(resolution, bucket, name, labels)`
/// uniqueness key both depend on.
pub fn canonical_labels(labels: &Option<serde_json::Map<String, serde_json::Value>>) -> String {
    match labels {
        None => "{}".to_string(),
        Some(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = serde_json::Map::new();
            for k in keys {
                sorted.insert(k.clone(), map[k].clone());
            }
            serde_json::Value::Object(sorted).to_string()
        }
    }
}

fn validate(point: &MetricPoint) -> Result<(), AppError> {
    if point.name.is_empty() || point.name.len() > MAX_NAME_LEN {
        return Err(AppError::Validation(
            "name must be 1-200 chars".to_string(),
        ));
    }
    if !matches!(point.kind.as_str(), "counter" | "histogram" | "gauge") {
        return Err(AppError::Validation(
            "type must be counter, histogram, or gauge".to_string(),
        ));
    }
    if !point.value.is_finite() {
        return Err(AppError::Validation("value must be finite".to_string()));
    }
    Ok(())
}

pub async fn ingest_batch(pool: &SqlitePool, batch: &IngestBatch) -> Result<IngestResponse, AppError> {
    if batch.metrics.is_empty() {
        return Err(AppError::Validation("metrics must not be empty".to_string()));
    }
    if batch.metrics.len() > MAX_BATCH {
        return Err(AppError::Validation(format!(
            "at most {MAX_BATCH} metrics per batch"
        )));
    }
    for point in &batch.metrics {
        validate(point)?;
    }

    let mut tx = pool.begin().await?;
    for point in &batch.metrics {
        let timestamp = point.timestamp.clone().unwrap_or_else(now_iso);
        let labels = canonical_labels(&point.labels);
        sqlx::query(
            "INSERT INTO metrics_raw (timestamp, name, labels, value, type)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&timestamp)
        .bind(&point.name)
        .bind(&labels)
        .bind(point.value)
        .bind(&point.kind)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(IngestResponse { status: "accepted", count: batch.metrics.len() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_labels_sorts_keys() {
        let mut map = serde_json::Map::new();
        map.insert("b".to_string(), serde_json::json!(2));
        map.insert("a".to_string(), serde_json::json!(1));
        let text = canonical_labels(&Some(map));
        assert_eq!(text, r#"{"a":1,"b":2}"#);
    }

    #[test]
    fn no_labels_is_empty_object() {
        assert_eq!(canonical_labels(&None), "{}");
    }
}

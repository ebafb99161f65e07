//! `GET /api/metrics` (spec §4.5): `resolution=auto` picks `minute` for
//! periods of 24h or less, else `hour`; `labels=k:v,k2:v2` filters via
//! `json_extract`.

use axum::extract::{Query, State};
use axum::Json;
use monlight_core::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
    pub name: String,
    pub period: Option<String>,
    pub resolution: Option<String>,
    pub labels: Option<String>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct MetricPointOut {
    pub bucket: String,
    pub count: i64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub p50: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
}

/// Parses `30s`, `5m`, `2h`, `7d` style durations; defaults to `1h`.
pub fn parse_period_seconds(period: &Option<String>) -> Result<i64, AppError> {
    let Some(period) = period else { return Ok(3600) };
    let period = period.trim();
    if period.is_empty() {
        return Ok(3600);
    }
    let (digits, unit) = period.split_at(period.len() - 1);
    let amount: i64 = digits
        .parse()
        .map_err(|_| AppError::Validation(format!("invalid period '{period}'")))?;
    let multiplier = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86_400,
        _ => return Err(AppError::Validation(format!("invalid period unit in '{period}'"))),
    };
    Ok(amount * multiplier)
}

fn resolve_resolution(resolution: &Option<String>, period_seconds: i64) -> String {
    match resolution.as_deref() {
        Some("minute") => "minute".to_string(),
        Some("hour") => "hour".to_string(),
        _ => {
            if period_seconds <= 86_400 {
                "minute".to_string()
            } else {
                "hour".to_string()
            }
        }
    }
}

/// Parses `k:v,k2:v2` into pairs, used to build `json_extract` predicates.
fn parse_labels(labels: &str) -> Vec<(String, String)> {
    labels
        .split(',')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, ':');
            let key = parts.next()?.trim();
            let value = parts.next()?.trim();
            if key.is_empty() {
                None
            } else {
                Some((key.to_string(), value.to_string()))
            }
        })
        .collect()
}

pub async fn get_metrics(
    State(state): State<AppState>,
    Query(q): Query<MetricsQuery>,
) -> AppResult<Json<Vec<MetricPointOut>>> {
    let period_seconds = parse_period_seconds(&q.period)?;
    let resolution = resolve_resolution(&q.resolution, period_seconds);
    let cutoff = monlight_core::time::format_iso(
        chrono::Utc::now() - chrono::Duration::seconds(period_seconds),
    );

    let label_pairs = q.labels.as_deref().map(parse_labels).unwrap_or_default();
    for (key, _) in &label_pairs {
        if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(AppError::Validation(format!("invalid label key '{key}'")));
        }
    }

    let mut sql = String::from(
        "SELECT bucket, count, sum, min, max, avg, p50, p95, p99 FROM metrics_aggregated
         WHERE name = ?1 AND resolution = ?2 AND bucket >= ?3",
    );
    let mut bind_index = 4;
    for (key, _) in &label_pairs {
        sql.push_str(&format!(" AND json_extract(labels, '$.{key}') = ?{bind_index}"));
        bind_index += 1;
    }
    sql.push_str(" ORDER BY bucket ASC");

    let mut query = sqlx::query_as::<_, MetricPointOut>(&sql)
        .bind(&q.name)
        .bind(&resolution)
        .bind(&cutoff);
    for (_, value) in &label_pairs {
        query = query.bind(value);
    }

    let rows = query.fetch_all(&state.pool).await?;
    Ok(Json(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_period_units() {
        assert_eq!(parse_period_seconds(&Some("30s".to_string())).unwrap(), 30);
        assert_eq!(parse_period_seconds(&Some("5m".to_string())).unwrap(), 300);
        assert_eq!(parse_period_seconds(&Some("2h".to_string())).unwrap(), 7200);
        assert_eq!(parse_period_seconds(&Some("7d".to_string())).unwrap(), 604_800);
        assert_eq!(parse_period_seconds(&None).unwrap(), 3600);
    }

    #[test]
    fn resolution_auto_switches_at_24h() {
        assert_eq!(resolve_resolution(&None, 3600), "minute");
        assert_eq!(resolve_resolution(&None, 86_400), "minute");
        assert_eq!(resolve_resolution(&None, 86_401), "hour");
    }

    #[test]
    fn parses_comma_separated_label_pairs() {
        let pairs = parse_labels("region:us,tier:gold");
        assert_eq!(
            pairs,
            vec![
                ("region".to_string(), "us".to_string()),
                ("tier".to_string(), "gold".to_string())
            ]
        );
    }
}

//! Hourly rollup worker (spec §4.5): every hour, merge the minute rows
//! in each prior hour bucket. Percentiles are a weighted-average
//! approximation of the minute percentiles, not a recomputation over raw
//! samples.

use monlight_core::time::now_iso;
use sqlx::SqlitePool;

use crate::percentile::weighted_average;

pub async fn run_once(pool: &SqlitePool) -> anyhow::Result<usize> {
    let current_bucket = hour_bucket(&now_iso());
    let last_bucket: Option<String> = sqlx::query_scalar(
        "SELECT last_bucket FROM rollup_state WHERE resolution = 'hour'",
    )
    .fetch_optional(pool)
    .await?;

    let pending: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT substr(bucket, 1, 13) || ':00:00Z' AS hour
         FROM metrics_aggregated
         WHERE resolution = 'minute'
           AND substr(bucket, 1, 13) || ':00:00Z' < ?1
           AND (?2 IS NULL OR substr(bucket, 1, 13) || ':00:00Z' > ?2)
         ORDER BY hour ASC",
    )
    .bind(&current_bucket)
    .bind(&last_bucket)
    .fetch_all(pool)
    .await?;

    let mut written = 0;
    let mut latest = last_bucket;
    for hour in pending {
        written += aggregate_hour(pool, &hour).await?;
        latest = Some(hour);
    }

    if let Some(hour) = latest {
        sqlx::query(
            "INSERT INTO rollup_state (resolution, last_bucket) VALUES ('hour', ?1)
             ON CONFLICT(resolution) DO UPDATE SET last_bucket = excluded.last_bucket",
        )
        .bind(hour)
        .execute(pool)
        .await?;
    }

    Ok(written)
}

#[derive(sqlx::FromRow)]
struct MinuteRow {
    name: String,
    labels: String,
    count: i64,
    sum: f64,
    min: f64,
    max: f64,
    p50: Option<f64>,
    p95: Option<f64>,
    p99: Option<f64>,
}

async fn aggregate_hour(pool: &SqlitePool, hour: &str) -> anyhow::Result<usize> {
    let rows: Vec<MinuteRow> = sqlx::query_as(
        "SELECT name, labels, count, sum, min, max, p50, p95, p99
         FROM metrics_aggregated
         WHERE resolution = 'minute' AND substr(bucket, 1, 13) || ':00:00Z' = ?1",
    )
    .bind(hour)
    .fetch_all(pool)
    .await?;

    use std::collections::HashMap;
    let mut groups: HashMap<(String, String), Vec<MinuteRow>> = HashMap::new();
    for row in rows {
        groups
            .entry((row.name.clone(), row.labels.clone()))
            .or_default()
            .push(row);
    }

    let mut written = 0;
    for ((name, labels), rows) in groups {
        let count: i64 = rows.iter().map(|r| r.count).sum();
        let sum: f64 = rows.iter().map(|r| r.sum).sum();
        let min = rows.iter().map(|r| r.min).fold(f64::INFINITY, f64::min);
        let max = rows.iter().map(|r| r.max).fold(f64::NEG_INFINITY, f64::max);
        let avg = if count > 0 { sum / count as f64 } else { 0.0 };

        let p50 = merge_percentile(&rows, |r| r.p50);
        let p95 = merge_percentile(&rows, |r| r.p95);
        let p99 = merge_percentile(&rows, |r| r.p99);

        sqlx::query(
            "INSERT INTO metrics_aggregated
             (bucket, resolution, name, labels, count, sum, min, max, avg, p50, p95, p99)
             VALUES (?1, 'hour', ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(resolution, bucket, name, labels)
             DO UPDATE SET count = excluded.count, sum = excluded.sum, min = excluded.min,
                 max = excluded.max, avg = excluded.avg, p50 = excluded.p50,
                 p95 = excluded.p95, p99 = excluded.p99",
        )
        .bind(hour)
        .bind(&name)
        .bind(&labels)
        .bind(count)
        .bind(sum)
        .bind(min)
        .bind(max)
        .bind(avg)
        .bind(p50)
        .bind(p95)
        .bind(p99)
        .execute(pool)
        .await?;
        written += 1;
    }
    Ok(written)
}

fn merge_percentile(rows: &[MinuteRow], pick: impl Fn(&MinuteRow) -> Option<f64>) -> Option<f64> {
    let pairs: Vec<(f64, i64)> = rows
        .iter()
        .filter_map(|r| pick(r).map(|v| (v, r.count)))
        .collect();
    if pairs.is_empty() {
        None
    } else {
        Some(weighted_average(&pairs))
    }
}

fn hour_bucket(iso: &str) -> String {
    format!("{}:00:00Z", &iso[0..13])
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool() -> SqlitePool {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.db");
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
    async fn merges_minute_rows_into_one_hour_row() {
        let pool = test_pool().await;
        for (minute, count, sum) in [("00", 10, 100.0), ("01", 20, 400.0)] {
            sqlx::query(
                "INSERT INTO metrics_aggregated
                 (bucket, resolution, name, labels, count, sum, min, max, avg, p50, p95, p99)
                 VALUES (?1, 'minute', 'req', '{}', ?2, ?3, 1.0, 50.0, ?4, 10.0, 40.0, 49.0)",
            )
            .bind(format!("2020-01-01T00:{minute}:00Z"))
            .bind(count)
            .bind(sum)
            .bind(sum / count as f64)
            .execute(&pool)
            .await
            .unwrap();
        }

        let written = run_once(&pool).await.unwrap();
        assert_eq!(written, 1);

        let row: (i64, f64) = sqlx::query_as(
            "SELECT count, sum FROM metrics_aggregated WHERE resolution = 'hour'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(row.0, 30);
        assert_eq!(row.1, 500.0);
    }
}

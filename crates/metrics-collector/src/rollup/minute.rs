//! Minute rollup worker (spec §4.5): every `AGGREGATION_INTERVAL` seconds,
//! aggregate any minute bucket strictly older than the current minute
//! that hasn't been rolled up yet.

use monlight_core::time::now_iso;
use sqlx::SqlitePool;

use crate::percentile;
use crate::rollup::group_points;

/// Runs one rollup pass; returns the number of `(bucket, group)` rows
/// written.
pub async fn run_once(pool: &SqlitePool) -> anyhow::Result<usize> {
    let current_bucket = minute_bucket(&now_iso());
    let last_bucket: Option<String> = sqlx::query_scalar(
        "SELECT last_bucket FROM rollup_state WHERE resolution = 'minute'",
    )
    .fetch_optional(pool)
    .await?;

    let pending: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT substr(timestamp, 1, 16) || ':00Z' AS bucket
         FROM metrics_raw
         WHERE substr(timestamp, 1, 16) || ':00Z' < ?1
           AND (?2 IS NULL OR substr(timestamp, 1, 16) || ':00Z' > ?2)
         ORDER BY bucket ASC",
    )
    .bind(&current_bucket)
    .bind(&last_bucket)
    .fetch_all(pool)
    .await?;

    let mut written = 0;
    let mut latest = last_bucket;
    for bucket in pending {
        written += aggregate_bucket(pool, &bucket).await?;
        latest = Some(bucket);
    }

    if let Some(bucket) = latest {
        sqlx::query(
            "INSERT INTO rollup_state (resolution, last_bucket) VALUES ('minute', ?1)
             ON CONFLICT(resolution) DO UPDATE SET last_bucket = excluded.last_bucket",
        )
        .bind(bucket)
        .execute(pool)
        .await?;
    }

    Ok(written)
}

async fn aggregate_bucket(pool: &SqlitePool, bucket: &str) -> anyhow::Result<usize> {
    let rows: Vec<(String, String, f64, String)> = sqlx::query_as(
        "SELECT name, labels, value, type FROM metrics_raw
         WHERE substr(timestamp, 1, 16) || ':00Z' = ?1",
    )
    .bind(bucket)
    .fetch_all(pool)
    .await?;

    let groups = group_points(rows);
    let mut written = 0;
    for ((name, labels), mut agg) in groups {
        let avg = agg.sum / agg.count as f64;
        let (p50, p95, p99) = if agg.kind == "histogram" {
            agg.values.sort_by(|a, b| a.partial_cmp(b).unwrap());
            (
                Some(percentile::compute(&agg.values, 0.50)),
                Some(percentile::compute(&agg.values, 0.95)),
                Some(percentile::compute(&agg.values, 0.99)),
            )
        } else {
            (None, None, None)
        };

        sqlx::query(
            "INSERT INTO metrics_aggregated
             (bucket, resolution, name, labels, count, sum, min, max, avg, p50, p95, p99)
             VALUES (?1, 'minute', ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(resolution, bucket, name, labels)
             DO UPDATE SET count = excluded.count, sum = excluded.sum, min = excluded.min,
                 max = excluded.max, avg = excluded.avg, p50 = excluded.p50,
                 p95 = excluded.p95, p99 = excluded.p99",
        )
        .bind(bucket)
        .bind(&name)
        .bind(&labels)
        .bind(agg.count)
        .bind(agg.sum)
        .bind(agg.min)
        .bind(agg.max)
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

fn minute_bucket(iso: &str) -> String {
    format!("{}:00Z", &iso[0..16])
}

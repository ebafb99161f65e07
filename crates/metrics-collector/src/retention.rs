//! Three-tier daily retention sweep (spec §4.5): raw points, minute
//! aggregates, and hourly aggregates each age out on their own window.

use chrono::{Duration as ChronoDuration, Utc};
use sqlx::SqlitePool;
use std::time::Duration;

use monlight_core::time::format_iso;

pub struct RetentionConfig {
    pub raw_seconds: u64,
    pub minute_seconds: u64,
    pub hourly_seconds: u64,
}

pub async fn sweep_once(pool: &SqlitePool, cfg: &RetentionConfig) -> anyhow::Result<u64> {
    let mut deleted = 0;

    let raw_cutoff = format_iso(Utc::now() - ChronoDuration::seconds(cfg.raw_seconds as i64));
    let result = sqlx::query("DELETE FROM metrics_raw WHERE timestamp < ?1")
        .bind(&raw_cutoff)
        .execute(pool)
        .await?;
    deleted += result.rows_affected();

    let minute_cutoff = format_iso(Utc::now() - ChronoDuration::seconds(cfg.minute_seconds as i64));
    let result = sqlx::query("DELETE FROM metrics_aggregated WHERE resolution = 'minute' AND bucket < ?1")
        .bind(&minute_cutoff)
        .execute(pool)
        .await?;
    deleted += result.rows_affected();

    let hourly_cutoff = format_iso(Utc::now() - ChronoDuration::seconds(cfg.hourly_seconds as i64));
    let result = sqlx::query("DELETE FROM metrics_aggregated WHERE resolution = 'hour' AND bucket < ?1")
        .bind(&hourly_cutoff)
        .execute(pool)
        .await?;
    deleted += result.rows_affected();

    if deleted > 0 {
        tracing::info!(deleted, "metrics retention sweep");
    }
    Ok(deleted)
}

pub async fn run_forever(pool: SqlitePool, cfg: RetentionConfig, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        if let Err(err) = sweep_once(&pool, &cfg).await {
            tracing::warn!(error = %err, "metrics retention sweep failed, will retry next interval");
        }
    }
}

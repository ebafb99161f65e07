//! Periodic sweeper (spec §4.6): deletes `source_maps` older than
//! `RETENTION_DAYS`. `dsn_keys` are never auto-deleted, only soft
//! deactivated via [`crate::dsn::deactivate`].

use chrono::{Duration as ChronoDuration, Utc};
use sqlx::SqlitePool;
use std::time::Duration;

use monlight_core::time::format_iso;

pub async fn sweep_once(pool: &SqlitePool, retention_days: u64) -> anyhow::Result<u64> {
    let cutoff = format_iso(Utc::now() - ChronoDuration::days(retention_days as i64));
    let result = sqlx::query("DELETE FROM source_maps WHERE uploaded_at < ?1")
        .bind(&cutoff)
        .execute(pool)
        .await?;
    let deleted = result.rows_affected();
    if deleted > 0 {
        tracing::info!(deleted, "retention sweep removed stale source maps");
    }
    Ok(deleted)
}

pub async fn run_forever(pool: SqlitePool, retention_days: u64, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        if let Err(err) = sweep_once(&pool, retention_days).await {
            tracing::warn!(error = %err, "retention sweep failed, will retry next interval");
        }
    }
}

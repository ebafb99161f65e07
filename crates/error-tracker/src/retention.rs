//! Periodic sweeper (spec §4.3): deletes resolved error groups whose
//! `resolved_at` is older than `RETENTION_DAYS`. `ON DELETE CASCADE` on
//! `error_occurrences.error_id` (with `foreign_keys=ON` from the storage
//! adapter) removes the dependent occurrences in the same statement.

use chrono::{Duration as ChronoDuration, Utc};
use sqlx::SqlitePool;
use std::time::Duration;

use monlight_core::time::format_iso;

pub async fn sweep_once(pool: &SqlitePool, retention_days: u64) -> anyhow::Result<u64> {
    let cutoff = format_iso(Utc::now() - ChronoDuration::days(retention_days as i64));
    let result = sqlx::query(
        "DELETE FROM errors WHERE resolved = 1 AND resolved_at IS NOT NULL AND resolved_at < ?1",
    )
    .bind(&cutoff)
    .execute(pool)
    .await?;
    let deleted = result.rows_affected();
    if deleted > 0 {
        tracing::info!(deleted, "retention sweep removed resolved error groups");
    }
    Ok(deleted)
}

/// Runs `sweep_once` every `interval`, forever, on its own connection pool.
/// A single failed sweep is logged and retried on the next interval; it
/// never terminates the service (spec §7).
pub async fn run_forever(pool: SqlitePool, retention_days: u64, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        if let Err(err) = sweep_once(&pool, retention_days).await {
            tracing::warn!(error = %err, "retention sweep failed, will retry next interval");
        }
    }
}

//! Storage adapter (spec §4.1). Opens the on-disk SQLite database, applies
//! the four required PRAGMAs, and runs append-only versioned migrations
//! tracked in a `_meta` table. Each service supplies its own migration
//! array; this module is otherwise schema-agnostic.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Executor, SqlitePool};
use std::str::FromStr;
use std::time::Duration;

/// Open (creating if absent) the SQLite database at `path` with WAL mode,
/// a 5s busy timeout, NORMAL synchronous and foreign keys on.
pub async fn open_db(path: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))
        .with_context(|| format!("invalid database path '{path}'"))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_millis(5000))
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await
        .with_context(|| format!("failed to open database at '{path}'"))?;

    Ok(pool)
}

/// Apply an ordered list of append-only migration chunks. Each chunk runs
/// inside its own transaction; `_meta.schema_version` advances on success.
/// Migrations already applied (by index) are skipped. Migration SQL must
/// be written to be idempotent-friendly (`IF NOT EXISTS`) since it is
/// never edited after release.
pub async fn run_migrations(pool: &SqlitePool, migrations: &[&str]) -> Result<()> {
    pool.execute(
        "CREATE TABLE IF NOT EXISTS _meta (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
    )
    .await
    .context("failed to create _meta table")?;

    let current: Option<String> =
        sqlx::query_scalar("SELECT value FROM _meta WHERE key = 'schema_version'")
            .fetch_optional(pool)
            .await
            .context("failed to read schema_version")?;
    let mut version: usize = current.and_then(|v| v.parse().ok()).unwrap_or(0);

    while version < migrations.len() {
        let chunk = migrations[version];
        let mut tx = pool.begin().await.context("failed to start migration tx")?;
        for statement in chunk.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            tx.execute(statement)
                .await
                .with_context(|| format!("migration #{version} failed on: {statement}"))?;
        }
        version += 1;
        sqlx::query(
            "INSERT INTO _meta(key, value) VALUES ('schema_version', ?1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(version.to_string())
        .execute(&mut *tx)
        .await
        .context("failed to persist schema_version")?;
        tx.commit().await.context("failed to commit migration tx")?;
        tracing::info!(version, "applied migration");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_and_migrates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let pool = open_db(path.to_str().unwrap()).await.unwrap();
        run_migrations(&pool, &["CREATE TABLE IF NOT EXISTS t (id INTEGER)"])
            .await
            .unwrap();
        let version: String = sqlx::query_scalar("SELECT value FROM _meta WHERE key = 'schema_version'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(version, "1");
    }

    #[tokio::test]
    async fn migrations_are_idempotent_across_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test2.db");
        let migs: &[&str] = &[
            "CREATE TABLE IF NOT EXISTS t (id INTEGER)",
            "CREATE TABLE IF NOT EXISTS u (id INTEGER)",
        ];
        {
            let pool = open_db(path.to_str().unwrap()).await.unwrap();
            run_migrations(&pool, migs).await.unwrap();
        }
        let pool = open_db(path.to_str().unwrap()).await.unwrap();
        // re-running should not error and should not re-apply migration 0
        run_migrations(&pool, migs).await.unwrap();
        let version: String = sqlx::query_scalar("SELECT value FROM _meta WHERE key = 'schema_version'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(version, "2");
    }
}

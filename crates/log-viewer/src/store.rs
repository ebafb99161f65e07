//! Batch insertion (spec §4.4): one transaction per poll batch, FTS5
//! mirror kept in sync, ring-buffer sweep once the `MAX_ENTRIES` ceiling
//! is exceeded.

use sqlx::SqlitePool;

use crate::tail::{LogRow, TailRegistry};

const SWEEP_MARGIN: i64 = 100;

#[derive(Debug, Clone)]
pub struct NewLogRow {
    pub timestamp: String,
    pub container: String,
    pub stream: String,
    pub level: String,
    pub message: String,
    pub raw: String,
}

/// Insert a batch of reassembled entries inside a single transaction,
/// mirror each into FTS5, then (after commit) offer each row to matching
/// SSE tail clients and sweep the ring if `MAX_ENTRIES` was exceeded.
pub async fn insert_batch(
    pool: &SqlitePool,
    rows: &[NewLogRow],
    max_entries: i64,
    registry: &TailRegistry,
) -> anyhow::Result<()> {
    if rows.is_empty() {
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    let mut inserted_ids = Vec::with_capacity(rows.len());
    for row in rows {
        sqlx::query(
            "INSERT INTO logs (timestamp, container, stream, level, message, raw)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&row.timestamp)
        .bind(&row.container)
        .bind(&row.stream)
        .bind(&row.level)
        .bind(&row.message)
        .bind(&row.raw)
        .execute(&mut *tx)
        .await?;
        let id: i64 = sqlx::query_scalar("SELECT last_insert_rowid()")
            .fetch_one(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO logs_fts (rowid, message) VALUES (?1, ?2)")
            .bind(id)
            .bind(&row.message)
            .execute(&mut *tx)
            .await?;
        inserted_ids.push(id);
    }
    tx.commit().await?;

    for (row, id) in rows.iter().zip(inserted_ids.iter()) {
        registry.broadcast(&LogRow {
            id: *id,
            timestamp: row.timestamp.clone(),
            container: row.container.clone(),
            stream: row.stream.clone(),
            level: row.level.clone(),
            message: row.message.clone(),
            raw: row.raw.clone(),
        });
    }

    sweep_ring(pool, max_entries).await?;
    Ok(())
}

async fn sweep_ring(pool: &SqlitePool, max_entries: i64) -> anyhow::Result<()> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM logs")
        .fetch_one(pool)
        .await?;
    if total <= max_entries {
        return Ok(());
    }
    let to_delete = total - max_entries + SWEEP_MARGIN;
    let victims: Vec<(i64, String)> = sqlx::query_as(
        "SELECT id, message FROM logs ORDER BY id ASC LIMIT ?1",
    )
    .bind(to_delete)
    .fetch_all(pool)
    .await?;
    if victims.is_empty() {
        return Ok(());
    }
    let mut tx = pool.begin().await?;
    for (id, message) in &victims {
        sqlx::query("INSERT INTO logs_fts (logs_fts, rowid, message) VALUES ('delete', ?1, ?2)")
            .bind(id)
            .bind(message)
            .execute(&mut *tx)
            .await?;
    }
    let ids: Vec<i64> = victims.iter().map(|(id, _)| *id).collect();
    let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    let sql = format!("DELETE FROM logs WHERE id IN ({placeholders})");
    let mut query = sqlx::query(&sql);
    for id in &ids {
        query = query.bind(id);
    }
    query.execute(&mut *tx).await?;
    tx.commit().await?;
    tracing::info!(deleted = victims.len(), "log ring sweep");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool() -> SqlitePool {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs.db");
        std::mem::forget(dir);
        let pool = monlight_core::storage::open_db(path.to_str().unwrap())
            .await
            .unwrap();
        monlight_core::storage::run_migrations(&pool, crate::db::MIGRATIONS)
            .await
            .unwrap();
        pool
    }

    fn row(n: usize) -> NewLogRow {
        NewLogRow {
            timestamp: format!("2024-01-01T00:00:{:02}Z", n % 60),
            container: "web".to_string(),
            stream: "stdout".to_string(),
            level: "INFO".to_string(),
            message: format!("line {n}"),
            raw: "{}".to_string(),
        }
    }

    #[tokio::test]
    async fn inserts_and_mirrors_fts() {
        let pool = test_pool().await;
        let registry = TailRegistry::new();
        insert_batch(&pool, &[row(1), row(2)], 1000, &registry)
            .await
            .unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM logs")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 2);
        let matches: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM logs_fts WHERE logs_fts MATCH 'line'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(matches, 2);
    }

    #[tokio::test]
    async fn sweeps_ring_once_ceiling_exceeded() {
        let pool = test_pool().await;
        let registry = TailRegistry::new();
        let rows: Vec<_> = (0..20).map(row).collect();
        insert_batch(&pool, &rows, 10, &registry).await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM logs")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert!(count <= 10, "expected ring to be swept, got {count}");
    }
}

//! Persisted tail cursors (spec §3, §4.4): one row per
//! `(container_id, file_path)`, rewritten on every successful poll and
//! reset to position 0 when the file's inode changes (rotation).

use sqlx::SqlitePool;

#[derive(Debug, Clone, Copy, Default)]
pub struct Cursor {
    pub position: i64,
    pub inode: i64,
}

pub async fn load(pool: &SqlitePool, container_id: &str, file_path: &str) -> anyhow::Result<Option<Cursor>> {
    let row: Option<(i64, i64)> = sqlx::query_as(
        "SELECT position, inode FROM log_cursors WHERE container_id = ?1 AND file_path = ?2",
    )
    .bind(container_id)
    .bind(file_path)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(position, inode)| Cursor { position, inode }))
}

pub async fn persist(
    pool: &SqlitePool,
    container_id: &str,
    file_path: &str,
    cursor: Cursor,
) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO log_cursors (container_id, file_path, position, inode)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(container_id, file_path)
         DO UPDATE SET position = excluded.position, inode = excluded.inode",
    )
    .bind(container_id)
    .bind(file_path)
    .bind(cursor.position)
    .bind(cursor.inode)
    .execute(pool)
    .await?;
    Ok(())
}

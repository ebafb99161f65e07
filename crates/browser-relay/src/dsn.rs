//! DSN credential plane (spec §4.6): admin-key-gated CRUD over
//! `dsn_keys`, used to resolve an inbound `X-Monlight-Key` to a project.

use monlight_core::error::{AppError, AppResult};
use monlight_core::time::now_iso;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

#[derive(Debug, Deserialize)]
pub struct CreateDsnRequest {
    pub project: String,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DsnKey {
    pub id: i64,
    pub public_key: String,
    pub project: String,
    pub created_at: String,
    pub active: bool,
}

fn generate_public_key() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub async fn create(pool: &SqlitePool, req: &CreateDsnRequest) -> AppResult<DsnKey> {
    if req.project.trim().is_empty() || req.project.len() > 100 {
        return Err(AppError::Validation(
            "project must be 1-100 chars".to_string(),
        ));
    }
    let public_key = generate_public_key();
    let created_at = now_iso();
    sqlx::query(
        "INSERT INTO dsn_keys (public_key, project, created_at, active) VALUES (?1, ?2, ?3, 1)",
    )
    .bind(&public_key)
    .bind(&req.project)
    .bind(&created_at)
    .execute(pool)
    .await?;
    let id: i64 = sqlx::query_scalar("SELECT last_insert_rowid()")
        .fetch_one(pool)
        .await?;
    Ok(DsnKey { id, public_key, project: req.project.clone(), created_at, active: true })
}

pub async fn list(pool: &SqlitePool) -> AppResult<Vec<DsnKey>> {
    let rows = sqlx::query_as::<_, DsnKey>(
        "SELECT id, public_key, project, created_at, active FROM dsn_keys ORDER BY id ASC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Soft-deactivates; never removes the row (spec §3 lifecycle).
pub async fn deactivate(pool: &SqlitePool, id: i64) -> AppResult<bool> {
    let result = sqlx::query("UPDATE dsn_keys SET active = 0 WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Resolves an `X-Monlight-Key` to its active project, used by the
/// browser-facing gate and by the ingestion handlers.
pub async fn resolve_project(pool: &SqlitePool, public_key: &str) -> AppResult<Option<String>> {
    let project: Option<String> = sqlx::query_scalar(
        "SELECT project FROM dsn_keys WHERE public_key = ?1 AND active = 1",
    )
    .bind(public_key)
    .fetch_optional(pool)
    .await?;
    Ok(project)
}

//! Ingest transaction (spec §4.3): upsert the error group, append the
//! occurrence, trim the occurrence ring to 5, and decide whether to fire
//! an alert. Runs as a single serializable write; WAL + busy_timeout
//! absorb brief writer contention on the same fingerprint.

use monlight_core::error::AppError;
use monlight_core::time::now_iso;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::fingerprint;

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub project: String,
    pub environment: Option<String>,
    pub exception_type: String,
    pub message: String,
    pub traceback: String,
    pub request_url: Option<String>,
    pub request_method: Option<String>,
    pub request_headers: Option<serde_json::Value>,
    pub user_id: Option<String>,
    pub extra: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Created,
    Reopened,
    Incremented,
}

#[derive(Debug)]
pub struct IngestResult {
    pub status: Outcome,
    pub id: i64,
    pub count: i64,
    pub fingerprint: Option<String>,
    pub should_alert: bool,
    pub fingerprint_value: String,
}

impl Serialize for IngestResult {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        // §4.3: a `created` response carries `fingerprint`, not `count`;
        // `reopened`/`incremented` carry `count`, not `fingerprint`.
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("status", &self.status)?;
        map.serialize_entry("id", &self.id)?;
        match self.status {
            Outcome::Created => {
                map.serialize_entry("fingerprint", &self.fingerprint)?;
            }
            Outcome::Reopened | Outcome::Incremented => {
                map.serialize_entry("count", &self.count)?;
            }
        }
        map.end()
    }
}

const OCCURRENCE_RING_SIZE: i64 = 5;

pub async fn ingest_error(pool: &SqlitePool, req: &IngestRequest) -> Result<IngestResult, AppError> {
    if req.project.trim().is_empty() {
        return Err(AppError::Validation("project is required".to_string()));
    }
    if req.exception_type.trim().is_empty() {
        return Err(AppError::Validation(
            "exception_type is required".to_string(),
        ));
    }

    let environment = req.environment.clone().unwrap_or_else(|| "production".to_string());
    let fp = fingerprint::compute(&req.project, &req.exception_type, &req.traceback, &req.message);
    let now = now_iso();

    let mut tx = pool.begin().await?;

    let existing: Option<(i64, bool, i64)> = sqlx::query_as(
        "SELECT id, resolved, count FROM errors WHERE fingerprint = ?1",
    )
    .bind(&fp)
    .fetch_optional(&mut *tx)
    .await?;

    let (id, count, outcome) = match existing {
        None => {
            sqlx::query(
                "INSERT INTO errors
                 (fingerprint, project, environment, exception_type, message, traceback,
                  count, first_seen, last_seen, resolved, resolved_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7, 0, NULL)",
            )
            .bind(&fp)
            .bind(&req.project)
            .bind(&environment)
            .bind(&req.exception_type)
            .bind(&req.message)
            .bind(&req.traceback)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
            let id: i64 = sqlx::query_scalar("SELECT last_insert_rowid()")
                .fetch_one(&mut *tx)
                .await?;
            (id, 1, Outcome::Created)
        }
        Some((id, true, count)) => {
            let new_count = count + 1;
            sqlx::query(
                "UPDATE errors SET resolved = 0, resolved_at = NULL, count = ?1,
                 last_seen = ?2, message = ?3, traceback = ?4 WHERE id = ?5",
            )
            .bind(new_count)
            .bind(&now)
            .bind(&req.message)
            .bind(&req.traceback)
            .bind(id)
            .execute(&mut *tx)
            .await?;
            (id, new_count, Outcome::Reopened)
        }
        Some((id, false, count)) => {
            let new_count = count + 1;
            sqlx::query("UPDATE errors SET count = ?1, last_seen = ?2 WHERE id = ?3")
                .bind(new_count)
                .bind(&now)
                .bind(id)
                .execute(&mut *tx)
                .await?;
            (id, new_count, Outcome::Incremented)
        }
    };

    let headers_json = req.request_headers.as_ref().map(|v| v.to_string());
    let extra_json = req.extra.as_ref().map(|v| v.to_string());
    sqlx::query(
        "INSERT INTO error_occurrences
         (error_id, timestamp, request_url, request_method, request_headers, user_id, extra, traceback)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )
    .bind(id)
    .bind(&now)
    .bind(&req.request_url)
    .bind(&req.request_method)
    .bind(&headers_json)
    .bind(&req.user_id)
    .bind(&extra_json)
    .bind(&req.traceback)
    .execute(&mut *tx)
    .await?;

    trim_occurrence_ring(&mut tx, id).await?;

    tx.commit().await?;

    let should_alert = matches!(outcome, Outcome::Created | Outcome::Reopened);
    Ok(IngestResult {
        status: outcome,
        id,
        count,
        fingerprint: matches!(outcome, Outcome::Created).then(|| fp.clone()),
        should_alert,
        fingerprint_value: fp,
    })
}

/// Keep at most [`OCCURRENCE_RING_SIZE`] occurrences per error, deleting
/// the oldest rows (by id) once the ceiling is exceeded (spec §3).
async fn trim_occurrence_ring(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    error_id: i64,
) -> Result<(), AppError> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM error_occurrences WHERE error_id = ?1")
        .bind(error_id)
        .fetch_one(&mut **tx)
        .await?;
    if total > OCCURRENCE_RING_SIZE {
        sqlx::query(
            "DELETE FROM error_occurrences WHERE id IN (
                SELECT id FROM error_occurrences WHERE error_id = ?1
                ORDER BY id ASC LIMIT ?2
             )",
        )
        .bind(error_id)
        .bind(total - OCCURRENCE_RING_SIZE)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

pub async fn resolve_error(pool: &SqlitePool, id: i64) -> Result<bool, AppError> {
    let now = now_iso();
    let result = sqlx::query(
        "UPDATE errors SET resolved = 1, resolved_at = ?1 WHERE id = ?2",
    )
    .bind(&now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

//! Source-map CRUD (spec §4.6, §6): validates Source Map v3 shape,
//! upserts on `(project, release, file_url)`.

use monlight_core::error::{AppError, AppResult};
use monlight_core::time::now_iso;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

const MAX_MAP_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct UploadSourceMapRequest {
    pub project: String,
    pub release: String,
    pub file_url: String,
    pub map_content: serde_json::Value,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct SourceMapRow {
    pub id: i64,
    pub project: String,
    pub release: String,
    pub file_url: String,
    pub uploaded_at: String,
}

fn validate_shape(map_content: &serde_json::Value) -> AppResult<()> {
    let obj = map_content
        .as_object()
        .ok_or_else(|| AppError::Validation("map_content must be an object".to_string()))?;
    if !obj.get("version").is_some_and(|v| v.is_number()) {
        return Err(AppError::Validation("version must be numeric".to_string()));
    }
    if !obj.get("sources").is_some_and(|v| v.is_array()) {
        return Err(AppError::Validation("sources must be an array".to_string()));
    }
    if !obj.get("mappings").is_some_and(|v| v.is_string()) {
        return Err(AppError::Validation("mappings must be a string".to_string()));
    }
    Ok(())
}

pub async fn upsert(pool: &SqlitePool, req: &UploadSourceMapRequest) -> AppResult<SourceMapRow> {
    validate_shape(&req.map_content)?;
    let text = req.map_content.to_string();
    if text.len() > MAX_MAP_BYTES {
        return Err(AppError::PayloadTooLarge);
    }
    let uploaded_at = now_iso();
    sqlx::query(
        "INSERT INTO source_maps (project, release, file_url, map_content, uploaded_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(project, release, file_url)
         DO UPDATE SET map_content = excluded.map_content, uploaded_at = excluded.uploaded_at",
    )
    .bind(&req.project)
    .bind(&req.release)
    .bind(&req.file_url)
    .bind(&text)
    .bind(&uploaded_at)
    .execute(pool)
    .await?;

    let row = sqlx::query_as::<_, SourceMapRow>(
        "SELECT id, project, release, file_url, uploaded_at FROM source_maps
         WHERE project = ?1 AND release = ?2 AND file_url = ?3",
    )
    .bind(&req.project)
    .bind(&req.release)
    .bind(&req.file_url)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn list(pool: &SqlitePool, project: Option<&str>) -> AppResult<Vec<SourceMapRow>> {
    let rows = sqlx::query_as::<_, SourceMapRow>(
        "SELECT id, project, release, file_url, uploaded_at FROM source_maps
         WHERE (?1 IS NULL OR project = ?1) ORDER BY id ASC",
    )
    .bind(project)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn delete(pool: &SqlitePool, id: i64) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM source_maps WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Fetches and decodes one map for stack rewriting, given its path key.
pub async fn fetch_content(
    pool: &SqlitePool,
    project: &str,
    release: &str,
    file_url: &str,
) -> AppResult<Option<String>> {
    let content: Option<String> = sqlx::query_scalar(
        "SELECT map_content FROM source_maps WHERE project = ?1 AND release = ?2 AND file_url = ?3",
    )
    .bind(project)
    .bind(release)
    .bind(file_url)
    .fetch_optional(pool)
    .await?;
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_required_fields() {
        let err = validate_shape(&serde_json::json!({"version": 3})).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn accepts_minimal_valid_map() {
        let value = serde_json::json!({"version": 3, "sources": ["a.ts"], "mappings": "AAAAA"});
        assert!(validate_shape(&value).is_ok());
    }
}

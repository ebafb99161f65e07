//! Query routes (spec §4.3): list/get error groups, resolve, distinct
//! projects.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use monlight_core::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::ingest::{ingest_error, resolve_error, IngestRequest};
use crate::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub project: Option<String>,
    pub environment: Option<String>,
    pub resolved: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ErrorGroup {
    pub id: i64,
    pub fingerprint: String,
    pub project: String,
    pub environment: String,
    pub exception_type: String,
    pub message: String,
    pub traceback: String,
    pub count: i64,
    pub first_seen: String,
    pub last_seen: String,
    pub resolved: bool,
    pub resolved_at: Option<String>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Occurrence {
    pub id: i64,
    pub error_id: i64,
    pub timestamp: String,
    pub request_url: Option<String>,
    pub request_method: Option<String>,
    pub request_headers: Option<String>,
    pub user_id: Option<String>,
    pub extra: Option<String>,
    pub traceback: String,
}

#[derive(Serialize)]
pub struct ErrorGroupDetail {
    #[serde(flatten)]
    pub group: ErrorGroup,
    pub occurrences: Vec<Occurrence>,
}

pub async fn list_errors(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> AppResult<Json<Vec<ErrorGroup>>> {
    let resolved = q.resolved.unwrap_or(false);
    let limit = q.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = q.offset.unwrap_or(0).max(0);

    let mut sql = String::from(
        "SELECT id, fingerprint, project, environment, exception_type, message, traceback,
                count, first_seen, last_seen, resolved, resolved_at
         FROM errors WHERE resolved = ?1",
    );
    if q.project.is_some() {
        sql.push_str(" AND project = ?2");
    }
    if q.environment.is_some() {
        sql.push_str(" AND environment = ?3");
    }
    sql.push_str(" ORDER BY last_seen DESC LIMIT ?4 OFFSET ?5");

    let mut query = sqlx::query_as::<_, ErrorGroup>(&sql).bind(resolved);
    if let Some(project) = &q.project {
        query = query.bind(project);
    } else {
        query = query.bind(Option::<String>::None);
    }
    if let Some(environment) = &q.environment {
        query = query.bind(environment);
    } else {
        query = query.bind(Option::<String>::None);
    }
    let rows = query
        .bind(limit)
        .bind(offset)
        .fetch_all(&state.pool)
        .await?;
    Ok(Json(rows))
}

pub async fn get_error(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<ErrorGroupDetail>> {
    let group = sqlx::query_as::<_, ErrorGroup>(
        "SELECT id, fingerprint, project, environment, exception_type, message, traceback,
                count, first_seen, last_seen, resolved, resolved_at
         FROM errors WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("error group {id} not found")))?;

    let occurrences = sqlx::query_as::<_, Occurrence>(
        "SELECT id, error_id, timestamp, request_url, request_method, request_headers,
                user_id, extra, traceback
         FROM error_occurrences WHERE error_id = ?1 ORDER BY id ASC",
    )
    .bind(id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(ErrorGroupDetail { group, occurrences }))
}

#[derive(Serialize)]
pub struct ResolveResponse {
    pub status: &'static str,
    pub id: i64,
}

pub async fn resolve(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<ResolveResponse>> {
    let existed = sqlx::query_scalar::<_, i64>("SELECT 1 FROM errors WHERE id = ?1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?;
    if existed.is_none() {
        return Err(AppError::NotFound(format!("error group {id} not found")));
    }
    resolve_error(&state.pool, id).await?;
    Ok(Json(ResolveResponse { status: "resolved", id }))
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ProjectRow {
    pub project: String,
}

pub async fn list_projects(State(state): State<AppState>) -> AppResult<Json<Vec<String>>> {
    let rows: Vec<ProjectRow> = sqlx::query_as("SELECT DISTINCT project FROM errors")
        .fetch_all(&state.pool)
        .await?;
    Ok(Json(rows.into_iter().map(|r| r.project).collect()))
}

pub async fn ingest(
    State(state): State<AppState>,
    Json(payload): Json<IngestRequest>,
) -> impl IntoResponse {
    match ingest_error(&state.pool, &payload).await {
        Ok(result) => {
            let status = match result.status {
                crate::ingest::Outcome::Created => axum::http::StatusCode::CREATED,
                _ => axum::http::StatusCode::OK,
            };
            if result.should_alert {
                let config = state.config.clone();
                let pool = state.pool.clone();
                let error_id = result.id;
                tokio::spawn(async move {
                    if let Ok(Some(row)) = sqlx::query_as::<_, (String, String, String, String, String)>(
                        "SELECT project, environment, exception_type, message, first_seen FROM errors WHERE id = ?1",
                    )
                    .bind(error_id)
                    .fetch_optional(&pool)
                    .await
                    {
                        let (project, environment, exception_type, message, first_seen) = row;
                        crate::alerts::dispatch(
                            &config,
                            crate::alerts::AlertContext {
                                project: &project,
                                environment: &environment,
                                exception_type: &exception_type,
                                message: &message,
                                request_url: payload.request_url.as_deref(),
                                request_method: payload.request_method.as_deref(),
                                first_seen: &first_seen,
                                traceback: &payload.traceback,
                                error_id,
                            },
                        )
                        .await;
                    }
                });
            }
            (status, Json(result)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

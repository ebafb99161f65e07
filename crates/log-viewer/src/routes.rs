//! Query routes (spec §4.4): paginated/filtered list with optional FTS5
//! search, and an SSE live-tail endpoint.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use monlight_core::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt as _;

use crate::tail::TailFilter;
use crate::AppState;

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 500;
const TAIL_HEARTBEAT: Duration = Duration::from_secs(15);
const TAIL_MAX_LIFETIME: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub container: Option<String>,
    pub level: Option<String>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct LogEntry {
    pub id: i64,
    pub timestamp: String,
    pub container: String,
    pub stream: String,
    pub level: String,
    pub message: String,
}

pub async fn list_logs(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> AppResult<Json<Vec<LogEntry>>> {
    let limit = q.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = q.offset.unwrap_or(0).max(0);

    let rows = if let Some(search) = q.search.as_deref().filter(|s| !s.is_empty()) {
        sqlx::query_as::<_, LogEntry>(
            "SELECT logs.id, logs.timestamp, logs.container, logs.stream, logs.level, logs.message
             FROM logs_fts JOIN logs ON logs.id = logs_fts.rowid
             WHERE logs_fts MATCH ?1
               AND (?2 IS NULL OR logs.container = ?2)
               AND (?3 IS NULL OR logs.level = ?3)
             ORDER BY logs.id DESC LIMIT ?4 OFFSET ?5",
        )
        .bind(search)
        .bind(&q.container)
        .bind(&q.level)
        .bind(limit)
        .bind(offset)
        .fetch_all(&state.pool)
        .await?
    } else {
        sqlx::query_as::<_, LogEntry>(
            "SELECT id, timestamp, container, stream, level, message FROM logs
             WHERE (?1 IS NULL OR container = ?1)
               AND (?2 IS NULL OR level = ?2)
             ORDER BY id DESC LIMIT ?3 OFFSET ?4",
        )
        .bind(&q.container)
        .bind(&q.level)
        .bind(limit)
        .bind(offset)
        .fetch_all(&state.pool)
        .await?
    };
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct TailQuery {
    pub container: Option<String>,
    pub level: Option<String>,
}

/// `GET /api/logs/tail`: register with the `TailRegistry`, then forward
/// rows as SSE events on their own task that also emits a heartbeat every
/// 15s and force-closes after the 30 minute lifetime cap. The forwarding
/// task exits (and unregisters) as soon as the client disconnects, since
/// sending into the client's dropped receiver fails.
pub async fn tail(
    State(state): State<AppState>,
    Query(q): Query<TailQuery>,
) -> impl IntoResponse {
    let filter = TailFilter { container: q.container, level: q.level };
    let Some((id, mut rows_rx)) = state.tail_registry.register(filter, state.config.tail_buffer)
    else {
        return AppError::ServiceUnavailable("tail registry is at capacity".to_string())
            .into_response();
    };

    let registry = state.tail_registry.clone();
    let (events_tx, events_rx) = tokio::sync::mpsc::channel::<Event>(state.config.tail_buffer.max(1));

    tokio::spawn(async move {
        let deadline = tokio::time::sleep(TAIL_MAX_LIFETIME);
        tokio::pin!(deadline);
        let mut heartbeat = tokio::time::interval(TAIL_HEARTBEAT);
        loop {
            tokio::select! {
                _ = &mut deadline => break,
                row = rows_rx.recv() => {
                    match row {
                        Some(row) => {
                            let event = Event::default()
                                .event("log")
                                .json_data(&row)
                                .unwrap_or_else(|_| Event::default());
                            if events_tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = heartbeat.tick() => {
                    if events_tx.send(Event::default().event("heartbeat").data("ping")).await.is_err() {
                        break;
                    }
                }
            }
        }
        registry.unregister(id);
    });

    let stream = tokio_stream::wrappers::ReceiverStream::new(events_rx).map(Ok::<_, Infallible>);
    Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
}

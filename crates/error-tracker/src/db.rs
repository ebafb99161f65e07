//! `errors` / `error_occurrences` schema (spec §3). Migration #0 creates
//! both tables plus the indexes the query handlers rely on.

pub const MIGRATIONS: &[&str] = &[r#"
CREATE TABLE IF NOT EXISTS errors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    fingerprint TEXT NOT NULL UNIQUE,
    project TEXT NOT NULL,
    environment TEXT NOT NULL,
    exception_type TEXT NOT NULL,
    message TEXT NOT NULL,
    traceback TEXT NOT NULL,
    count INTEGER NOT NULL DEFAULT 1,
    first_seen TEXT NOT NULL,
    last_seen TEXT NOT NULL,
    resolved INTEGER NOT NULL DEFAULT 0,
    resolved_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_errors_project_env ON errors(project, environment);
CREATE INDEX IF NOT EXISTS idx_errors_last_seen ON errors(last_seen DESC);
CREATE INDEX IF NOT EXISTS idx_errors_resolved ON errors(resolved, resolved_at);

CREATE TABLE IF NOT EXISTS error_occurrences (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    error_id INTEGER NOT NULL REFERENCES errors(id) ON DELETE CASCADE,
    timestamp TEXT NOT NULL,
    request_url TEXT,
    request_method TEXT,
    request_headers TEXT,
    user_id TEXT,
    extra TEXT,
    traceback TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_occurrences_error_id ON error_occurrences(error_id, id);
"#];

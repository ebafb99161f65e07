//! `logs` / `log_cursors` schema (spec §3), plus the FTS5 mirror table on
//! `message`.

pub const MIGRATIONS: &[&str] = &[
    r#"
CREATE TABLE IF NOT EXISTS logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    container TEXT NOT NULL,
    stream TEXT NOT NULL,
    level TEXT NOT NULL,
    message TEXT NOT NULL,
    raw TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_logs_container_ts ON logs(container, timestamp);
CREATE INDEX IF NOT EXISTS idx_logs_level ON logs(level);

CREATE VIRTUAL TABLE IF NOT EXISTS logs_fts USING fts5(message, content='logs', content_rowid='id');

CREATE TABLE IF NOT EXISTS log_cursors (
    container_id TEXT NOT NULL,
    file_path TEXT NOT NULL,
    position INTEGER NOT NULL DEFAULT 0,
    inode INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (container_id, file_path)
);
"#,
];

//! `dsn_keys` / `source_maps` schema (spec §3).

pub const MIGRATIONS: &[&str] = &[r#"
CREATE TABLE IF NOT EXISTS dsn_keys (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    public_key TEXT NOT NULL UNIQUE,
    project TEXT NOT NULL,
    created_at TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS source_maps (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project TEXT NOT NULL,
    release TEXT NOT NULL,
    file_url TEXT NOT NULL,
    map_content TEXT NOT NULL,
    uploaded_at TEXT NOT NULL,
    UNIQUE(project, release, file_url)
);
CREATE INDEX IF NOT EXISTS idx_source_maps_uploaded ON source_maps(uploaded_at);
"#];

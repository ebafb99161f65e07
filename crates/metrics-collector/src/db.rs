//! `metrics_raw` / `metrics_aggregated` schema (spec §3).

pub const MIGRATIONS: &[&str] = &[r#"
CREATE TABLE IF NOT EXISTS metrics_raw (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    name TEXT NOT NULL,
    labels TEXT NOT NULL DEFAULT '{}',
    value REAL NOT NULL,
    type TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_metrics_raw_name_ts ON metrics_raw(name, timestamp);

CREATE TABLE IF NOT EXISTS metrics_aggregated (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    bucket TEXT NOT NULL,
    resolution TEXT NOT NULL,
    name TEXT NOT NULL,
    labels TEXT NOT NULL DEFAULT '{}',
    count INTEGER NOT NULL,
    sum REAL NOT NULL,
    min REAL NOT NULL,
    max REAL NOT NULL,
    avg REAL NOT NULL,
    p50 REAL,
    p95 REAL,
    p99 REAL,
    UNIQUE(resolution, bucket, name, labels)
);
CREATE INDEX IF NOT EXISTS idx_metrics_agg_query ON metrics_aggregated(name, resolution, bucket);

CREATE TABLE IF NOT EXISTS rollup_state (
    resolution TEXT PRIMARY KEY,
    last_bucket TEXT NOT NULL
);
"#];

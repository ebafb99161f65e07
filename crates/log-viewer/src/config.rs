use std::time::Duration;

use anyhow::Result;
use monlight_core::envutil::{csv_var, parse_optional_u64, string_var};

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub database_path: String,
    pub containers: Vec<String>,
    pub log_sources: String,
    pub max_entries: i64,
    pub poll_interval: Duration,
    pub tail_buffer: usize,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_key: string_var("API_KEY").unwrap_or_default(),
            database_path: string_var("DATABASE_PATH").unwrap_or_else(|| "log_viewer.db".to_string()),
            containers: csv_var("CONTAINERS"),
            log_sources: string_var("LOG_SOURCES")
                .unwrap_or_else(|| "/var/lib/docker/containers".to_string()),
            max_entries: parse_optional_u64("MAX_ENTRIES")?.unwrap_or(100_000) as i64,
            poll_interval: Duration::from_millis(
                parse_optional_u64("POLL_INTERVAL_MS")?.unwrap_or(2_000),
            ),
            tail_buffer: parse_optional_u64("TAIL_BUFFER")?.unwrap_or(100) as usize,
            port: parse_optional_u64("PORT")?.unwrap_or(8081) as u16,
        })
    }
}

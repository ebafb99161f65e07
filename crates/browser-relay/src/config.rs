use anyhow::Result;
use monlight_core::envutil::{csv_var, parse_optional_u64, parse_optional_usize, string_var};

#[derive(Debug, Clone)]
pub struct Config {
    pub admin_api_key: String,
    pub error_tracker_url: String,
    pub error_tracker_api_key: String,
    pub metrics_collector_url: String,
    pub metrics_collector_api_key: String,
    pub cors_origins: Vec<String>,
    pub database_path: String,
    pub max_body_size: usize,
    pub rate_limit: usize,
    pub retention_days: u64,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            admin_api_key: string_var("ADMIN_API_KEY").unwrap_or_default(),
            error_tracker_url: string_var("ERROR_TRACKER_URL")
                .unwrap_or_else(|| "http://localhost:8080".to_string()),
            error_tracker_api_key: string_var("ERROR_TRACKER_API_KEY").unwrap_or_default(),
            metrics_collector_url: string_var("METRICS_COLLECTOR_URL")
                .unwrap_or_else(|| "http://localhost:8082".to_string()),
            metrics_collector_api_key: string_var("METRICS_COLLECTOR_API_KEY").unwrap_or_default(),
            cors_origins: csv_var("CORS_ORIGINS"),
            database_path: string_var("DATABASE_PATH")
                .unwrap_or_else(|| "browser_relay.db".to_string()),
            max_body_size: parse_optional_usize("MAX_BODY_SIZE")?.unwrap_or(64 * 1024),
            rate_limit: parse_optional_usize("RATE_LIMIT")?.unwrap_or(200),
            retention_days: parse_optional_u64("RETENTION_DAYS")?.unwrap_or(90),
            port: parse_optional_u64("PORT")?.unwrap_or(8083) as u16,
        })
    }
}

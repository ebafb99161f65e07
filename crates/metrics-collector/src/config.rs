use std::time::Duration;

use anyhow::Result;
use monlight_core::envutil::{parse_optional_u64, string_var};

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub database_path: String,
    pub aggregation_interval: Duration,
    pub retention_raw_seconds: u64,
    pub retention_minute_seconds: u64,
    pub retention_hourly_seconds: u64,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_key: string_var("API_KEY").unwrap_or_default(),
            database_path: string_var("DATABASE_PATH")
                .unwrap_or_else(|| "metrics_collector.db".to_string()),
            aggregation_interval: Duration::from_secs(
                parse_optional_u64("AGGREGATION_INTERVAL")?.unwrap_or(60),
            ),
            retention_raw_seconds: parse_optional_u64("RETENTION_RAW")?.unwrap_or(7 * 86_400),
            retention_minute_seconds: parse_optional_u64("RETENTION_MINUTE")?
                .unwrap_or(30 * 86_400),
            retention_hourly_seconds: parse_optional_u64("RETENTION_HOURLY")?
                .unwrap_or(365 * 86_400),
            port: parse_optional_u64("PORT")?.unwrap_or(8082) as u16,
        })
    }
}

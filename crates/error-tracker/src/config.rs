use anyhow::Result;
use monlight_core::envutil::{parse_optional_u64, string_var};

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub database_path: String,
    pub postmark_api_token: Option<String>,
    pub postmark_from_email: Option<String>,
    pub alert_emails: Vec<String>,
    pub retention_days: u64,
    pub base_url: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_key: string_var("API_KEY").unwrap_or_default(),
            database_path: string_var("DATABASE_PATH")
                .unwrap_or_else(|| "error_tracker.db".to_string()),
            postmark_api_token: string_var("POSTMARK_API_TOKEN"),
            postmark_from_email: string_var("POSTMARK_FROM_EMAIL"),
            alert_emails: monlight_core::envutil::csv_var("ALERT_EMAILS"),
            retention_days: parse_optional_u64("RETENTION_DAYS")?.unwrap_or(90),
            base_url: string_var("BASE_URL").unwrap_or_else(|| "http://localhost:8080".to_string()),
            port: parse_optional_u64("PORT")?.unwrap_or(8080) as u16,
        })
    }
}

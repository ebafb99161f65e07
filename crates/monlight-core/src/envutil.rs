//! Environment variable parsing helpers shared by every service's
//! `Config::from_env`. Lifted from the teacher's `config.rs` so the same
//! parsing rules (and the same error messages) apply across all four
//! binaries.

use std::env;

use anyhow::{anyhow, Result};

pub fn parse_optional_u64(var: &str) -> Result<Option<u64>> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| anyhow!("{} must be a positive integer", var)),
        Ok(_) => Ok(None),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

pub fn parse_optional_usize(var: &str) -> Result<Option<usize>> {
    Ok(parse_optional_u64(var)?.map(|v| v as usize))
}

pub fn parse_bool_env(var: &str) -> Result<Option<bool>> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => parse_bool(&value)
            .map(Some)
            .ok_or_else(|| anyhow!("{} must be a boolean (true/false/1/0)", var)),
        Ok(_) => Ok(None),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn string_var(var: &str) -> Option<String> {
    env::var(var).ok().filter(|s| !s.is_empty())
}

pub fn csv_var(var: &str) -> Vec<String> {
    env::var(var)
        .ok()
        .map(|raw| {
            raw.split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default()
}

/// Initialise `tracing_subscriber` from `RUST_LOG`, falling back to the
/// service's `LOG_LEVEL` env var, and finally to `"info"`.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = string_var("LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        EnvFilter::new(level)
    });
    fmt().with_env_filter(filter).init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use std::sync::Mutex;

    static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    #[test]
    fn parses_u64() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("MONLIGHT_TEST_U64", "42");
        assert_eq!(parse_optional_u64("MONLIGHT_TEST_U64").unwrap(), Some(42));
        env::remove_var("MONLIGHT_TEST_U64");
        assert_eq!(parse_optional_u64("MONLIGHT_TEST_U64").unwrap(), None);
    }

    #[test]
    fn rejects_non_numeric() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("MONLIGHT_TEST_BAD", "nope");
        assert!(parse_optional_u64("MONLIGHT_TEST_BAD").is_err());
        env::remove_var("MONLIGHT_TEST_BAD");
    }

    #[test]
    fn parses_bool_variants() {
        let _guard = ENV_MUTEX.lock().unwrap();
        for (raw, expected) in [("1", true), ("true", true), ("0", false), ("off", false)] {
            env::set_var("MONLIGHT_TEST_BOOL", raw);
            assert_eq!(parse_bool_env("MONLIGHT_TEST_BOOL").unwrap(), Some(expected));
        }
        env::remove_var("MONLIGHT_TEST_BOOL");
    }

    #[test]
    fn splits_csv() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("MONLIGHT_TEST_CSV", "a, b ,,c");
        assert_eq!(csv_var("MONLIGHT_TEST_CSV"), vec!["a", "b", "c"]);
        env::remove_var("MONLIGHT_TEST_CSV");
    }
}

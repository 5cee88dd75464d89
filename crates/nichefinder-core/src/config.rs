use std::path::PathBuf;
use std::str::FromStr;

use crate::app_config::AppConfig;
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but cannot be parsed.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but cannot be parsed.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Every variable has a default, so an empty environment yields a usable
/// config. Tests drive this with a `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_num = |var: &str, default: &str| -> Result<u64, ConfigError> {
        parse_value::<u64>(var, &or_default(var, default))
    };

    let optional_path = |var: &str| -> Option<PathBuf> {
        lookup(var)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
    };

    let log_level = or_default("NICHEFINDER_LOG_LEVEL", "info");
    let profiles_path = optional_path("NICHEFINDER_PROFILES_PATH");
    let diagnostics_dir = PathBuf::from(or_default("NICHEFINDER_DIAGNOSTICS_DIR", "./diagnostics"));

    let consent_timeout_secs = parse_num("NICHEFINDER_CONSENT_TIMEOUT_SECS", "5")?;
    let consent_settle_ms = parse_num("NICHEFINDER_CONSENT_SETTLE_MS", "1000")?;
    let readiness_timeout_secs = parse_num("NICHEFINDER_READINESS_TIMEOUT_SECS", "10")?;
    let inter_target_delay_ms = parse_num("NICHEFINDER_INTER_TARGET_DELAY_MS", "1000")?;
    let max_retries = parse_value::<u32>(
        "NICHEFINDER_MAX_RETRIES",
        &or_default("NICHEFINDER_MAX_RETRIES", "0"),
    )?;
    let retry_backoff_base_ms = parse_num("NICHEFINDER_RETRY_BACKOFF_BASE_MS", "2000")?;
    let headless = parse_bool("NICHEFINDER_HEADLESS", &or_default("NICHEFINDER_HEADLESS", "true"))?;
    let chrome_path = optional_path("NICHEFINDER_CHROME_PATH");

    if readiness_timeout_secs == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "NICHEFINDER_READINESS_TIMEOUT_SECS".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }

    Ok(AppConfig {
        log_level,
        profiles_path,
        diagnostics_dir,
        consent_timeout_secs,
        consent_settle_ms,
        readiness_timeout_secs,
        inter_target_delay_ms,
        max_retries,
        retry_backoff_base_ms,
        headless,
        chrome_path,
    })
}

fn parse_value<T>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
}

/// Accepts the usual spellings of a boolean flag.
fn parse_bool(var: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: format!("expected a boolean, got \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

// ABOUTME: Environment-driven configuration for the sync engine
// ABOUTME: Parses InfluxDB credentials, Garmin session settings, intervals and feature toggles
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use anyhow::{Context, Result};
use base64::Engine;
use chrono::{NaiveDate, Utc};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// InfluxDB 1.x connection settings.
#[derive(Debug, Clone)]
pub struct InfluxConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    /// Plain HTTP when true, HTTPS with certificate verification otherwise
    pub use_http: bool,
}

impl InfluxConfig {
    /// Base URL for the write/query endpoints.
    #[must_use]
    pub fn base_url(&self) -> String {
        let scheme = if self.use_http { "http" } else { "https" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }
}

/// Complete runtime configuration, sourced from environment variables only.
#[derive(Debug, Clone)]
pub struct Config {
    pub influxdb: InfluxConfig,

    /// Directory holding the persisted Garmin session tokens
    pub token_dir: PathBuf,
    /// Login e-mail; prompted interactively when absent
    pub email: Option<String>,
    /// Login password, decoded from `GARMINCONNECT_BASE64_PASSWORD`
    pub password: Option<String>,

    /// Statically configured device name; `None` enables auto-detection
    pub device_name: Option<String>,

    /// Explicit bulk-mode start date; daemon mode when absent
    pub manual_start_date: Option<NaiveDate>,
    /// Bulk-mode end date, defaulting to today
    pub manual_end_date: NaiveDate,

    /// Long backoff after a rate-limit response (default 1800s)
    pub fetch_failed_backoff: Duration,
    /// Steady-state pause between per-date fetches (default 5s)
    pub rate_limit_interval: Duration,
    /// Daemon poll interval between sync cycles (default 300s)
    pub update_interval: Duration,

    /// Also fetch training readiness, hill score, race predictions, VO2 max
    pub fetch_advanced_training_data: bool,

    /// Persist raw FIT files after successful extraction
    pub keep_fit_files: bool,
    pub fit_file_storage: PathBuf,

    pub log_level: String,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error when a numeric or date-valued variable fails to
    /// parse, or when the base64 password cannot be decoded.
    pub fn from_env() -> Result<Self> {
        let influxdb = InfluxConfig {
            host: env_or("INFLUXDB_HOST", "your.influxdb.hostname"),
            port: parse_env("INFLUXDB_PORT", 8086)?,
            username: env_or("INFLUXDB_USERNAME", "influxdb_username"),
            password: env_or("INFLUXDB_PASSWORD", "influxdb_access_password"),
            database: env_or("INFLUXDB_DATABASE", "GarminStats"),
            use_http: !is_falsy(&env_or("INFLUXDB_ENDPOINT_IS_HTTP", "true")),
        };

        let token_dir = env::var("TOKEN_DIR").map_or_else(
            |_| default_token_dir(),
            |raw| expand_home(&raw),
        );

        let password = match env::var("GARMINCONNECT_BASE64_PASSWORD") {
            Ok(encoded) => Some(decode_password(&encoded)?),
            Err(_) => None,
        };

        let manual_start_date = env::var("MANUAL_START_DATE")
            .ok()
            .map(|raw| parse_date(&raw))
            .transpose()?;
        let manual_end_date = env::var("MANUAL_END_DATE")
            .ok()
            .map_or_else(|| Ok(Utc::now().date_naive()), |raw| parse_date(&raw))?;

        let device_name = env::var("GARMIN_DEVICENAME")
            .ok()
            .filter(|name| !name.is_empty() && name != "Unknown");

        Ok(Self {
            influxdb,
            token_dir,
            email: env::var("GARMINCONNECT_EMAIL").ok(),
            password,
            device_name,
            manual_start_date,
            manual_end_date,
            fetch_failed_backoff: Duration::from_secs(parse_env("FETCH_FAILED_WAIT_SECONDS", 1800)?),
            rate_limit_interval: Duration::from_secs(parse_env("RATE_LIMIT_CALLS_SECONDS", 5)?),
            update_interval: Duration::from_secs(parse_env("UPDATE_INTERVAL_SECONDS", 300)?),
            fetch_advanced_training_data: is_truthy(&env_or("FETCH_ADVANCED_TRAINING_DATA", "false")),
            keep_fit_files: is_truthy(&env_or("KEEP_FIT_FILES", "false")),
            fit_file_storage: env::var("FIT_FILE_STORAGE_LOCATION")
                .map_or_else(|_| default_fit_storage(), PathBuf::from),
            log_level: env_or("LOG_LEVEL", "info"),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("invalid value for {key}: {raw}")),
        Err(_) => Ok(default),
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("invalid date (expected YYYY-MM-DD): {raw}"))
}

fn decode_password(encoded: &str) -> Result<String> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .context("GARMINCONNECT_BASE64_PASSWORD is not valid base64")?;
    String::from_utf8(bytes).context("decoded password is not valid UTF-8")
}

fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.to_lowercase().as_str(),
        "true" | "t" | "yes" | "y" | "1"
    )
}

fn is_falsy(raw: &str) -> bool {
    matches!(raw.to_lowercase().as_str(), "false" | "f" | "no" | "n" | "0")
}

fn expand_home(raw: &str) -> PathBuf {
    raw.strip_prefix("~/").map_or_else(
        || PathBuf::from(raw),
        |rest| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(rest),
    )
}

fn default_token_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".garminconnect")
}

fn default_fit_storage() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fit_filestore")
}

// ABOUTME: Test suite for Garmin session token handling
// ABOUTME: Covers stored-token login and the missing-token failure path
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use chrono::Utc;
use garmin_sync::config::{Config, InfluxConfig};
use garmin_sync::errors::ProviderError;
use garmin_sync::providers::garmin::GarminClient;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn config_with_token_dir(token_dir: &Path) -> Config {
    Config {
        influxdb: InfluxConfig {
            host: "localhost".into(),
            port: 8086,
            username: String::new(),
            password: String::new(),
            database: "GarminStats".into(),
            use_http: true,
        },
        token_dir: token_dir.to_path_buf(),
        email: None,
        password: None,
        device_name: None,
        manual_start_date: None,
        manual_end_date: Utc::now().date_naive(),
        fetch_failed_backoff: Duration::ZERO,
        rate_limit_interval: Duration::ZERO,
        update_interval: Duration::ZERO,
        fetch_advanced_training_data: false,
        keep_fit_files: false,
        fit_file_storage: PathBuf::from("/tmp/garmin-sync-tests/fit"),
        log_level: "info".into(),
    }
}

#[tokio::test]
async fn test_login_succeeds_with_stored_unexpired_tokens() {
    let token_dir = tempfile::tempdir().unwrap();
    std::fs::write(
        token_dir.path().join("oauth_tokens.json"),
        r#"{"access_token":"stored-token","refresh_token":"stored-refresh","expires_at":null}"#,
    )
    .unwrap();

    let client = GarminClient::new(&config_with_token_dir(token_dir.path())).unwrap();
    client.login().await.unwrap();
}

#[tokio::test]
async fn test_login_without_token_file_is_auth_expired() {
    let token_dir = tempfile::tempdir().unwrap();
    let client = GarminClient::new(&config_with_token_dir(token_dir.path())).unwrap();
    let err = client.login().await.unwrap_err();
    assert!(matches!(err, ProviderError::AuthExpired(_)));
}

#[tokio::test]
async fn test_login_with_unreadable_tokens_is_auth_expired() {
    let token_dir = tempfile::tempdir().unwrap();
    std::fs::write(token_dir.path().join("oauth_tokens.json"), "not json").unwrap();

    let client = GarminClient::new(&config_with_token_dir(token_dir.path())).unwrap();
    let err = client.login().await.unwrap_err();
    assert!(matches!(err, ProviderError::AuthExpired(_)));
}

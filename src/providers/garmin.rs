// ABOUTME: Garmin Connect API collaborator with session handling and classified errors
// ABOUTME: Exposes per-date metric fetches and activity export downloads behind a trait
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Thin client for the Garmin Connect web API.
//!
//! Everything the sync engine needs from upstream goes through the
//! [`GarminApi`] trait: one method per metric-family endpoint, the activity
//! export download, and `relogin` for session recovery. All failures surface
//! as [`ProviderError`] so the retry controller can classify them without
//! inspecting HTTP details.

use crate::config::Config;
use crate::errors::ProviderError;
use crate::models::ExportFormat;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Client, ClientBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

const API_BASE_URL: &str = "https://connectapi.garmin.com";
const TOKEN_URL: &str = "https://connectapi.garmin.com/oauth-service/oauth/token";
const TOKEN_FILE: &str = "oauth_tokens.json";

const REQUEST_TIMEOUT_SECS: u64 = 30;
const CONNECT_TIMEOUT_SECS: u64 = 10;
/// Activity exports can be large; give downloads more headroom.
const DOWNLOAD_TIMEOUT_SECS: u64 = 120;

/// Upstream API surface consumed by the sync engine.
///
/// Unimplemented methods default to a fatal error so test doubles only
/// override the endpoints they exercise.
#[async_trait]
pub trait GarminApi: Send + Sync {
    async fn daily_stats(&self, date: NaiveDate) -> Result<Value, ProviderError> {
        let _ = date;
        Err(ProviderError::Other("daily_stats not implemented".into()))
    }

    async fn sleep_data(&self, date: NaiveDate) -> Result<Value, ProviderError> {
        let _ = date;
        Err(ProviderError::Other("sleep_data not implemented".into()))
    }

    async fn heart_rates(&self, date: NaiveDate) -> Result<Value, ProviderError> {
        let _ = date;
        Err(ProviderError::Other("heart_rates not implemented".into()))
    }

    async fn steps_data(&self, date: NaiveDate) -> Result<Value, ProviderError> {
        let _ = date;
        Err(ProviderError::Other("steps_data not implemented".into()))
    }

    async fn stress_data(&self, date: NaiveDate) -> Result<Value, ProviderError> {
        let _ = date;
        Err(ProviderError::Other("stress_data not implemented".into()))
    }

    async fn respiration_data(&self, date: NaiveDate) -> Result<Value, ProviderError> {
        let _ = date;
        Err(ProviderError::Other("respiration_data not implemented".into()))
    }

    async fn hrv_data(&self, date: NaiveDate) -> Result<Value, ProviderError> {
        let _ = date;
        Err(ProviderError::Other("hrv_data not implemented".into()))
    }

    async fn weigh_ins(&self, date: NaiveDate) -> Result<Value, ProviderError> {
        let _ = date;
        Err(ProviderError::Other("weigh_ins not implemented".into()))
    }

    async fn activities_by_date(&self, date: NaiveDate) -> Result<Value, ProviderError> {
        let _ = date;
        Err(ProviderError::Other("activities_by_date not implemented".into()))
    }

    async fn training_readiness(&self, date: NaiveDate) -> Result<Value, ProviderError> {
        let _ = date;
        Err(ProviderError::Other("training_readiness not implemented".into()))
    }

    async fn hill_score(&self, date: NaiveDate) -> Result<Value, ProviderError> {
        let _ = date;
        Err(ProviderError::Other("hill_score not implemented".into()))
    }

    async fn race_predictions(&self) -> Result<Value, ProviderError> {
        Err(ProviderError::Other("race_predictions not implemented".into()))
    }

    async fn max_metrics(&self, date: NaiveDate) -> Result<Value, ProviderError> {
        let _ = date;
        Err(ProviderError::Other("max_metrics not implemented".into()))
    }

    /// Device-sync endpoint; drives device-name auto-detection and the
    /// daemon watermark comparison.
    async fn device_last_used(&self) -> Result<Value, ProviderError> {
        Err(ProviderError::Other("device_last_used not implemented".into()))
    }

    /// Most recent activity, used once per run for local-offset detection.
    async fn last_activity(&self) -> Result<Value, ProviderError> {
        Err(ProviderError::Other("last_activity not implemented".into()))
    }

    async fn download_activity(
        &self,
        id: u64,
        format: ExportFormat,
    ) -> Result<Vec<u8>, ProviderError> {
        let _ = (id, format);
        Err(ProviderError::Other("download_activity not implemented".into()))
    }

    /// Re-establish the session after an auth failure.
    async fn relogin(&self) -> Result<(), ProviderError> {
        Err(ProviderError::Other("relogin not implemented".into()))
    }
}

/// Persisted session tokens, dumped to the token directory after login.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionTokens {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl SessionTokens {
    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| Utc::now() + chrono::Duration::seconds(60) > expires_at)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SocialProfileResponse {
    display_name: Option<String>,
}

/// Production Garmin Connect client.
pub struct GarminClient {
    client: Client,
    download_client: Client,
    token_dir: PathBuf,
    email: Option<String>,
    password: Option<String>,
    tokens: tokio::sync::RwLock<Option<SessionTokens>>,
    display_name: tokio::sync::RwLock<Option<String>>,
}

impl GarminClient {
    /// Create a client from runtime configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self, ProviderError> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ProviderError::Other(format!("failed to build HTTP client: {e}")))?;
        let download_client = ClientBuilder::new()
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ProviderError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            download_client,
            token_dir: config.token_dir.clone(),
            email: config.email.clone(),
            password: config.password.clone(),
            tokens: tokio::sync::RwLock::new(None),
            display_name: tokio::sync::RwLock::new(None),
        })
    }

    /// Log in from stored session tokens, refreshing them when stale.
    ///
    /// # Errors
    ///
    /// `AuthExpired` when no usable token material exists; callers fall back
    /// to [`Self::interactive_login`].
    pub async fn login(&self) -> Result<(), ProviderError> {
        info!(
            "Trying to login to Garmin Connect using token data from directory '{}'",
            self.token_dir.display()
        );
        let path = self.token_dir.join(TOKEN_FILE);
        let raw = tokio::fs::read_to_string(&path).await.map_err(|_| {
            ProviderError::AuthExpired(format!("no stored session tokens at {}", path.display()))
        })?;
        let tokens: SessionTokens = serde_json::from_str(&raw)
            .map_err(|e| ProviderError::AuthExpired(format!("unreadable session tokens: {e}")))?;

        let tokens = if tokens.is_expired() {
            self.refresh_tokens(&tokens).await?
        } else {
            tokens
        };

        *self.tokens.write().await = Some(tokens);
        info!("Login to Garmin Connect successful using stored session tokens");
        Ok(())
    }

    /// First-run login with account credentials and an optional MFA code,
    /// storing tokens for future runs.
    ///
    /// Missing credentials are prompted for on stdin, the same way the
    /// deployment has always worked.
    ///
    /// # Errors
    ///
    /// `AuthExpired` when the credential exchange is rejected.
    pub async fn interactive_login(&self) -> Result<(), ProviderError> {
        warn!("Session is expired or login information not present; interactive login required");
        let email = match &self.email {
            Some(email) => email.clone(),
            None => prompt("Enter Garmin Connect login e-mail: ")?,
        };
        let password = match &self.password {
            Some(password) => password.clone(),
            None => prompt("Enter Garmin Connect password (characters will be visible): ")?,
        };

        let mut form = vec![
            ("grant_type", "password".to_owned()),
            ("username", email),
            ("password", password),
        ];
        let mut response = self.exchange(&form).await;
        if matches!(&response, Err(ProviderError::AuthExpired(msg)) if msg.contains("mfa")) {
            let code = prompt("MFA one-time code (via email or SMS): ")?;
            form.push(("mfa_code", code));
            response = self.exchange(&form).await;
        }
        let tokens = response?;

        self.store_tokens(&tokens).await?;
        *self.tokens.write().await = Some(tokens);
        info!(
            "OAuth tokens stored in '{}' directory for future use",
            self.token_dir.display()
        );
        Ok(())
    }

    async fn refresh_tokens(&self, stale: &SessionTokens) -> Result<SessionTokens, ProviderError> {
        let refresh_token = stale.refresh_token.clone().ok_or_else(|| {
            ProviderError::AuthExpired("session expired and no refresh token stored".into())
        })?;
        info!("Refreshing Garmin Connect access token");
        let tokens = self
            .exchange(&[
                ("grant_type", "refresh_token".to_owned()),
                ("refresh_token", refresh_token),
            ])
            .await?;
        self.store_tokens(&tokens).await?;
        Ok(tokens)
    }

    async fn exchange(&self, form: &[(&str, String)]) -> Result<SessionTokens, ProviderError> {
        let response = self.client.post(TOKEN_URL).form(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::AuthExpired(format!(
                "token exchange failed: HTTP {status}: {body}"
            )));
        }
        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::AuthExpired(format!("bad token response: {e}")))?;
        Ok(SessionTokens {
            access_token: token_response.access_token,
            refresh_token: token_response.refresh_token,
            expires_at: token_response
                .expires_in
                .map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
        })
    }

    async fn store_tokens(&self, tokens: &SessionTokens) -> Result<(), ProviderError> {
        tokio::fs::create_dir_all(&self.token_dir)
            .await
            .map_err(|e| ProviderError::Other(format!("cannot create token directory: {e}")))?;
        let raw = serde_json::to_string_pretty(tokens)
            .map_err(|e| ProviderError::Other(format!("cannot serialize tokens: {e}")))?;
        tokio::fs::write(self.token_dir.join(TOKEN_FILE), raw)
            .await
            .map_err(|e| ProviderError::Other(format!("cannot write token file: {e}")))
    }

    async fn bearer_token(&self) -> Result<String, ProviderError> {
        self.tokens
            .read()
            .await
            .as_ref()
            .map(|tokens| tokens.access_token.clone())
            .ok_or_else(|| ProviderError::AuthExpired("not logged in".into()))
    }

    async fn api_get(&self, endpoint: &str) -> Result<Value, ProviderError> {
        let token = self.bearer_token().await?;
        let url = format!("{API_BASE_URL}/{}", endpoint.trim_start_matches('/'));
        let response = self.client.get(&url).bearer_auth(token).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::from_status(status, endpoint));
        }
        response
            .json()
            .await
            .map_err(|e| ProviderError::Transient(format!("decoding {endpoint}: {e}")))
    }

    /// Display name of the logged-in account, required by several wellness
    /// endpoints; fetched once and cached.
    async fn display_name(&self) -> Result<String, ProviderError> {
        if let Some(name) = self.display_name.read().await.as_ref() {
            return Ok(name.clone());
        }
        let payload = self.api_get("userprofile-service/socialProfile").await?;
        let profile: SocialProfileResponse = serde_json::from_value(payload)
            .map_err(|e| ProviderError::Transient(format!("decoding social profile: {e}")))?;
        let name = profile
            .display_name
            .ok_or_else(|| ProviderError::Other("account has no display name".into()))?;
        *self.display_name.write().await = Some(name.clone());
        Ok(name)
    }
}

#[async_trait]
impl GarminApi for GarminClient {
    async fn daily_stats(&self, date: NaiveDate) -> Result<Value, ProviderError> {
        let display_name = self.display_name().await?;
        self.api_get(&format!(
            "usersummary-service/usersummary/daily/{display_name}?calendarDate={date}"
        ))
        .await
    }

    async fn sleep_data(&self, date: NaiveDate) -> Result<Value, ProviderError> {
        let display_name = self.display_name().await?;
        self.api_get(&format!(
            "wellness-service/wellness/dailySleepData/{display_name}?date={date}&nonSleepBufferMinutes=60"
        ))
        .await
    }

    async fn heart_rates(&self, date: NaiveDate) -> Result<Value, ProviderError> {
        let display_name = self.display_name().await?;
        self.api_get(&format!(
            "wellness-service/wellness/dailyHeartRate/{display_name}?date={date}"
        ))
        .await
    }

    async fn steps_data(&self, date: NaiveDate) -> Result<Value, ProviderError> {
        let display_name = self.display_name().await?;
        self.api_get(&format!(
            "wellness-service/wellness/dailySummaryChart/{display_name}?date={date}"
        ))
        .await
    }

    async fn stress_data(&self, date: NaiveDate) -> Result<Value, ProviderError> {
        self.api_get(&format!("wellness-service/wellness/dailyStress/{date}"))
            .await
    }

    async fn respiration_data(&self, date: NaiveDate) -> Result<Value, ProviderError> {
        self.api_get(&format!("wellness-service/wellness/daily/respiration/{date}"))
            .await
    }

    async fn hrv_data(&self, date: NaiveDate) -> Result<Value, ProviderError> {
        self.api_get(&format!("hrv-service/hrv/{date}")).await
    }

    async fn weigh_ins(&self, date: NaiveDate) -> Result<Value, ProviderError> {
        self.api_get(&format!(
            "weight-service/weight/range/{date}/{date}?includeAll=true"
        ))
        .await
    }

    async fn activities_by_date(&self, date: NaiveDate) -> Result<Value, ProviderError> {
        self.api_get(&format!(
            "activitylist-service/activities/search/activities?startDate={date}&endDate={date}&start=0&limit=100"
        ))
        .await
    }

    async fn training_readiness(&self, date: NaiveDate) -> Result<Value, ProviderError> {
        self.api_get(&format!("metrics-service/metrics/trainingreadiness/{date}"))
            .await
    }

    async fn hill_score(&self, date: NaiveDate) -> Result<Value, ProviderError> {
        self.api_get(&format!(
            "metrics-service/metrics/hillscore?startDate={date}&endDate={date}"
        ))
        .await
    }

    async fn race_predictions(&self) -> Result<Value, ProviderError> {
        let display_name = self.display_name().await?;
        self.api_get(&format!(
            "metrics-service/metrics/racepredictions/latest/{display_name}"
        ))
        .await
    }

    async fn max_metrics(&self, date: NaiveDate) -> Result<Value, ProviderError> {
        self.api_get(&format!("metrics-service/metrics/maxmet/daily/{date}/{date}"))
            .await
    }

    async fn device_last_used(&self) -> Result<Value, ProviderError> {
        self.api_get("device-service/deviceservice/mylastused").await
    }

    async fn last_activity(&self) -> Result<Value, ProviderError> {
        self.api_get("activitylist-service/activities/search/activities?start=0&limit=1")
            .await
    }

    async fn download_activity(
        &self,
        id: u64,
        format: ExportFormat,
    ) -> Result<Vec<u8>, ProviderError> {
        let token = self.bearer_token().await?;
        let endpoint = match format {
            ExportFormat::OriginalFit => format!("download-service/files/activity/{id}"),
            ExportFormat::Tcx => format!("download-service/export/tcx/activity/{id}"),
        };
        let url = format!("{API_BASE_URL}/{endpoint}");
        let response = self
            .download_client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::from_status(status, &endpoint));
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn relogin(&self) -> Result<(), ProviderError> {
        let stale = self.tokens.read().await.clone();
        if let Some(stale) = stale {
            if stale.refresh_token.is_some() {
                let tokens = self.refresh_tokens(&stale).await?;
                *self.tokens.write().await = Some(tokens);
                return Ok(());
            }
        }
        // No refresh token; fall back to stored credentials. MFA-enabled
        // accounts cannot re-authenticate unattended.
        if self.email.is_some() && self.password.is_some() {
            self.interactive_login().await
        } else {
            Err(ProviderError::AuthExpired(
                "session expired: please login again and restart the daemon".into(),
            ))
        }
    }
}

fn prompt(message: &str) -> Result<String, ProviderError> {
    print!("{message}");
    std::io::stdout()
        .flush()
        .map_err(|e| ProviderError::Other(format!("stdout unavailable: {e}")))?;
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .map_err(|e| ProviderError::Other(format!("stdin unavailable: {e}")))?;
    Ok(line.trim().to_owned())
}

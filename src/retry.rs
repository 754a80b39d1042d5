// ABOUTME: Retry controller driving per-date fetches through classified failure handling
// ABOUTME: Rate limits retry the same date, transient errors skip it, auth errors reauthenticate
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Per-date retry state machine.
//!
//! One unit of work is "fetch and transform everything for one calendar
//! date". The controller loops over classified outcomes:
//!
//! `Fetching → (Success → Advance) | (RateLimited → BackoffLong → Fetching) |
//! (Transient → BackoffShort → Advance) | (AuthExpired → Reauth → Fetching) |
//! (Other → Fatal)`

use crate::errors::ProviderError;
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::time::Duration;
use tracing::{error, info};

/// One retryable unit of work plus the session-recovery hook the controller
/// invokes on auth expiry.
#[async_trait]
pub trait SyncUnit: Send {
    async fn fetch_date(&mut self, date: NaiveDate) -> Result<(), ProviderError>;

    async fn reauthenticate(&mut self) -> Result<(), ProviderError>;
}

/// What happened to one date after the controller finished with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOutcome {
    Completed,
    Skipped,
}

/// Backoff policy; all waits block the single execution thread to
/// completion.
#[derive(Debug, Clone, Copy)]
pub struct RetryController {
    /// Wait after a rate-limit response before retrying the same date
    pub long_backoff: Duration,
    /// Steady-state wait after success or before skipping a date; keeps the
    /// request rate low independent of errors
    pub short_backoff: Duration,
    /// Wait after re-authentication before retrying
    pub reauth_delay: Duration,
}

impl RetryController {
    #[must_use]
    pub fn new(long_backoff: Duration, short_backoff: Duration) -> Self {
        Self {
            long_backoff,
            short_backoff,
            reauth_delay: Duration::from_secs(5),
        }
    }

    /// Drive one date to completion or skip.
    ///
    /// # Errors
    ///
    /// Unclassified provider errors and failed re-authentication are fatal
    /// and terminate the run.
    pub async fn drive<U: SyncUnit + ?Sized>(
        &self,
        unit: &mut U,
        date: NaiveDate,
    ) -> anyhow::Result<DateOutcome> {
        loop {
            match unit.fetch_date(date).await {
                Ok(()) => {
                    info!("Success: fetched all available health metrics for date {date} (skipped any if unavailable)");
                    info!("Waiting for {}s before next date", self.short_backoff.as_secs());
                    tokio::time::sleep(self.short_backoff).await;
                    return Ok(DateOutcome::Completed);
                }
                Err(ProviderError::RateLimited(msg)) => {
                    error!("{msg}");
                    info!(
                        "Too many requests (429): will retry date {date} after {}s",
                        self.long_backoff.as_secs()
                    );
                    tokio::time::sleep(self.long_backoff).await;
                }
                Err(ProviderError::Transient(msg)) => {
                    error!("{msg}");
                    info!("Connection error: skipping date {date}");
                    tokio::time::sleep(self.short_backoff).await;
                    return Ok(DateOutcome::Skipped);
                }
                Err(ProviderError::AuthExpired(msg)) => {
                    error!("{msg}");
                    info!("Authentication failed: re-authenticating and retrying date {date}");
                    unit.reauthenticate()
                        .await
                        .map_err(|e| anyhow!("re-authentication failed: {e}"))?;
                    tokio::time::sleep(self.reauth_delay).await;
                }
                Err(err @ ProviderError::Other(_)) => {
                    error!("{err}");
                    return Err(err.into());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedUnit {
        outcomes: Vec<Result<(), ProviderError>>,
        attempts: usize,
        reauths: usize,
    }

    impl ScriptedUnit {
        fn new(outcomes: Vec<Result<(), ProviderError>>) -> Self {
            Self {
                outcomes,
                attempts: 0,
                reauths: 0,
            }
        }
    }

    #[async_trait]
    impl SyncUnit for ScriptedUnit {
        async fn fetch_date(&mut self, _date: NaiveDate) -> Result<(), ProviderError> {
            let outcome = self.outcomes.remove(0);
            self.attempts += 1;
            outcome
        }

        async fn reauthenticate(&mut self) -> Result<(), ProviderError> {
            self.reauths += 1;
            Ok(())
        }
    }

    fn controller() -> RetryController {
        let mut controller = RetryController::new(Duration::ZERO, Duration::ZERO);
        controller.reauth_delay = Duration::ZERO;
        controller
    }

    fn a_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    #[tokio::test]
    async fn test_rate_limit_retries_same_date_until_success() {
        let mut unit = ScriptedUnit::new(vec![
            Err(ProviderError::RateLimited("429".into())),
            Err(ProviderError::RateLimited("429".into())),
            Err(ProviderError::RateLimited("429".into())),
            Ok(()),
        ]);
        let outcome = controller().drive(&mut unit, a_date()).await.unwrap();
        assert_eq!(outcome, DateOutcome::Completed);
        assert_eq!(unit.attempts, 4);
    }

    #[tokio::test]
    async fn test_transient_error_skips_after_single_attempt() {
        let mut unit = ScriptedUnit::new(vec![Err(ProviderError::Transient("timeout".into()))]);
        let outcome = controller().drive(&mut unit, a_date()).await.unwrap();
        assert_eq!(outcome, DateOutcome::Skipped);
        assert_eq!(unit.attempts, 1);
    }

    #[tokio::test]
    async fn test_auth_expiry_reauthenticates_then_retries() {
        let mut unit = ScriptedUnit::new(vec![
            Err(ProviderError::AuthExpired("401".into())),
            Ok(()),
        ]);
        let outcome = controller().drive(&mut unit, a_date()).await.unwrap();
        assert_eq!(outcome, DateOutcome::Completed);
        assert_eq!(unit.attempts, 2);
        assert_eq!(unit.reauths, 1);
    }

    #[tokio::test]
    async fn test_unclassified_error_is_fatal() {
        let mut unit = ScriptedUnit::new(vec![Err(ProviderError::Other("boom".into()))]);
        assert!(controller().drive(&mut unit, a_date()).await.is_err());
        assert_eq!(unit.attempts, 1);
    }
}

// ABOUTME: Structured error types for the sync engine with retry classification
// ABOUTME: Separates upstream API errors, track parse errors and sink write errors
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use thiserror::Error;

/// Classified errors surfaced by the Garmin Connect collaborator.
///
/// The retry controller drives its whole policy off this classification:
/// rate limits retry the same date after a long backoff, transient failures
/// skip the date, expired sessions trigger re-authentication, and anything
/// unclassified terminates the run.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP 429 from the upstream API
    #[error("rate limited by Garmin Connect: {0}")]
    RateLimited(String),

    /// Network failure, timeout, or non-auth HTTP error
    #[error("transient connection error: {0}")]
    Transient(String),

    /// HTTP 401/403 or a rejected session token
    #[error("Garmin Connect session expired: {0}")]
    AuthExpired(String),

    /// Anything that does not fit a retry class; fatal to the run
    #[error("unclassified provider error: {0}")]
    Other(String),
}

impl ProviderError {
    /// Classify an HTTP response status the way the retry policy expects.
    pub fn from_status(status: reqwest::StatusCode, context: &str) -> Self {
        match status.as_u16() {
            429 => Self::RateLimited(format!("{context}: HTTP 429")),
            401 | 403 => Self::AuthExpired(format!("{context}: HTTP {status}")),
            _ => Self::Transient(format!("{context}: HTTP {status}")),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        // reqwest errors here are send/read failures; status classification
        // happens before the body is consumed.
        Self::Transient(err.to_string())
    }
}

/// Failures while decoding an activity export.
///
/// A FIT-side failure triggers the TCX fallback chain; a TCX-side failure is
/// terminal for that activity only.
#[derive(Debug, Error)]
pub enum TrackParseError {
    #[error("no FIT file found in the downloaded archive")]
    MissingFitFile,

    #[error("malformed track data: {0}")]
    Malformed(String),
}

/// Errors from the time-series sink. Logged and swallowed by the
/// orchestrator; a failed batch is dropped, never retried.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("sink rejected request: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

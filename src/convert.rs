// ABOUTME: Pure unit and timestamp conversions shared by transformers and track parsing
// ABOUTME: Semicircle angles, epoch milliseconds, naive GMT strings and activity selectors
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Scale factor for the FIT signed 32-bit semicircle angle encoding, where
/// ±2³¹ represents ±180°.
const SEMICIRCLE_SCALE: f64 = 180.0 / 2_147_483_648.0;

/// Convert a semicircle-encoded angle to degrees.
#[must_use]
pub fn semicircles_to_degrees(raw: i64) -> f64 {
    raw as f64 * SEMICIRCLE_SCALE
}

/// Convert epoch milliseconds to a UTC instant.
#[must_use]
pub fn epoch_millis_to_utc(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

/// Parse a naive GMT timestamp with fractional seconds
/// (`2024-05-01T06:00:00.0`) as a UTC instant.
#[must_use]
pub fn parse_gmt_fractional(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw.trim_end_matches('Z'), "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Parse the space-separated GMT timestamp used by activity summaries
/// (`2024-05-01 06:00:00`) as a UTC instant.
#[must_use]
pub fn parse_gmt_spaced(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Noon UTC of a calendar date, the anchor used for daily-granularity
/// records that carry no timestamp of their own.
#[must_use]
pub fn date_noon_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(12, 0, 0)
        .unwrap_or_else(|| date.and_time(chrono::NaiveTime::MIN))
        .and_utc()
}

/// Composite tag identifying one activity instance, shared by the summary
/// end marker and every GPS track point so they can be correlated later.
#[must_use]
pub fn activity_selector(start: DateTime<Utc>, type_key: &str) -> String {
    format!("{}{}", start.format("%Y%m%dT%H%M%SUTC-"), type_key)
}

// ABOUTME: Sync window resolution, watermark seeding and local-offset detection
// ABOUTME: Computes the descending set of calendar dates still needing a fetch
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use crate::providers::garmin::GarminApi;
use crate::sink::TimeSeriesSink;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};

/// Measurement used as the watermark anchor; intraday heart rate is the
/// densest series, so its newest row marks how far syncing really got.
const WATERMARK_MEASUREMENT: &str = "HeartRateIntraday";

/// Days fetched on a fresh database with no previous sync.
const INITIAL_FETCH_DAYS: i64 = 7;

/// Inclusive calendar window from `start` to `end`, most recent date first.
///
/// Reverse-chronological processing is deliberate: the freshest data lands
/// first if the run is interrupted. Empty when `start > end`.
#[must_use]
pub fn sync_window(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut current = end;
    while current >= start {
        dates.push(current);
        current -= Duration::days(1);
    }
    dates
}

/// Seed the watermark from the sink's newest stored record, defaulting to
/// seven days back when the database is empty or unreachable.
pub async fn seed_watermark(sink: &dyn TimeSeriesSink) -> DateTime<Utc> {
    match sink.query_last_timestamp(WATERMARK_MEASUREMENT).await {
        Ok(Some(last)) => {
            info!("Resuming sync from last stored record at {last} UTC");
            last
        }
        Ok(None) => {
            warn!(
                "No previously synced data found in InfluxDB, defaulting to {INITIAL_FETCH_DAYS} day initial fetch. \
                 Use MANUAL_START_DATE to bulk update past data"
            );
            Utc::now() - Duration::days(INITIAL_FETCH_DAYS)
        }
        Err(err) => {
            warn!("Watermark query failed ({err}), defaulting to {INITIAL_FETCH_DAYS} day initial fetch");
            Utc::now() - Duration::days(INITIAL_FETCH_DAYS)
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LastActivityTimes {
    start_time_local: Option<String>,
    #[serde(rename = "startTimeGMT")]
    start_time_gmt: Option<String>,
}

/// Detect the fixed offset between the account's local time and UTC by
/// comparing one recent activity's local and GMT start times. Zero when
/// undeterminable.
pub async fn detect_local_offset(api: &dyn GarminApi) -> Duration {
    let payload = match api.last_activity().await {
        Ok(payload) => payload,
        Err(err) => {
            warn!("Unable to fetch recent activity for timezone detection ({err}), defaulting to UTC offset of 0");
            return Duration::zero();
        }
    };
    let first = payload.as_array().and_then(|list| list.first()).cloned();
    let times: Option<LastActivityTimes> =
        first.and_then(|value| serde_json::from_value(value).ok());

    let offset = times.and_then(|times| {
        let local = parse_activity_time(times.start_time_local.as_deref()?)?;
        let gmt = parse_activity_time(times.start_time_gmt.as_deref()?)?;
        Some(local - gmt)
    });

    match offset {
        Some(offset) => {
            if offset >= Duration::zero() {
                info!("Automatically identified user's local timezone as UTC+{offset}");
            } else {
                info!("Automatically identified user's local timezone as UTC{offset}");
            }
            offset
        }
        None => {
            warn!("Unable to determine user's timezone from recent activity data, defaulting to UTC offset of 0");
            Duration::zero()
        }
    }
}

fn parse_activity_time(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_window_is_inclusive_and_descending() {
        let window = sync_window(date(2024, 5, 1), date(2024, 5, 3));
        assert_eq!(window.len(), 3);
        assert_eq!(window[0], date(2024, 5, 3));
        assert_eq!(window[window.len() - 1], date(2024, 5, 1));
        assert!(window.windows(2).all(|pair| pair[0] > pair[1]));
    }

    #[test]
    fn test_window_single_day() {
        let window = sync_window(date(2024, 5, 1), date(2024, 5, 1));
        assert_eq!(window, vec![date(2024, 5, 1)]);
    }

    #[test]
    fn test_window_spans_month_boundary() {
        let window = sync_window(date(2024, 4, 28), date(2024, 5, 2));
        assert_eq!(window.len(), 5);
        assert_eq!(window[0], date(2024, 5, 2));
        assert_eq!(window[4], date(2024, 4, 28));
    }

    #[test]
    fn test_window_empty_when_start_after_end() {
        assert!(sync_window(date(2024, 5, 3), date(2024, 5, 1)).is_empty());
    }
}

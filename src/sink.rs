// ABOUTME: Time-series sink collaborator writing canonical points to InfluxDB 1.x
// ABOUTME: Implements line-protocol encoding, batch writes and the last-timestamp query
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use crate::config::InfluxConfig;
use crate::errors::SinkError;
use crate::models::{FieldValue, TimePoint};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, ClientBuilder};
use serde::Deserialize;
use std::fmt::Write as _;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Sink surface consumed by the orchestrator.
///
/// Write failures are the caller's to log and swallow; the sink itself never
/// retries.
#[async_trait]
pub trait TimeSeriesSink: Send + Sync {
    async fn write(&self, points: &[TimePoint]) -> Result<(), SinkError>;

    /// Most recent stored timestamp for a measurement, used once at startup
    /// to seed the sync watermark.
    async fn query_last_timestamp(
        &self,
        measurement: &str,
    ) -> Result<Option<DateTime<Utc>>, SinkError>;
}

/// InfluxDB 1.x client over the `/write` and `/query` HTTP endpoints.
pub struct InfluxSink {
    client: Client,
    base_url: String,
    database: String,
    username: String,
    password: String,
}

impl InfluxSink {
    /// Build a sink from connection settings.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be constructed.
    pub fn new(config: &InfluxConfig) -> Result<Self, SinkError> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url(),
            database: config.database.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// Connectivity probe, called once at startup so a misconfigured
    /// database aborts before any fetching starts.
    ///
    /// # Errors
    ///
    /// Returns the underlying HTTP or status error.
    pub async fn ping(&self) -> Result<(), SinkError> {
        let response = self
            .client
            .get(format!("{}/ping", self.base_url))
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(SinkError::Rejected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }
}

#[async_trait]
impl TimeSeriesSink for InfluxSink {
    async fn write(&self, points: &[TimePoint]) -> Result<(), SinkError> {
        if points.is_empty() {
            return Ok(());
        }
        let body = points
            .iter()
            .map(line_protocol)
            .collect::<Vec<_>>()
            .join("\n");
        let response = self
            .client
            .post(format!("{}/write", self.base_url))
            .query(&[("db", self.database.as_str()), ("precision", "ns")])
            .basic_auth(&self.username, Some(&self.password))
            .body(body)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(SinkError::Rejected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }

    async fn query_last_timestamp(
        &self,
        measurement: &str,
    ) -> Result<Option<DateTime<Utc>>, SinkError> {
        let query = format!("SELECT * FROM \"{measurement}\" ORDER BY time DESC LIMIT 1");
        let response = self
            .client
            .get(format!("{}/query", self.base_url))
            .query(&[("db", self.database.as_str()), ("q", query.as_str())])
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        let payload: QueryResponse = response.json().await?;
        Ok(payload.last_time())
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<QueryResult>,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    #[serde(default)]
    series: Vec<QuerySeries>,
}

#[derive(Debug, Deserialize)]
struct QuerySeries {
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

impl QueryResponse {
    fn last_time(&self) -> Option<DateTime<Utc>> {
        let series = self.results.first()?.series.first()?;
        let time_index = series.columns.iter().position(|c| c == "time")?;
        let raw = series.values.first()?.get(time_index)?.as_str()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Encode one point as an InfluxDB line-protocol record with nanosecond
/// precision. Tags are already ordered by the `BTreeMap` backing the point.
fn line_protocol(point: &TimePoint) -> String {
    let mut line = escape_measurement(&point.measurement);
    for (key, value) in &point.tags {
        let _ = write!(line, ",{}={}", escape_key(key), escape_key(value));
    }
    line.push(' ');
    let mut first = true;
    for (key, value) in &point.fields {
        if !first {
            line.push(',');
        }
        first = false;
        match value {
            FieldValue::Float(v) => {
                let _ = write!(line, "{}={v}", escape_key(key));
            }
            FieldValue::Integer(v) => {
                let _ = write!(line, "{}={v}i", escape_key(key));
            }
            FieldValue::Text(v) => {
                let _ = write!(line, "{}=\"{}\"", escape_key(key), escape_field_text(v));
            }
        }
    }
    let nanos = point.time.timestamp_nanos_opt().unwrap_or_default();
    let _ = write!(line, " {nanos}");
    line
}

fn escape_measurement(raw: &str) -> String {
    raw.replace(',', "\\,").replace(' ', "\\ ")
}

fn escape_key(raw: &str) -> String {
    raw.replace(',', "\\,").replace('=', "\\=").replace(' ', "\\ ")
}

fn escape_field_text(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_point() -> TimePoint {
        let time = Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap();
        let mut point = TimePoint::new("ActivitySummary", time)
            .tag("Device", "Forerunner 955")
            .tag("ActivityID", "42");
        point.field_float("distance", Some(1000.5));
        point.field_integer("lapCount", Some(3.0));
        point.field_text("activityName", Some("Morning Run"));
        point
    }

    #[test]
    fn test_line_protocol_encoding() {
        let line = line_protocol(&sample_point());
        assert_eq!(
            line,
            "ActivitySummary,ActivityID=42,Device=Forerunner\\ 955 \
             activityName=\"Morning Run\",distance=1000.5,lapCount=3i \
             1714543200000000000"
        );
    }

    #[test]
    fn test_line_protocol_escapes_quotes() {
        let time = Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap();
        let mut point = TimePoint::new("DeviceSync", time);
        point.field_text("imageUrl", Some("a\"b"));
        assert!(line_protocol(&point).contains("imageUrl=\"a\\\"b\""));
    }

    #[test]
    fn test_query_response_time_extraction() {
        let payload: QueryResponse = serde_json::from_str(
            r#"{"results":[{"series":[{"name":"HeartRateIntraday",
                "columns":["time","HeartRate"],
                "values":[["2024-05-01T06:00:00Z",62]]}]}]}"#,
        )
        .unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap();
        assert_eq!(payload.last_time(), Some(expected));
    }

    #[test]
    fn test_query_response_empty() {
        let payload: QueryResponse = serde_json::from_str(r#"{"results":[{}]}"#).unwrap();
        assert_eq!(payload.last_time(), None);
    }
}

// ABOUTME: Canonical data models for the sync engine
// ABOUTME: Defines TimePoint, FieldValue, ActivityRef, TrackSample and export formats
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Data Models
//!
//! All transformers emit the same canonical unit: a [`TimePoint`] carrying a
//! measurement name, a UTC timestamp, ordered tags and non-null fields. A
//! point with zero fields is never written; absence is modeled by leaving
//! the field out entirely, so a value of exactly zero is always a real
//! reading.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// A single field value on a time-series point.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    Text(String),
}

/// Canonical time-series output unit.
#[derive(Debug, Clone)]
pub struct TimePoint {
    pub measurement: String,
    pub time: DateTime<Utc>,
    /// Ordered mapping; always contains the device identity
    pub tags: BTreeMap<String, String>,
    /// Only non-null source values are present
    pub fields: BTreeMap<String, FieldValue>,
}

impl TimePoint {
    #[must_use]
    pub fn new(measurement: &str, time: DateTime<Utc>) -> Self {
        Self {
            measurement: measurement.to_owned(),
            time,
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn tag(mut self, key: &str, value: &str) -> Self {
        self.tags.insert(key.to_owned(), value.to_owned());
        self
    }

    /// Insert a float field when the source value is present.
    pub fn field_float(&mut self, key: &str, value: Option<f64>) {
        if let Some(v) = value {
            self.fields.insert(key.to_owned(), FieldValue::Float(v));
        }
    }

    /// Insert an integer field when the source value is present.
    ///
    /// Upstream payloads occasionally deliver integral values as floats;
    /// they are rounded rather than truncated.
    #[allow(clippy::cast_possible_truncation)]
    pub fn field_integer(&mut self, key: &str, value: Option<f64>) {
        if let Some(v) = value {
            self.fields
                .insert(key.to_owned(), FieldValue::Integer(v.round() as i64));
        }
    }

    /// Insert a string field when the source value is present.
    pub fn field_text(&mut self, key: &str, value: Option<&str>) {
        if let Some(v) = value {
            self.fields
                .insert(key.to_owned(), FieldValue::Text(v.to_owned()));
        }
    }

    /// A point is emitted only if at least one field survived.
    #[must_use]
    pub fn has_fields(&self) -> bool {
        !self.fields.is_empty()
    }
}

/// Transient reference to an activity produced while transforming a day's
/// summaries and consumed immediately by the GPS extractor.
#[derive(Debug, Clone)]
pub struct ActivityRef {
    pub id: u64,
    pub type_key: String,
    pub has_track: bool,
}

/// One timestamped GPS/sensor reading inside a single activity's route.
#[derive(Debug, Clone, Default)]
pub struct TrackSample {
    pub timestamp: Option<DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub distance: Option<f64>,
    pub heart_rate: Option<f64>,
    pub speed: Option<f64>,
    pub cadence: Option<f64>,
    pub fractional_cadence: Option<f64>,
    pub temperature: Option<f64>,
    pub power: Option<f64>,
    pub accumulated_power: Option<f64>,
    /// Lap index, only known on the TCX fallback path
    pub lap: Option<i64>,
}

/// Export formats offered by the activity download endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// ZIP archive containing the device's original FIT recording
    OriginalFit,
    /// Training Center XML rendition of the same activity
    Tcx,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_fields_are_not_inserted() {
        let mut point = TimePoint::new("DailyStats", Utc::now());
        point.field_float("totalDistanceMeters", None);
        point.field_integer("totalSteps", None);
        assert!(!point.has_fields());
    }

    #[test]
    fn test_zero_is_a_valid_reading() {
        let mut point = TimePoint::new("StepsIntraday", Utc::now());
        point.field_integer("StepsCount", Some(0.0));
        assert!(point.has_fields());
        assert_eq!(
            point.fields.get("StepsCount"),
            Some(&FieldValue::Integer(0))
        );
    }
}

// ABOUTME: FIT binary track parsing from the original activity export archive
// ABOUTME: Decodes record messages into track samples with semicircle conversion
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use crate::convert::semicircles_to_degrees;
use crate::errors::TrackParseError;
use crate::models::TrackSample;
use chrono::{DateTime, Utc};
use fitparser::profile::MesgNum;
use fitparser::Value as FitValue;
use std::io::{Cursor, Read};

/// Result of a successful FIT extraction: the activity start instant, the
/// ordered samples, and the raw FIT bytes for optional persistence.
#[derive(Debug)]
pub struct ParsedFit {
    pub start_time: DateTime<Utc>,
    pub samples: Vec<TrackSample>,
    pub fit_data: Vec<u8>,
}

/// Parse the original export archive (a ZIP wrapping one FIT file).
///
/// # Errors
///
/// `MissingFitFile` when the archive holds no `.fit` entry, `Malformed` for
/// an unreadable archive or FIT stream; either triggers the TCX fallback.
pub fn parse_archive(archive_bytes: &[u8]) -> Result<ParsedFit, TrackParseError> {
    let fit_data = extract_fit_entry(archive_bytes)?;
    let mut samples = parse_records(&fit_data)?;
    samples.sort_by_key(|sample| sample.timestamp);
    let start_time = samples
        .first()
        .and_then(|sample| sample.timestamp)
        .ok_or_else(|| TrackParseError::Malformed("no timestamped record messages".into()))?;
    Ok(ParsedFit {
        start_time,
        samples,
        fit_data,
    })
}

fn extract_fit_entry(archive_bytes: &[u8]) -> Result<Vec<u8>, TrackParseError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(archive_bytes))
        .map_err(|e| TrackParseError::Malformed(format!("unreadable export archive: {e}")))?;
    let name = archive
        .file_names()
        .find(|name| name.ends_with(".fit"))
        .map(str::to_owned)
        .ok_or(TrackParseError::MissingFitFile)?;
    let mut entry = archive
        .by_name(&name)
        .map_err(|e| TrackParseError::Malformed(format!("unreadable archive entry: {e}")))?;
    let mut fit_data = Vec::new();
    entry
        .read_to_end(&mut fit_data)
        .map_err(|e| TrackParseError::Malformed(format!("truncated archive entry: {e}")))?;
    Ok(fit_data)
}

fn parse_records(fit_data: &[u8]) -> Result<Vec<TrackSample>, TrackParseError> {
    let records = fitparser::from_reader(&mut Cursor::new(fit_data))
        .map_err(|e| TrackParseError::Malformed(format!("FIT decode failed: {e}")))?;

    let mut samples = Vec::new();
    for record in records.iter().filter(|r| r.kind() == MesgNum::Record) {
        let mut sample = TrackSample::default();
        for field in record.fields() {
            let value = field.value();
            match field.name() {
                "timestamp" => sample.timestamp = fit_timestamp(value),
                "position_lat" => {
                    sample.latitude = fit_i64(value).map(semicircles_to_degrees);
                }
                "position_long" => {
                    sample.longitude = fit_i64(value).map(semicircles_to_degrees);
                }
                // enhanced_* variants win over their 16-bit counterparts
                "enhanced_altitude" => sample.altitude = fit_f64(value).or(sample.altitude),
                "altitude" => {
                    if sample.altitude.is_none() {
                        sample.altitude = fit_f64(value);
                    }
                }
                "enhanced_speed" => sample.speed = fit_f64(value).or(sample.speed),
                "speed" => {
                    if sample.speed.is_none() {
                        sample.speed = fit_f64(value);
                    }
                }
                "distance" => sample.distance = fit_f64(value),
                "heart_rate" => sample.heart_rate = fit_f64(value),
                "cadence" => sample.cadence = fit_f64(value),
                "fractional_cadence" => sample.fractional_cadence = fit_f64(value),
                "temperature" => sample.temperature = fit_f64(value),
                "power" => sample.power = fit_f64(value),
                "accumulated_power" => sample.accumulated_power = fit_f64(value),
                _ => {}
            }
        }
        if sample.timestamp.is_some() {
            samples.push(sample);
        }
    }
    Ok(samples)
}

fn fit_timestamp(value: &FitValue) -> Option<DateTime<Utc>> {
    match value {
        FitValue::Timestamp(ts) => Some(ts.with_timezone(&Utc)),
        _ => None,
    }
}

fn fit_i64(value: &FitValue) -> Option<i64> {
    match value {
        FitValue::SInt8(v) => Some(i64::from(*v)),
        FitValue::UInt8(v) | FitValue::UInt8z(v) | FitValue::Byte(v) => Some(i64::from(*v)),
        FitValue::SInt16(v) => Some(i64::from(*v)),
        FitValue::UInt16(v) | FitValue::UInt16z(v) => Some(i64::from(*v)),
        FitValue::SInt32(v) => Some(i64::from(*v)),
        FitValue::UInt32(v) | FitValue::UInt32z(v) => Some(i64::from(*v)),
        FitValue::SInt64(v) => Some(*v),
        _ => None,
    }
}

#[allow(clippy::cast_precision_loss)]
fn fit_f64(value: &FitValue) -> Option<f64> {
    match value {
        FitValue::Float32(v) => Some(f64::from(*v)),
        FitValue::Float64(v) => Some(*v),
        FitValue::UInt64(v) | FitValue::UInt64z(v) => Some(*v as f64),
        other => fit_i64(other).map(|v| v as f64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_zip_bytes_are_malformed() {
        let err = parse_archive(b"definitely not a zip archive").unwrap_err();
        assert!(matches!(err, TrackParseError::Malformed(_)));
    }

    #[test]
    fn test_empty_archive_is_missing_fit() {
        // Minimal end-of-central-directory record: a valid, empty ZIP
        let empty_zip: &[u8] = &[
            0x50, 0x4b, 0x05, 0x06, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        ];
        let err = parse_archive(empty_zip).unwrap_err();
        assert!(matches!(err, TrackParseError::MissingFitFile));
    }
}

// ABOUTME: Test suite for the GPS track extractor
// ABOUTME: Covers the TCX fallback chain, dedup short-circuit and timeout abort
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use garmin_sync::config::{Config, InfluxConfig};
use garmin_sync::context::RunContext;
use garmin_sync::errors::ProviderError;
use garmin_sync::models::{ActivityRef, ExportFormat, FieldValue};
use garmin_sync::providers::garmin::GarminApi;
use garmin_sync::track::TrackExtractor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const TCX_SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TrainingCenterDatabase xmlns="http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2"
                        xmlns:ns3="http://www.garmin.com/xmlschemas/ActivityExtension/v2">
  <Activities>
    <Activity Sport="Running">
      <Id>2024-05-01T06:00:00.000Z</Id>
      <Lap StartTime="2024-05-01T06:00:00.000Z">
        <Track>
          <Trackpoint>
            <Time>2024-05-01T06:00:00.000Z</Time>
            <Position>
              <LatitudeDegrees>48.137154</LatitudeDegrees>
              <LongitudeDegrees>11.576124</LongitudeDegrees>
            </Position>
            <AltitudeMeters>520.0</AltitudeMeters>
            <DistanceMeters>0.0</DistanceMeters>
            <HeartRateBpm><Value>92</Value></HeartRateBpm>
            <Extensions><ns3:TPX><ns3:Speed>2.5</ns3:Speed></ns3:TPX></Extensions>
          </Trackpoint>
          <Trackpoint>
            <Time>2024-05-01T06:00:05.000Z</Time>
            <Position>
              <LatitudeDegrees>not-a-number</LatitudeDegrees>
              <LongitudeDegrees>11.576200</LongitudeDegrees>
            </Position>
            <AltitudeMeters>521.0</AltitudeMeters>
            <DistanceMeters>12.5</DistanceMeters>
            <HeartRateBpm><Value>95</Value></HeartRateBpm>
          </Trackpoint>
        </Track>
      </Lap>
    </Activity>
  </Activities>
</TrainingCenterDatabase>"#;

/// Mock source whose FIT export is always malformed, forcing the TCX path.
struct FallbackApi {
    fit_downloads: AtomicUsize,
    tcx_downloads: AtomicUsize,
    tcx_times_out: bool,
}

impl FallbackApi {
    fn new(tcx_times_out: bool) -> Self {
        Self {
            fit_downloads: AtomicUsize::new(0),
            tcx_downloads: AtomicUsize::new(0),
            tcx_times_out,
        }
    }
}

#[async_trait]
impl GarminApi for FallbackApi {
    async fn download_activity(
        &self,
        _id: u64,
        format: ExportFormat,
    ) -> Result<Vec<u8>, ProviderError> {
        match format {
            ExportFormat::OriginalFit => {
                self.fit_downloads.fetch_add(1, Ordering::SeqCst);
                Ok(b"definitely not a zip archive".to_vec())
            }
            ExportFormat::Tcx => {
                self.tcx_downloads.fetch_add(1, Ordering::SeqCst);
                if self.tcx_times_out {
                    Err(ProviderError::Transient("request timed out".into()))
                } else {
                    Ok(TCX_SAMPLE.as_bytes().to_vec())
                }
            }
        }
    }
}

fn test_config() -> Config {
    Config {
        influxdb: InfluxConfig {
            host: "localhost".into(),
            port: 8086,
            username: String::new(),
            password: String::new(),
            database: "GarminStats".into(),
            use_http: true,
        },
        token_dir: PathBuf::from("/tmp/garmin-sync-tests"),
        email: None,
        password: None,
        device_name: Some("TestDevice".into()),
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

fn running_ref() -> ActivityRef {
    ActivityRef {
        id: 42,
        type_key: "running".to_owned(),
        has_track: true,
    }
}

#[tokio::test]
async fn test_fit_failure_falls_back_to_tcx() {
    let api = FallbackApi::new(false);
    let config = test_config();
    let extractor = TrackExtractor::new(&api, &config);
    let mut ctx = RunContext::new(Some("TestDevice".into()));

    let points = extractor.extract(&[running_ref()], &mut ctx).await.unwrap();

    assert_eq!(api.fit_downloads.load(Ordering::SeqCst), 1);
    // The fallback download is issued exactly once
    assert_eq!(api.tcx_downloads.load(Ordering::SeqCst), 1);

    assert_eq!(points.len(), 2);
    for point in &points {
        assert_eq!(point.measurement, "ActivityGPS");
        // Same activity-instance key the FIT path would have produced
        assert_eq!(
            point.tags.get("ActivitySelector").map(String::as_str),
            Some("20240501T060000UTC-running")
        );
        assert_eq!(point.tags.get("ActivityID").map(String::as_str), Some("42"));
    }
    assert!(points[0].time < points[1].time);

    // Unparsable latitude is absent, the sample itself is kept
    let second = &points[1];
    assert!(!second.fields.contains_key("Latitude"));
    assert_eq!(
        second.fields.get("Longitude"),
        Some(&FieldValue::Float(11.5762))
    );
    assert_eq!(second.fields.get("lap"), Some(&FieldValue::Integer(1)));
    assert_eq!(
        second.fields.get("HeartRate"),
        Some(&FieldValue::Float(95.0))
    );
}

#[tokio::test]
async fn test_second_extraction_is_deduplicated_without_network() {
    let api = FallbackApi::new(false);
    let config = test_config();
    let extractor = TrackExtractor::new(&api, &config);
    let mut ctx = RunContext::new(Some("TestDevice".into()));

    let first = extractor.extract(&[running_ref()], &mut ctx).await.unwrap();
    assert!(!first.is_empty());
    let downloads_after_first = api.fit_downloads.load(Ordering::SeqCst)
        + api.tcx_downloads.load(Ordering::SeqCst);

    let second = extractor.extract(&[running_ref()], &mut ctx).await.unwrap();
    assert!(second.is_empty());
    let downloads_after_second = api.fit_downloads.load(Ordering::SeqCst)
        + api.tcx_downloads.load(Ordering::SeqCst);
    assert_eq!(downloads_after_first, downloads_after_second);
}

#[tokio::test]
async fn test_tcx_timeout_aborts_activity_with_empty_result() {
    let api = FallbackApi::new(true);
    let config = test_config();
    let extractor = TrackExtractor::new(&api, &config);
    let mut ctx = RunContext::new(Some("TestDevice".into()));

    let points = extractor.extract(&[running_ref()], &mut ctx).await.unwrap();
    assert!(points.is_empty());
    // The attempt still enters the dedup guard
    assert!(ctx.is_activity_parsed(42));
}

#[tokio::test]
async fn test_refs_without_track_are_ignored() {
    let api = FallbackApi::new(false);
    let config = test_config();
    let extractor = TrackExtractor::new(&api, &config);
    let mut ctx = RunContext::new(Some("TestDevice".into()));

    let aref = ActivityRef {
        id: 7,
        type_key: "treadmill_running".to_owned(),
        has_track: false,
    };
    let points = extractor.extract(&[aref], &mut ctx).await.unwrap();
    assert!(points.is_empty());
    assert_eq!(api.fit_downloads.load(Ordering::SeqCst), 0);
}

#[test]
fn test_timestamp_ordering_is_ascending_after_parse() {
    let activities = garmin_sync::track::tcx::parse(TCX_SAMPLE).unwrap();
    assert_eq!(activities.len(), 1);
    let samples = &activities[0].samples;
    assert_eq!(samples.len(), 2);
    assert!(samples[0].timestamp < samples[1].timestamp);
    assert_eq!(
        activities[0].start_time,
        Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap()
    );
}

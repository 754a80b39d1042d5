// ABOUTME: Test suite for the metric transformer registry
// ABOUTME: Covers anchor requirements, zero-valued readings and the activity end-marker pair
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use chrono::{NaiveDate, TimeZone, Utc};
use garmin_sync::context::RunContext;
use garmin_sync::models::FieldValue;
use garmin_sync::transform::{self, MetricFamily};
use serde_json::json;

fn ctx() -> RunContext {
    RunContext::new(Some("TestDevice".to_owned()))
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_daily_stats_null_anchor_yields_no_points() {
    let payload = json!({
        "wellnessStartTimeGmt": null,
        "totalSteps": 9000,
        "restingHeartRate": 52
    });
    let points = MetricFamily::DailyStats
        .transform(&payload, &ctx(), date(2024, 5, 1))
        .unwrap();
    assert!(points.is_empty());
}

#[test]
fn test_daily_stats_anchored_point_keeps_zero_values() {
    let payload = json!({
        "wellnessStartTimeGmt": "2024-05-01T00:00:00.0",
        "totalSteps": 0,
        "totalDistanceMeters": 0.0,
        "restingHeartRate": 52
    });
    let points = MetricFamily::DailyStats
        .transform(&payload, &ctx(), date(2024, 5, 1))
        .unwrap();
    assert_eq!(points.len(), 1);
    let point = &points[0];
    assert_eq!(point.measurement, "DailyStats");
    assert_eq!(point.tags.get("Device").map(String::as_str), Some("TestDevice"));
    assert_eq!(point.fields.get("totalSteps"), Some(&FieldValue::Integer(0)));
    assert_eq!(
        point.fields.get("totalDistanceMeters"),
        Some(&FieldValue::Float(0.0))
    );
    // Null source values never become fields
    assert!(!point.fields.contains_key("maxHeartRate"));
}

#[test]
fn test_daily_stats_for_current_date_is_withheld() {
    let today = Utc::now().date_naive();
    let payload = json!({
        "wellnessStartTimeGmt": format!("{today}T00:00:00.0"),
        "totalSteps": 100
    });
    let points = MetricFamily::DailyStats
        .transform(&payload, &ctx(), today)
        .unwrap();
    assert!(points.is_empty());
}

#[test]
fn test_activity_summary_emits_start_and_end_points() {
    let payload = json!([{
        "activityId": 42,
        "activityName": "Morning Run",
        "activityType": {"typeKey": "running"},
        "startTimeGMT": "2024-05-01 06:00:00",
        "elapsedDuration": 1800.0,
        "distance": 5000.0,
        "hasPolyline": true
    }]);
    let (points, refs) = transform::activity::transform(&payload, &ctx()).unwrap();

    assert_eq!(points.len(), 2);
    let start = &points[0];
    let end = &points[1];
    assert_eq!(start.measurement, "ActivitySummary");
    assert_eq!(
        start.time,
        Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap()
    );
    assert_eq!((end.time - start.time).num_seconds(), 1800);
    assert_eq!(
        end.fields.get("activityName"),
        Some(&FieldValue::Text("END".to_owned()))
    );
    assert_eq!(
        end.fields.get("activityType"),
        Some(&FieldValue::Text("No Activity".to_owned()))
    );
    assert_eq!(
        end.tags.get("ActivitySelector").map(String::as_str),
        Some("20240501T060000UTC-running")
    );
    assert_eq!(end.tags.get("ActivityID").map(String::as_str), Some("42"));

    // Activity 42 is queued for GPS extraction
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].id, 42);
    assert_eq!(refs[0].type_key, "running");
    assert!(refs[0].has_track);
}

#[test]
fn test_activity_without_start_time_is_skipped_not_fatal() {
    let payload = json!([
        {"activityId": 7, "hasPolyline": false},
        {
            "activityId": 8,
            "activityType": {"typeKey": "cycling"},
            "startTimeGMT": "2024-05-01 08:00:00",
            "elapsedDuration": 60.0
        }
    ]);
    let (points, refs) = transform::activity::transform(&payload, &ctx()).unwrap();
    // Only activity 8 produced its start/end pair
    assert_eq!(points.len(), 2);
    assert!(refs.is_empty());
}

#[test]
fn test_sleep_summary_anchored_on_epoch_millis() {
    let payload = json!({
        "dailySleepDTO": {
            "sleepEndTimestampGMT": 1714541400000u64,
            "sleepTimeSeconds": 27000,
            "deepSleepSeconds": 5400
        },
        "restingHeartRate": 48,
        "sleepLevels": [{
            "startGMT": "2024-05-01T00:30:00.0",
            "endGMT": "2024-05-01T01:00:00.0",
            "activityLevel": 1.0
        }]
    });
    let points = MetricFamily::Sleep
        .transform(&payload, &ctx(), date(2024, 5, 1))
        .unwrap();
    assert_eq!(points.len(), 2);

    let summary = &points[0];
    assert_eq!(summary.measurement, "SleepSummary");
    assert_eq!(
        summary.time,
        Utc.with_ymd_and_hms(2024, 5, 1, 5, 30, 0).unwrap()
    );
    assert_eq!(
        summary.fields.get("restingHeartRate"),
        Some(&FieldValue::Integer(48))
    );

    let stage = &points[1];
    assert_eq!(stage.measurement, "SleepIntraday");
    assert_eq!(
        stage.fields.get("SleepStageSeconds"),
        Some(&FieldValue::Integer(1800))
    );
}

#[test]
fn test_sleep_without_end_timestamp_emits_no_summary() {
    let payload = json!({
        "dailySleepDTO": {
            "sleepEndTimestampGMT": null,
            "sleepTimeSeconds": 27000
        }
    });
    let points = MetricFamily::Sleep
        .transform(&payload, &ctx(), date(2024, 5, 1))
        .unwrap();
    assert!(points.is_empty());
}

#[test]
fn test_intraday_stress_zero_is_kept_and_body_battery_extracted() {
    let payload = json!({
        "stressValuesArray": [
            [1714545000000u64, 0],
            [1714545180000u64, 27],
            [1714545360000u64, null]
        ],
        "bodyBatteryValuesArray": [
            [1714545000000u64, "MEASURED", 63, 1.0]
        ]
    });
    let points = MetricFamily::StressIntraday
        .transform(&payload, &ctx(), date(2024, 5, 1))
        .unwrap();
    assert_eq!(points.len(), 3);
    assert_eq!(
        points[0].fields.get("stressLevel"),
        Some(&FieldValue::Integer(0))
    );
    assert_eq!(points[2].measurement, "BodyBatteryIntraday");
    assert_eq!(
        points[2].fields.get("BodyBatteryLevel"),
        Some(&FieldValue::Integer(63))
    );
}

#[test]
fn test_intraday_steps_zero_bucket_is_a_reading() {
    let payload = json!([
        {"startGMT": "2024-05-01T06:00:00.0", "steps": 0},
        {"startGMT": "2024-05-01T06:15:00.0", "steps": 320},
        {"startGMT": "2024-05-01T06:30:00.0", "steps": null}
    ]);
    let points = MetricFamily::StepsIntraday
        .transform(&payload, &ctx(), date(2024, 5, 1))
        .unwrap();
    assert_eq!(points.len(), 2);
    assert_eq!(
        points[0].fields.get("StepsCount"),
        Some(&FieldValue::Integer(0))
    );
}

#[test]
fn test_heart_rate_pairs_use_epoch_millis() {
    let payload = json!({
        "heartRateValues": [
            [1714545000000u64, 62],
            [1714545120000u64, null]
        ]
    });
    let points = MetricFamily::HeartRateIntraday
        .transform(&payload, &ctx(), date(2024, 5, 1))
        .unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(
        points[0].time,
        Utc.with_ymd_and_hms(2024, 5, 1, 6, 30, 0).unwrap()
    );
}

#[test]
fn test_hrv_null_payload_is_empty() {
    let points = MetricFamily::HrvIntraday
        .transform(&serde_json::Value::Null, &ctx(), date(2024, 5, 1))
        .unwrap();
    assert!(points.is_empty());
}

#[test]
fn test_body_composition_noon_fallback_and_all_null_drop() {
    let payload = json!({
        "dailyWeightSummaries": [{
            "allWeightMetrics": [
                {"timestampGMT": null, "weight": 70500.0, "sourceType": "INDEX_SCALE"},
                {"timestampGMT": null, "weight": null, "bmi": null}
            ]
        }]
    });
    let points = MetricFamily::BodyComposition
        .transform(&payload, &ctx(), date(2024, 5, 1))
        .unwrap();
    assert_eq!(points.len(), 1);
    let point = &points[0];
    assert_eq!(
        point.time,
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    );
    assert_eq!(
        point.tags.get("SourceType").map(String::as_str),
        Some("INDEX_SCALE")
    );
    assert_eq!(
        point.tags.get("Frequency").map(String::as_str),
        Some("Intraday")
    );
}

#[test]
fn test_race_predictions_all_null_emits_nothing() {
    let payload = json!({
        "time5K": null,
        "time10K": null,
        "timeHalfMarathon": null,
        "timeMarathon": null
    });
    let points = MetricFamily::RacePredictions
        .transform(&payload, &ctx(), date(2024, 5, 1))
        .unwrap();
    assert!(points.is_empty());
}

#[test]
fn test_vo2_max_anchors_at_noon() {
    let payload = json!([{"generic": {"vo2MaxPreciseValue": 47.3}}]);
    let points = MetricFamily::Vo2Max
        .transform(&payload, &ctx(), date(2024, 5, 1))
        .unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(
        points[0].time,
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    );
    assert_eq!(
        points[0].fields.get("VO2_max_value"),
        Some(&FieldValue::Float(47.3))
    );
}

#[test]
fn test_vo2_max_unexpected_shape_is_empty_not_error() {
    let payload = json!({"generic": "unexpected"});
    let points = MetricFamily::Vo2Max
        .transform(&payload, &ctx(), date(2024, 5, 1))
        .unwrap();
    assert!(points.is_empty());
}

#[test]
fn test_device_sync_auto_detection_and_unknown_fallback() {
    let mut context = RunContext::new(None);
    let payload = json!({
        "lastUsedDeviceName": "Forerunner 955",
        "lastUsedDeviceUploadTime": 1714716000000u64,
        "imageUrl": "https://example.com/watch.png"
    });
    let (points, upload) = transform::device::transform(&payload, &mut context).unwrap();
    assert_eq!(context.device_name, "Forerunner 955");
    assert_eq!(points.len(), 1);
    assert_eq!(
        upload,
        Some(Utc.with_ymd_and_hms(2024, 5, 3, 6, 0, 0).unwrap())
    );

    let mut context = RunContext::new(None);
    let (points, upload) =
        transform::device::transform(&json!({}), &mut context).unwrap();
    assert_eq!(context.device_name, "Unknown");
    assert!(points.is_empty());
    assert_eq!(upload, None);
}

// ABOUTME: Sleep summary and intraday sleep sub-series transformer
// ABOUTME: Emits SleepSummary plus seven SleepIntraday series from one payload
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use super::base_point;
use crate::context::RunContext;
use crate::convert::{epoch_millis_to_utc, parse_gmt_fractional};
use crate::models::TimePoint;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SleepPayload {
    #[serde(rename = "dailySleepDTO")]
    daily_sleep_dto: Option<DailySleepDto>,
    restless_moments_count: Option<f64>,
    avg_overnight_hrv: Option<f64>,
    body_battery_change: Option<f64>,
    resting_heart_rate: Option<f64>,

    sleep_movement: Option<Vec<IntervalEntry>>,
    sleep_levels: Option<Vec<IntervalEntry>>,
    sleep_restless_moments: Option<Vec<EpochEntry>>,
    #[serde(rename = "wellnessEpochSPO2DataDTOList")]
    spo2_epochs: Option<Vec<Spo2Entry>>,
    #[serde(rename = "wellnessEpochRespirationDataDTOList")]
    respiration_epochs: Option<Vec<RespirationEntry>>,
    sleep_heart_rate: Option<Vec<EpochEntry>>,
    sleep_stress: Option<Vec<EpochEntry>>,
    sleep_body_battery: Option<Vec<EpochEntry>>,
    hrv_data: Option<Vec<EpochEntry>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DailySleepDto {
    #[serde(rename = "sleepEndTimestampGMT")]
    sleep_end_timestamp_gmt: Option<f64>,
    sleep_time_seconds: Option<f64>,
    deep_sleep_seconds: Option<f64>,
    light_sleep_seconds: Option<f64>,
    rem_sleep_seconds: Option<f64>,
    awake_sleep_seconds: Option<f64>,
    #[serde(rename = "averageSpO2Value")]
    average_spo2_value: Option<f64>,
    #[serde(rename = "lowestSpO2Value")]
    lowest_spo2_value: Option<f64>,
    #[serde(rename = "highestSpO2Value")]
    highest_spo2_value: Option<f64>,
    average_respiration_value: Option<f64>,
    lowest_respiration_value: Option<f64>,
    highest_respiration_value: Option<f64>,
    awake_count: Option<f64>,
    avg_sleep_stress: Option<f64>,
    sleep_scores: Option<SleepScores>,
}

#[derive(Debug, Deserialize)]
struct SleepScores {
    overall: Option<SleepScoreOverall>,
}

#[derive(Debug, Deserialize)]
struct SleepScoreOverall {
    value: Option<f64>,
}

/// Timestamped interval with naive GMT string bounds (movement, levels).
#[derive(Debug, Deserialize)]
struct IntervalEntry {
    #[serde(rename = "startGMT")]
    start_gmt: Option<String>,
    #[serde(rename = "endGMT")]
    end_gmt: Option<String>,
    #[serde(rename = "activityLevel")]
    activity_level: Option<f64>,
}

/// Timestamped reading with an epoch-millisecond anchor.
#[derive(Debug, Deserialize)]
struct EpochEntry {
    #[serde(rename = "startGMT")]
    start_gmt: Option<f64>,
    value: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Spo2Entry {
    epoch_timestamp: Option<String>,
    #[serde(rename = "spo2Reading")]
    spo2_reading: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RespirationEntry {
    #[serde(rename = "startTimeGMT")]
    start_time_gmt: Option<f64>,
    respiration_value: Option<f64>,
}

/// Sleep summary plus the seven intraday sub-series (movement, stage
/// levels, restless moments, SpO2, respiration, heart rate, stress, body
/// battery, HRV) from one wellness payload.
pub fn transform(payload: &Value, ctx: &RunContext) -> Result<Vec<TimePoint>> {
    let sleep: SleepPayload =
        serde_json::from_value(payload.clone()).context("decoding sleep payload")?;
    let mut points = Vec::new();

    if let Some(dto) = &sleep.daily_sleep_dto {
        if let Some(end) = dto
            .sleep_end_timestamp_gmt
            .and_then(|ms| epoch_millis_to_utc(ms as i64))
        {
            let mut point = base_point("SleepSummary", end, ctx);
            point.field_integer("sleepTimeSeconds", dto.sleep_time_seconds);
            point.field_integer("deepSleepSeconds", dto.deep_sleep_seconds);
            point.field_integer("lightSleepSeconds", dto.light_sleep_seconds);
            point.field_integer("remSleepSeconds", dto.rem_sleep_seconds);
            point.field_integer("awakeSleepSeconds", dto.awake_sleep_seconds);
            point.field_float("averageSpO2Value", dto.average_spo2_value);
            point.field_float("lowestSpO2Value", dto.lowest_spo2_value);
            point.field_float("highestSpO2Value", dto.highest_spo2_value);
            point.field_float("averageRespirationValue", dto.average_respiration_value);
            point.field_float("lowestRespirationValue", dto.lowest_respiration_value);
            point.field_float("highestRespirationValue", dto.highest_respiration_value);
            point.field_integer("awakeCount", dto.awake_count);
            point.field_float("avgSleepStress", dto.avg_sleep_stress);
            point.field_integer(
                "sleepScore",
                dto.sleep_scores
                    .as_ref()
                    .and_then(|scores| scores.overall.as_ref())
                    .and_then(|overall| overall.value),
            );
            point.field_integer("restlessMomentsCount", sleep.restless_moments_count);
            point.field_float("avgOvernightHrv", sleep.avg_overnight_hrv);
            point.field_integer("bodyBatteryChange", sleep.body_battery_change);
            point.field_integer("restingHeartRate", sleep.resting_heart_rate);
            if point.has_fields() {
                points.push(point);
            }
        }
    }

    for entry in sleep.sleep_movement.iter().flatten() {
        let Some((start, seconds)) = interval_bounds(entry) else {
            continue;
        };
        let mut point = base_point("SleepIntraday", start, ctx);
        // Missing movement level is encoded as -1 upstream
        point.field_float(
            "SleepMovementActivityLevel",
            Some(entry.activity_level.unwrap_or(-1.0)),
        );
        point.field_integer("SleepMovementActivitySeconds", Some(seconds));
        points.push(point);
    }

    for entry in sleep.sleep_levels.iter().flatten() {
        if entry.activity_level.is_none() {
            continue;
        }
        let Some((start, seconds)) = interval_bounds(entry) else {
            continue;
        };
        let mut point = base_point("SleepIntraday", start, ctx);
        point.field_float("SleepStageLevel", entry.activity_level);
        point.field_integer("SleepStageSeconds", Some(seconds));
        points.push(point);
    }

    push_epoch_series(
        &mut points,
        ctx,
        sleep.sleep_restless_moments.as_deref(),
        "sleepRestlessValue",
        FieldKind::Integer,
    );
    push_epoch_series(
        &mut points,
        ctx,
        sleep.sleep_heart_rate.as_deref(),
        "heartRate",
        FieldKind::Integer,
    );
    push_epoch_series(
        &mut points,
        ctx,
        sleep.sleep_stress.as_deref(),
        "stressValue",
        FieldKind::Integer,
    );
    push_epoch_series(
        &mut points,
        ctx,
        sleep.sleep_body_battery.as_deref(),
        "bodyBattery",
        FieldKind::Integer,
    );
    push_epoch_series(
        &mut points,
        ctx,
        sleep.hrv_data.as_deref(),
        "hrvData",
        FieldKind::Float,
    );

    for entry in sleep.spo2_epochs.iter().flatten() {
        let anchor = entry
            .epoch_timestamp
            .as_deref()
            .and_then(parse_gmt_fractional);
        let (Some(time), Some(reading)) = (anchor, entry.spo2_reading) else {
            continue;
        };
        let mut point = base_point("SleepIntraday", time, ctx);
        point.field_integer("spo2Reading", Some(reading));
        points.push(point);
    }

    for entry in sleep.respiration_epochs.iter().flatten() {
        let anchor = entry
            .start_time_gmt
            .and_then(|ms| epoch_millis_to_utc(ms as i64));
        let (Some(time), Some(value)) = (anchor, entry.respiration_value) else {
            continue;
        };
        let mut point = base_point("SleepIntraday", time, ctx);
        point.field_float("respirationValue", Some(value));
        points.push(point);
    }

    Ok(points)
}

enum FieldKind {
    Integer,
    Float,
}

fn push_epoch_series(
    points: &mut Vec<TimePoint>,
    ctx: &RunContext,
    entries: Option<&[EpochEntry]>,
    field: &str,
    kind: FieldKind,
) {
    for entry in entries.into_iter().flatten() {
        let anchor = entry.start_gmt.and_then(|ms| epoch_millis_to_utc(ms as i64));
        let (Some(time), Some(value)) = (anchor, entry.value) else {
            continue;
        };
        let mut point = base_point("SleepIntraday", time, ctx);
        match kind {
            FieldKind::Integer => point.field_integer(field, Some(value)),
            FieldKind::Float => point.field_float(field, Some(value)),
        }
        points.push(point);
    }
}

/// Interval start instant and whole-second duration.
fn interval_bounds(entry: &IntervalEntry) -> Option<(chrono::DateTime<chrono::Utc>, f64)> {
    let start = entry.start_gmt.as_deref().and_then(parse_gmt_fractional)?;
    let end = entry.end_gmt.as_deref().and_then(parse_gmt_fractional)?;
    Some((start, (end - start).num_seconds() as f64))
}

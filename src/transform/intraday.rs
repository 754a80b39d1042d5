// ABOUTME: Intraday series transformers for steps, heart rate, stress, body battery, respiration and HRV
// ABOUTME: Converts timestamp/value pair arrays into one point per reading
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
struct StepsEntry {
    #[serde(rename = "startGMT")]
    start_gmt: Option<String>,
    steps: Option<f64>,
}

/// `StepsIntraday` from the daily summary chart; fifteen-minute buckets
/// where a zero step count is a real (sedentary) reading.
pub fn transform_steps(payload: &Value, ctx: &RunContext) -> Result<Vec<TimePoint>> {
    let entries: Vec<StepsEntry> =
        serde_json::from_value(payload.clone()).context("decoding steps payload")?;
    let mut points = Vec::new();
    for entry in entries {
        let anchor = entry.start_gmt.as_deref().and_then(parse_gmt_fractional);
        let (Some(time), Some(steps)) = (anchor, entry.steps) else {
            continue;
        };
        let mut point = base_point("StepsIntraday", time, ctx);
        point.field_integer("StepsCount", Some(steps));
        points.push(point);
    }
    Ok(points)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeartRatePayload {
    heart_rate_values: Option<Vec<(f64, Option<f64>)>>,
}

/// `HeartRateIntraday` from `[epoch-ms, bpm]` pairs.
pub fn transform_heart_rate(payload: &Value, ctx: &RunContext) -> Result<Vec<TimePoint>> {
    let parsed: HeartRatePayload =
        serde_json::from_value(payload.clone()).context("decoding heart rate payload")?;
    Ok(pair_series(
        parsed.heart_rate_values.as_deref(),
        "HeartRateIntraday",
        "HeartRate",
        ctx,
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StressPayload {
    stress_values_array: Option<Vec<(f64, Option<f64>)>>,
    /// `[epoch-ms, status, level, ..]` rows; only indices 0 and 2 matter
    body_battery_values_array: Option<Vec<Vec<Value>>>,
}

/// `StressIntraday` and `BodyBatteryIntraday`, both carried by the daily
/// stress payload. Zero stress and zero body battery are valid readings.
pub fn transform_stress(payload: &Value, ctx: &RunContext) -> Result<Vec<TimePoint>> {
    let parsed: StressPayload =
        serde_json::from_value(payload.clone()).context("decoding stress payload")?;
    let mut points = pair_series(
        parsed.stress_values_array.as_deref(),
        "StressIntraday",
        "stressLevel",
        ctx,
    );

    for row in parsed.body_battery_values_array.iter().flatten() {
        let anchor = row
            .first()
            .and_then(Value::as_f64)
            .and_then(|ms| epoch_millis_to_utc(ms as i64));
        let level = row.get(2).and_then(Value::as_f64);
        let (Some(time), Some(level)) = (anchor, level) else {
            continue;
        };
        let mut point = base_point("BodyBatteryIntraday", time, ctx);
        point.field_integer("BodyBatteryLevel", Some(level));
        points.push(point);
    }
    Ok(points)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RespirationPayload {
    respiration_values_array: Option<Vec<(f64, Option<f64>)>>,
}

/// `BreathingRateIntraday` from `[epoch-ms, breaths-per-minute]` pairs.
pub fn transform_breathing_rate(payload: &Value, ctx: &RunContext) -> Result<Vec<TimePoint>> {
    let parsed: RespirationPayload =
        serde_json::from_value(payload.clone()).context("decoding respiration payload")?;
    let mut points = Vec::new();
    for (millis, value) in parsed.respiration_values_array.iter().flatten() {
        let anchor = epoch_millis_to_utc(*millis as i64);
        let (Some(time), Some(value)) = (anchor, value) else {
            continue;
        };
        let mut point = base_point("BreathingRateIntraday", time, ctx);
        point.field_float("BreathingRate", Some(*value));
        points.push(point);
    }
    Ok(points)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HrvPayload {
    hrv_readings: Option<Vec<HrvReading>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HrvReading {
    #[serde(rename = "readingTimeGMT")]
    reading_time_gmt: Option<String>,
    hrv_value: Option<f64>,
}

/// `HRV_Intraday` from individual overnight readings. The endpoint returns
/// `null` for dates without HRV data.
pub fn transform_hrv(payload: &Value, ctx: &RunContext) -> Result<Vec<TimePoint>> {
    if payload.is_null() {
        return Ok(vec![]);
    }
    let parsed: HrvPayload =
        serde_json::from_value(payload.clone()).context("decoding HRV payload")?;
    let mut points = Vec::new();
    for reading in parsed.hrv_readings.iter().flatten() {
        let anchor = reading
            .reading_time_gmt
            .as_deref()
            .and_then(parse_gmt_fractional);
        let (Some(time), Some(value)) = (anchor, reading.hrv_value) else {
            continue;
        };
        let mut point = base_point("HRV_Intraday", time, ctx);
        point.field_float("hrvValue", Some(value));
        points.push(point);
    }
    Ok(points)
}

/// Shared `[epoch-ms, value]` pair expansion with an integer field.
fn pair_series(
    pairs: Option<&[(f64, Option<f64>)]>,
    measurement: &str,
    field: &str,
    ctx: &RunContext,
) -> Vec<TimePoint> {
    let mut points = Vec::new();
    for (millis, value) in pairs.into_iter().flatten() {
        let anchor = epoch_millis_to_utc(*millis as i64);
        let (Some(time), Some(value)) = (anchor, value) else {
            continue;
        };
        let mut point = base_point(measurement, time, ctx);
        point.field_integer(field, Some(*value));
        points.push(point);
    }
    points
}

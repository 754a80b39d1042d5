// ABOUTME: Daily wellness summary transformer
// ABOUTME: Emits one DailyStats point per completed calendar day
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use super::base_point;
use crate::context::RunContext;
use crate::convert::parse_gmt_fractional;
use crate::models::TimePoint;
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DailyStatsPayload {
    wellness_start_time_gmt: Option<String>,

    active_kilocalories: Option<f64>,
    bmr_kilocalories: Option<f64>,

    total_steps: Option<f64>,
    total_distance_meters: Option<f64>,

    highly_active_seconds: Option<f64>,
    active_seconds: Option<f64>,
    sedentary_seconds: Option<f64>,
    sleeping_seconds: Option<f64>,
    moderate_intensity_minutes: Option<f64>,
    vigorous_intensity_minutes: Option<f64>,

    floors_ascended_in_meters: Option<f64>,
    floors_descended_in_meters: Option<f64>,
    floors_ascended: Option<f64>,
    floors_descended: Option<f64>,

    min_heart_rate: Option<f64>,
    max_heart_rate: Option<f64>,
    resting_heart_rate: Option<f64>,
    min_avg_heart_rate: Option<f64>,
    max_avg_heart_rate: Option<f64>,

    stress_duration: Option<f64>,
    rest_stress_duration: Option<f64>,
    activity_stress_duration: Option<f64>,
    uncategorized_stress_duration: Option<f64>,
    total_stress_duration: Option<f64>,
    low_stress_duration: Option<f64>,
    medium_stress_duration: Option<f64>,
    high_stress_duration: Option<f64>,

    stress_percentage: Option<f64>,
    rest_stress_percentage: Option<f64>,
    activity_stress_percentage: Option<f64>,
    uncategorized_stress_percentage: Option<f64>,
    low_stress_percentage: Option<f64>,
    medium_stress_percentage: Option<f64>,
    high_stress_percentage: Option<f64>,

    body_battery_charged_value: Option<f64>,
    body_battery_drained_value: Option<f64>,
    body_battery_highest_value: Option<f64>,
    body_battery_lowest_value: Option<f64>,
    body_battery_during_sleep: Option<f64>,
    body_battery_at_wake_time: Option<f64>,

    average_spo2: Option<f64>,
    lowest_spo2: Option<f64>,
}

/// One `DailyStats` summary point, anchored on the wellness start instant.
///
/// Today's partial summary is never written: the point is emitted only for
/// dates strictly before the current day, once the anchor is present.
pub fn transform(payload: &Value, ctx: &RunContext, date: NaiveDate) -> Result<Vec<TimePoint>> {
    let stats: DailyStatsPayload =
        serde_json::from_value(payload.clone()).context("decoding daily stats payload")?;

    let anchor = stats
        .wellness_start_time_gmt
        .as_deref()
        .and_then(parse_gmt_fractional);
    let Some(anchor) = anchor else {
        debug!("No daily stat data available for date {date}");
        return Ok(vec![]);
    };
    if date >= Utc::now().date_naive() {
        debug!("Skipping incomplete daily stats for current date {date}");
        return Ok(vec![]);
    }

    let mut point = base_point("DailyStats", anchor, ctx);

    point.field_float("activeKilocalories", stats.active_kilocalories);
    point.field_float("bmrKilocalories", stats.bmr_kilocalories);

    point.field_integer("totalSteps", stats.total_steps);
    point.field_float("totalDistanceMeters", stats.total_distance_meters);

    point.field_integer("highlyActiveSeconds", stats.highly_active_seconds);
    point.field_integer("activeSeconds", stats.active_seconds);
    point.field_integer("sedentarySeconds", stats.sedentary_seconds);
    point.field_integer("sleepingSeconds", stats.sleeping_seconds);
    point.field_integer("moderateIntensityMinutes", stats.moderate_intensity_minutes);
    point.field_integer("vigorousIntensityMinutes", stats.vigorous_intensity_minutes);

    point.field_float("floorsAscendedInMeters", stats.floors_ascended_in_meters);
    point.field_float("floorsDescendedInMeters", stats.floors_descended_in_meters);
    point.field_float("floorsAscended", stats.floors_ascended);
    point.field_float("floorsDescended", stats.floors_descended);

    point.field_integer("minHeartRate", stats.min_heart_rate);
    point.field_integer("maxHeartRate", stats.max_heart_rate);
    point.field_integer("restingHeartRate", stats.resting_heart_rate);
    point.field_integer("minAvgHeartRate", stats.min_avg_heart_rate);
    point.field_integer("maxAvgHeartRate", stats.max_avg_heart_rate);

    point.field_integer("stressDuration", stats.stress_duration);
    point.field_integer("restStressDuration", stats.rest_stress_duration);
    point.field_integer("activityStressDuration", stats.activity_stress_duration);
    point.field_integer(
        "uncategorizedStressDuration",
        stats.uncategorized_stress_duration,
    );
    point.field_integer("totalStressDuration", stats.total_stress_duration);
    point.field_integer("lowStressDuration", stats.low_stress_duration);
    point.field_integer("mediumStressDuration", stats.medium_stress_duration);
    point.field_integer("highStressDuration", stats.high_stress_duration);

    point.field_float("stressPercentage", stats.stress_percentage);
    point.field_float("restStressPercentage", stats.rest_stress_percentage);
    point.field_float("activityStressPercentage", stats.activity_stress_percentage);
    point.field_float(
        "uncategorizedStressPercentage",
        stats.uncategorized_stress_percentage,
    );
    point.field_float("lowStressPercentage", stats.low_stress_percentage);
    point.field_float("mediumStressPercentage", stats.medium_stress_percentage);
    point.field_float("highStressPercentage", stats.high_stress_percentage);

    point.field_integer("bodyBatteryChargedValue", stats.body_battery_charged_value);
    point.field_integer("bodyBatteryDrainedValue", stats.body_battery_drained_value);
    point.field_integer("bodyBatteryHighestValue", stats.body_battery_highest_value);
    point.field_integer("bodyBatteryLowestValue", stats.body_battery_lowest_value);
    point.field_integer("bodyBatteryDuringSleep", stats.body_battery_during_sleep);
    point.field_integer("bodyBatteryAtWakeTime", stats.body_battery_at_wake_time);

    point.field_float("averageSpo2", stats.average_spo2);
    point.field_float("lowestSpo2", stats.lowest_spo2);

    if point.has_fields() {
        Ok(vec![point])
    } else {
        Ok(vec![])
    }
}

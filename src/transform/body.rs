// ABOUTME: Body composition transformer for weigh-in payloads
// ABOUTME: Emits one BodyComposition point per weight metric entry
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use super::base_point;
use crate::context::RunContext;
use crate::convert::{date_noon_utc, epoch_millis_to_utc};
use crate::models::TimePoint;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WeighInsPayload {
    #[serde(default)]
    daily_weight_summaries: Vec<DailyWeightSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DailyWeightSummary {
    #[serde(default)]
    all_weight_metrics: Vec<WeightMetric>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WeightMetric {
    #[serde(rename = "timestampGMT")]
    timestamp_gmt: Option<f64>,
    weight: Option<f64>,
    bmi: Option<f64>,
    body_fat: Option<f64>,
    body_water: Option<f64>,
    source_type: Option<String>,
}

/// `BodyComposition` points for a date's weigh-ins. A metric with no
/// timestamp anchors at noon UTC of the requested date; a metric whose
/// values are all null is dropped.
pub fn transform(payload: &Value, ctx: &RunContext, date: NaiveDate) -> Result<Vec<TimePoint>> {
    let weigh_ins: WeighInsPayload =
        serde_json::from_value(payload.clone()).context("decoding weigh-ins payload")?;
    let mut points = Vec::new();

    let Some(summary) = weigh_ins.daily_weight_summaries.first() else {
        return Ok(points);
    };
    for metric in &summary.all_weight_metrics {
        let time = metric
            .timestamp_gmt
            .and_then(|ms| epoch_millis_to_utc(ms as i64))
            .unwrap_or_else(|| date_noon_utc(date));
        let mut point = base_point("BodyComposition", time, ctx)
            .tag("Frequency", "Intraday")
            .tag("SourceType", metric.source_type.as_deref().unwrap_or("Unknown"));
        point.field_float("weight", metric.weight);
        point.field_float("bmi", metric.bmi);
        point.field_float("bodyFat", metric.body_fat);
        point.field_float("bodyWater", metric.body_water);
        if point.has_fields() {
            points.push(point);
        }
    }
    Ok(points)
}

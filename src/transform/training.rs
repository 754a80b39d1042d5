// ABOUTME: Advanced training metric transformers
// ABOUTME: Training readiness, hill score, race predictions and VO2 max
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use super::base_point;
use crate::context::RunContext;
use crate::convert::{date_noon_utc, parse_gmt_fractional};
use crate::models::TimePoint;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrainingReadinessEntry {
    timestamp: Option<String>,
    level: Option<String>,
    score: Option<f64>,
    sleep_score: Option<f64>,
    sleep_score_factor_percent: Option<f64>,
    recovery_time: Option<f64>,
    recovery_time_factor_percent: Option<f64>,
    acwr_factor_percent: Option<f64>,
    acute_load: Option<f64>,
    stress_history_factor_percent: Option<f64>,
    hrv_factor_percent: Option<f64>,
}

/// `TrainingReadiness` points, one per readiness record with a timestamp
/// and at least one non-null component.
pub fn transform_readiness(payload: &Value, ctx: &RunContext) -> Result<Vec<TimePoint>> {
    if payload.is_null() {
        return Ok(vec![]);
    }
    let entries: Vec<TrainingReadinessEntry> =
        serde_json::from_value(payload.clone()).context("decoding training readiness payload")?;
    let mut points = Vec::new();
    for entry in &entries {
        let Some(anchor) = entry.timestamp.as_deref().and_then(parse_gmt_fractional) else {
            continue;
        };
        let mut point = base_point("TrainingReadiness", anchor, ctx);
        point.field_text("level", entry.level.as_deref());
        point.field_integer("score", entry.score);
        point.field_integer("sleepScore", entry.sleep_score);
        point.field_float("sleepScoreFactorPercent", entry.sleep_score_factor_percent);
        point.field_integer("recoveryTime", entry.recovery_time);
        point.field_float(
            "recoveryTimeFactorPercent",
            entry.recovery_time_factor_percent,
        );
        point.field_float("acwrFactorPercent", entry.acwr_factor_percent);
        point.field_float("acuteLoad", entry.acute_load);
        point.field_float(
            "stressHistoryFactorPercent",
            entry.stress_history_factor_percent,
        );
        point.field_float("hrvFactorPercent", entry.hrv_factor_percent);
        if point.has_fields() {
            points.push(point);
        }
    }
    Ok(points)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HillScorePayload {
    #[serde(rename = "hillScoreDTOList", default)]
    hill_score_dto_list: Vec<HillScoreEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HillScoreEntry {
    strength_score: Option<f64>,
    endurance_score: Option<f64>,
    hill_score_classification_id: Option<f64>,
    overall_score: Option<f64>,
    hill_score_feedback_phrase_id: Option<f64>,
}

/// `HillScore` daily records, anchored at noon UTC of the requested date.
pub fn transform_hill_score(
    payload: &Value,
    ctx: &RunContext,
    date: NaiveDate,
) -> Result<Vec<TimePoint>> {
    if payload.is_null() {
        return Ok(vec![]);
    }
    let parsed: HillScorePayload =
        serde_json::from_value(payload.clone()).context("decoding hill score payload")?;
    let mut points = Vec::new();
    for entry in &parsed.hill_score_dto_list {
        let mut point = base_point("HillScore", date_noon_utc(date), ctx);
        point.field_integer("strengthScore", entry.strength_score);
        point.field_integer("enduranceScore", entry.endurance_score);
        point.field_integer(
            "hillScoreClassificationId",
            entry.hill_score_classification_id,
        );
        point.field_integer("overallScore", entry.overall_score);
        point.field_integer(
            "hillScoreFeedbackPhraseId",
            entry.hill_score_feedback_phrase_id,
        );
        if point.has_fields() {
            points.push(point);
        }
    }
    Ok(points)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RacePredictionsPayload {
    #[serde(rename = "time5K")]
    time_5k: Option<f64>,
    #[serde(rename = "time10K")]
    time_10k: Option<f64>,
    time_half_marathon: Option<f64>,
    time_marathon: Option<f64>,
}

/// `RacePredictions` snapshot, anchored at noon UTC of the requested date.
pub fn transform_race_predictions(
    payload: &Value,
    ctx: &RunContext,
    date: NaiveDate,
) -> Result<Vec<TimePoint>> {
    if payload.is_null() {
        return Ok(vec![]);
    }
    let parsed: RacePredictionsPayload =
        serde_json::from_value(payload.clone()).context("decoding race predictions payload")?;
    let mut point = base_point("RacePredictions", date_noon_utc(date), ctx);
    point.field_integer("time5K", parsed.time_5k);
    point.field_integer("time10K", parsed.time_10k);
    point.field_integer("timeHalfMarathon", parsed.time_half_marathon);
    point.field_integer("timeMarathon", parsed.time_marathon);
    if point.has_fields() {
        Ok(vec![point])
    } else {
        Ok(vec![])
    }
}

#[derive(Debug, Deserialize)]
struct MaxMetricsEntry {
    generic: Option<MaxMetricsGeneric>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MaxMetricsGeneric {
    vo2_max_precise_value: Option<f64>,
}

/// `VO2_Max` daily value, anchored at noon UTC of the requested date.
/// Unexpected payload shapes yield no points rather than an error.
pub fn transform_vo2_max(
    payload: &Value,
    ctx: &RunContext,
    date: NaiveDate,
) -> Result<Vec<TimePoint>> {
    let entries: Vec<MaxMetricsEntry> = match serde_json::from_value(payload.clone()) {
        Ok(entries) => entries,
        Err(_) => return Ok(vec![]),
    };
    let vo2_max = entries
        .first()
        .and_then(|entry| entry.generic.as_ref())
        .and_then(|generic| generic.vo2_max_precise_value);
    let Some(vo2_max) = vo2_max else {
        return Ok(vec![]);
    };
    let mut point = base_point("VO2_Max", date_noon_utc(date), ctx);
    point.field_float("VO2_max_value", Some(vo2_max));
    Ok(vec![point])
}

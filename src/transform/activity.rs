// ABOUTME: Activity summary transformer emitting paired start and end points
// ABOUTME: Also collects the activity references handed to the GPS track extractor
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use super::base_point;
use crate::context::RunContext;
use crate::convert::{activity_selector, parse_gmt_spaced};
use crate::models::{ActivityRef, TimePoint};
use anyhow::{Context, Result};
use chrono::Duration;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivitySummaryPayload {
    activity_id: Option<u64>,
    device_id: Option<f64>,
    activity_name: Option<String>,
    activity_type: Option<ActivityType>,
    #[serde(rename = "startTimeGMT")]
    start_time_gmt: Option<String>,
    distance: Option<f64>,
    elapsed_duration: Option<f64>,
    moving_duration: Option<f64>,
    average_speed: Option<f64>,
    max_speed: Option<f64>,
    calories: Option<f64>,
    bmr_calories: Option<f64>,
    #[serde(rename = "averageHR")]
    average_hr: Option<f64>,
    #[serde(rename = "maxHR")]
    max_hr: Option<f64>,
    location_name: Option<String>,
    lap_count: Option<f64>,
    #[serde(rename = "hrTimeInZone_1")]
    hr_time_in_zone_1: Option<f64>,
    #[serde(rename = "hrTimeInZone_2")]
    hr_time_in_zone_2: Option<f64>,
    #[serde(rename = "hrTimeInZone_3")]
    hr_time_in_zone_3: Option<f64>,
    #[serde(rename = "hrTimeInZone_4")]
    hr_time_in_zone_4: Option<f64>,
    #[serde(rename = "hrTimeInZone_5")]
    hr_time_in_zone_5: Option<f64>,
    has_polyline: Option<bool>,
}

impl ActivitySummaryPayload {
    fn type_key(&self) -> &str {
        self.activity_type
            .as_ref()
            .and_then(|t| t.type_key.as_deref())
            .unwrap_or("Unknown")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityType {
    type_key: Option<String>,
}

/// Transform one day's activity list.
///
/// Every activity with a start time yields two `ActivitySummary` points: the
/// full field set at the start instant, and a sentinel end marker at
/// `start + elapsedDuration` so queries can tell "during activity" from
/// "after activity" without a duration lookup. Activities with a polyline
/// are additionally returned as [`ActivityRef`]s for GPS extraction.
pub fn transform(payload: &Value, ctx: &RunContext) -> Result<(Vec<TimePoint>, Vec<ActivityRef>)> {
    let activities: Vec<ActivitySummaryPayload> =
        serde_json::from_value(payload.clone()).context("decoding activity list payload")?;
    let mut points = Vec::new();
    let mut refs = Vec::new();

    for activity in &activities {
        if activity.has_polyline == Some(true) {
            if let Some(id) = activity.activity_id {
                refs.push(ActivityRef {
                    id,
                    type_key: activity.type_key().to_owned(),
                    has_track: true,
                });
            }
        }

        let start = activity
            .start_time_gmt
            .as_deref()
            .and_then(parse_gmt_spaced);
        let Some(start) = start else {
            warn!(
                "Skipped: start timestamp missing for activity id {:?}",
                activity.activity_id
            );
            continue;
        };

        let type_key = activity.type_key();
        let id_field = activity.activity_id.map(|id| id as f64);

        let mut start_point = base_point("ActivitySummary", start, ctx);
        start_point.field_integer("activityId", id_field);
        start_point.field_integer("deviceId", activity.device_id);
        start_point.field_text("activityName", activity.activity_name.as_deref());
        start_point.field_text(
            "activityType",
            activity
                .activity_type
                .as_ref()
                .and_then(|t| t.type_key.as_deref()),
        );
        start_point.field_float("distance", activity.distance);
        start_point.field_float("elapsedDuration", activity.elapsed_duration);
        start_point.field_float("movingDuration", activity.moving_duration);
        start_point.field_float("averageSpeed", activity.average_speed);
        start_point.field_float("maxSpeed", activity.max_speed);
        start_point.field_float("calories", activity.calories);
        start_point.field_float("bmrCalories", activity.bmr_calories);
        start_point.field_float("averageHR", activity.average_hr);
        start_point.field_float("maxHR", activity.max_hr);
        start_point.field_text("locationName", activity.location_name.as_deref());
        start_point.field_integer("lapCount", activity.lap_count);
        start_point.field_float("hrTimeInZone_1", activity.hr_time_in_zone_1);
        start_point.field_float("hrTimeInZone_2", activity.hr_time_in_zone_2);
        start_point.field_float("hrTimeInZone_3", activity.hr_time_in_zone_3);
        start_point.field_float("hrTimeInZone_4", activity.hr_time_in_zone_4);
        start_point.field_float("hrTimeInZone_5", activity.hr_time_in_zone_5);
        points.push(start_point);

        let elapsed = activity.elapsed_duration.unwrap_or(0.0) as i64;
        let end = start + Duration::seconds(elapsed);
        let mut end_point = base_point("ActivitySummary", end, ctx)
            .tag(
                "ActivityID",
                &activity
                    .activity_id
                    .map_or_else(String::new, |id| id.to_string()),
            )
            .tag("ActivitySelector", &activity_selector(start, type_key));
        end_point.field_integer("activityId", id_field);
        end_point.field_integer("deviceId", activity.device_id);
        end_point.field_text("activityName", Some("END"));
        end_point.field_text("activityType", Some("No Activity"));
        points.push(end_point);

        info!(
            "Success: fetched activity summary with id {:?}",
            activity.activity_id
        );
    }

    Ok((points, refs))
}

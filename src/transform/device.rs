// ABOUTME: Device sync transformer and device-name auto-detection
// ABOUTME: Emits the DeviceSync point and surfaces the device's last upload instant
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use super::base_point;
use crate::context::RunContext;
use crate::convert::epoch_millis_to_utc;
use crate::models::TimePoint;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceLastUsedPayload {
    last_used_device_name: Option<String>,
    last_used_device_upload_time: Option<f64>,
    image_url: Option<String>,
}

/// Transform the device-sync payload.
///
/// Resolves the device name (auto-detection only overwrites the context
/// when no name was configured) and returns the `DeviceSync` point together
/// with the device's last upload instant, which the daemon compares against
/// the watermark.
pub fn transform(
    payload: &Value,
    ctx: &mut RunContext,
) -> Result<(Vec<TimePoint>, Option<DateTime<Utc>>)> {
    let sync: DeviceLastUsedPayload =
        serde_json::from_value(payload.clone()).context("decoding device sync payload")?;

    if ctx.device_name_automatic {
        match &sync.last_used_device_name {
            Some(name) if !name.is_empty() => {
                ctx.device_name = name.clone();
            }
            _ => {
                warn!("No associated/synced Garmin device found with your account");
                ctx.device_name = "Unknown".to_owned();
            }
        }
    }

    let upload_time = sync
        .last_used_device_upload_time
        .and_then(|ms| epoch_millis_to_utc(ms as i64));
    let Some(upload_time) = upload_time else {
        return Ok((vec![], None));
    };

    let mut point = base_point("DeviceSync", upload_time, ctx);
    point.field_text("imageUrl", sync.image_url.as_deref());
    point.field_text("Device", Some(&ctx.device_name));
    info!("Success: updated device last sync time");
    Ok((vec![point], Some(upload_time)))
}

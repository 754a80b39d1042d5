// ABOUTME: GPS track extractor turning activity references into ordered track points
// ABOUTME: FIT export first, TCX fallback, dedup guard and optional FIT persistence
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # GPS Track Extractor
//!
//! Given the activity references collected while transforming a day's
//! summaries, reconstructs each activity's location/sensor trace. The dedup
//! guard is checked first and is authoritative for the process lifetime: a
//! previously seen activity never triggers a network request again.

pub mod fit;
pub mod tcx;

use crate::config::Config;
use crate::context::RunContext;
use crate::convert::activity_selector;
use crate::errors::ProviderError;
use crate::models::{ActivityRef, ExportFormat, TimePoint, TrackSample};
use crate::providers::garmin::GarminApi;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Extracts per-activity GPS traces for one run.
pub struct TrackExtractor<'a> {
    api: &'a dyn GarminApi,
    keep_fit_files: bool,
    fit_storage: PathBuf,
}

impl<'a> TrackExtractor<'a> {
    #[must_use]
    pub fn new(api: &'a dyn GarminApi, config: &Config) -> Self {
        Self {
            api,
            keep_fit_files: config.keep_fit_files,
            fit_storage: config.fit_file_storage.clone(),
        }
    }

    /// Extract tracks for every unseen activity reference.
    ///
    /// # Errors
    ///
    /// Propagates classified provider errors from the primary download so
    /// the retry controller handles them at the date level; parse failures
    /// and fallback timeouts only empty out the affected activity.
    pub async fn extract(
        &self,
        refs: &[ActivityRef],
        ctx: &mut RunContext,
    ) -> Result<Vec<TimePoint>, ProviderError> {
        let mut points = Vec::new();
        for aref in refs.iter().filter(|aref| aref.has_track) {
            if ctx.is_activity_parsed(aref.id) {
                info!(
                    "Skipping: activity ID {} has already been processed within current runtime",
                    aref.id
                );
                continue;
            }
            let extracted = self.extract_one(aref, ctx).await?;
            // Recorded after the attempt, success or not, so one run never
            // reprocesses the same activity
            ctx.mark_activity_parsed(aref.id);
            if !extracted.is_empty() {
                info!("Success: fetched GPS details for activity id {}", aref.id);
            }
            points.extend(extracted);
        }
        Ok(points)
    }

    async fn extract_one(
        &self,
        aref: &ActivityRef,
        ctx: &RunContext,
    ) -> Result<Vec<TimePoint>, ProviderError> {
        info!(
            "Processing: activity ID {} GPS data from FIT export - this may take a while",
            aref.id
        );
        let archive = self
            .api
            .download_activity(aref.id, ExportFormat::OriginalFit)
            .await?;

        match fit::parse_archive(&archive) {
            Ok(parsed) => {
                if self.keep_fit_files {
                    self.persist_fit(&parsed, aref).await;
                }
                Ok(to_points(&parsed.samples, parsed.start_time, aref, ctx))
            }
            Err(err) => {
                error!("{err}");
                warn!(
                    "Fallback: failed to use FIT export for activity ID {} - trying TCX export",
                    aref.id
                );
                self.extract_tcx(aref, ctx).await
            }
        }
    }

    async fn extract_tcx(
        &self,
        aref: &ActivityRef,
        ctx: &RunContext,
    ) -> Result<Vec<TimePoint>, ProviderError> {
        let xml_bytes = match self.api.download_activity(aref.id, ExportFormat::Tcx).await {
            Ok(bytes) => bytes,
            Err(ProviderError::Transient(msg)) => {
                warn!(
                    "Request failed fetching large activity record {} ({msg}) - skipping record",
                    aref.id
                );
                return Ok(vec![]);
            }
            Err(other) => return Err(other),
        };

        let xml = String::from_utf8_lossy(&xml_bytes);
        match tcx::parse(&xml) {
            Ok(activities) => Ok(activities
                .iter()
                .flat_map(|activity| {
                    let mut samples = activity.samples.clone();
                    samples.sort_by_key(|sample| sample.timestamp);
                    to_points(&samples, activity.start_time, aref, ctx)
                })
                .collect()),
            Err(err) => {
                error!("TCX fallback failed for activity ID {}: {err}", aref.id);
                Ok(vec![])
            }
        }
    }

    async fn persist_fit(&self, parsed: &fit::ParsedFit, aref: &ActivityRef) {
        let filename = format!(
            "{}.fit",
            activity_selector(parsed.start_time, &aref.type_key)
        );
        let path = self.fit_storage.join(filename);
        if let Err(err) = tokio::fs::create_dir_all(&self.fit_storage).await {
            warn!("Cannot create FIT storage directory: {err}");
            return;
        }
        match tokio::fs::write(&path, &parsed.fit_data).await {
            Ok(()) => info!(
                "Success: activity ID {} stored in output file {}",
                aref.id,
                path.display()
            ),
            Err(err) => warn!("Cannot store FIT file {}: {err}", path.display()),
        }
    }
}

/// Convert ordered samples into `ActivityGPS` points carrying the composite
/// activity-instance key.
fn to_points(
    samples: &[TrackSample],
    start_time: DateTime<Utc>,
    aref: &ActivityRef,
    ctx: &RunContext,
) -> Vec<TimePoint> {
    let selector = activity_selector(start_time, &aref.type_key);
    let mut points = Vec::with_capacity(samples.len());
    for sample in samples {
        let Some(time) = sample.timestamp else {
            continue;
        };
        let mut point = TimePoint::new("ActivityGPS", time)
            .tag("Device", &ctx.device_name)
            .tag("ActivityID", &aref.id.to_string())
            .tag("ActivitySelector", &selector);
        point.field_text("ActivityName", Some(&aref.type_key));
        point.field_integer("ActivityID", Some(aref.id as f64));
        point.field_float("Latitude", sample.latitude);
        point.field_float("Longitude", sample.longitude);
        point.field_float("Altitude", sample.altitude);
        point.field_float("Distance", sample.distance);
        point.field_float("HeartRate", sample.heart_rate);
        point.field_float("Speed", sample.speed);
        point.field_integer("Cadence", sample.cadence);
        point.field_float("Fractional_Cadence", sample.fractional_cadence);
        point.field_integer("Temperature", sample.temperature);
        point.field_integer("Accumulated_Power", sample.accumulated_power);
        point.field_integer("Power", sample.power);
        if let Some(lap) = sample.lap {
            point.field_integer("lap", Some(lap as f64));
        }
        points.push(point);
    }
    points
}

// ABOUTME: Sync orchestrator composing the window resolver, retry controller, transformers and extractor
// ABOUTME: Runs one bulk window or an unbounded daemon poll loop against the watermark
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Sync Orchestrator
//!
//! Owns the watermark and the run context for the process lifetime. Each
//! resolved date is fetched under retry-controller supervision; every batch
//! of canonical points is handed straight to the sink, where a write
//! failure is logged and the batch dropped without blocking progress.

use crate::config::Config;
use crate::context::RunContext;
use crate::errors::ProviderError;
use crate::models::TimePoint;
use crate::providers::garmin::GarminApi;
use crate::retry::{RetryController, SyncUnit};
use crate::sink::TimeSeriesSink;
use crate::track::TrackExtractor;
use crate::transform::{self, MetricFamily};
use crate::window;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Settle delay before the first fetch of a bulk pass; skipped entirely
/// when throttling is disabled (zero rate-limit interval).
const BULK_SETTLE_DELAY: Duration = Duration::from_secs(3);

pub struct SyncEngine {
    api: Arc<dyn GarminApi>,
    sink: Arc<dyn TimeSeriesSink>,
    config: Config,
    ctx: RunContext,
    watermark: DateTime<Utc>,
}

impl SyncEngine {
    #[must_use]
    pub fn new(api: Arc<dyn GarminApi>, sink: Arc<dyn TimeSeriesSink>, config: Config) -> Self {
        let ctx = RunContext::new(config.device_name.clone());
        Self {
            api,
            sink,
            config,
            ctx,
            watermark: Utc::now() - chrono::Duration::days(7),
        }
    }

    /// The instant up to which data is known to be fully synchronized.
    #[must_use]
    pub fn watermark(&self) -> DateTime<Utc> {
        self.watermark
    }

    /// Run one bulk window, then return. The watermark advances to the end
    /// of the range only when every date completed or was skipped without a
    /// fatal error.
    ///
    /// # Errors
    ///
    /// Unclassified provider errors and failed re-authentication.
    pub async fn run_bulk(&mut self, start: NaiveDate, end: NaiveDate) -> Result<()> {
        info!("Fetching data for the given period in reverse chronological order");
        if !self.config.rate_limit_interval.is_zero() {
            tokio::time::sleep(BULK_SETTLE_DELAY).await;
        }

        self.sync_device_info().await?;

        let retry = RetryController::new(
            self.config.fetch_failed_backoff,
            self.config.rate_limit_interval,
        );
        for date in window::sync_window(start, end) {
            retry.drive(self, date).await?;
        }

        let end_instant = end.and_time(chrono::NaiveTime::MIN).and_utc();
        if end_instant > self.watermark {
            self.watermark = end_instant;
        }
        Ok(())
    }

    /// Unbounded poll loop: seed the watermark from the sink, detect the
    /// local offset once, then fetch whenever the device has uploaded past
    /// the watermark.
    ///
    /// # Errors
    ///
    /// Same fatal conditions as [`Self::run_bulk`].
    pub async fn run_daemon(&mut self) -> Result<()> {
        self.watermark = window::seed_watermark(self.sink.as_ref()).await;
        self.ctx.local_offset = window::detect_local_offset(self.api.as_ref()).await;

        loop {
            if let Some(upload_time) = self.device_upload_time().await? {
                if self.watermark < upload_time {
                    info!("Update found: current watch sync time is {upload_time} UTC");
                    // Local dates decide which calendar days to fetch
                    let start = (self.watermark + self.ctx.local_offset).date_naive();
                    let end = (upload_time + self.ctx.local_offset).date_naive();
                    self.run_bulk(start, end).await?;
                    self.watermark = upload_time;
                } else {
                    info!(
                        "No new data found: current watch and database sync time is {upload_time} UTC"
                    );
                }
            }
            info!(
                "Waiting for {}s before next automatic update",
                self.config.update_interval.as_secs()
            );
            tokio::time::sleep(self.config.update_interval).await;
        }
    }

    /// Fetch the device-sync endpoint, refresh the auto-detected device
    /// name and write the `DeviceSync` point.
    async fn sync_device_info(&mut self) -> Result<(), ProviderError> {
        let payload = self.api.device_last_used().await?;
        match transform::device::transform(&payload, &mut self.ctx) {
            Ok((points, _upload_time)) => {
                self.write_batch(points).await;
            }
            Err(err) => warn!("Skipping device sync record: {err}"),
        }
        Ok(())
    }

    /// Device upload instant for the daemon's watermark comparison.
    async fn device_upload_time(&mut self) -> Result<Option<DateTime<Utc>>, ProviderError> {
        let payload = self.api.device_last_used().await?;
        match transform::device::transform(&payload, &mut self.ctx) {
            Ok((_points, upload_time)) => Ok(upload_time),
            Err(err) => {
                warn!("Cannot read device sync time: {err}");
                Ok(None)
            }
        }
    }

    /// Hand a batch to the sink; failures are logged and the batch dropped.
    async fn write_batch(&self, points: Vec<TimePoint>) {
        if points.is_empty() {
            return;
        }
        match self.sink.write(&points).await {
            Ok(()) => info!("Successfully updated database with {} new points", points.len()),
            Err(err) => error!("Unable to write to database, dropping batch: {err}"),
        }
    }

    /// Fetch and transform one metric family, isolating transform failures
    /// to the family while propagating classified fetch errors to the
    /// retry controller.
    async fn sync_family(
        &mut self,
        family: MetricFamily,
        date: NaiveDate,
    ) -> Result<(), ProviderError> {
        let payload = family.fetch(self.api.as_ref(), date).await?;
        match family.transform(&payload, &self.ctx, date) {
            Ok(points) => {
                if !points.is_empty() {
                    info!("Success: fetched {} for date {date}", family.name());
                }
                self.write_batch(points).await;
            }
            Err(err) => warn!("Skipping {} for date {date}: {err}", family.name()),
        }
        Ok(())
    }

    async fn sync_activities(&mut self, date: NaiveDate) -> Result<(), ProviderError> {
        let payload = self.api.activities_by_date(date).await?;
        let (points, refs) = match transform::activity::transform(&payload, &self.ctx) {
            Ok(result) => result,
            Err(err) => {
                warn!("Skipping activity summaries for date {date}: {err}");
                return Ok(());
            }
        };
        self.write_batch(points).await;

        let api = Arc::clone(&self.api);
        let extractor = TrackExtractor::new(api.as_ref(), &self.config);
        let track_points = extractor.extract(&refs, &mut self.ctx).await?;
        self.write_batch(track_points).await;
        Ok(())
    }
}

#[async_trait]
impl SyncUnit for SyncEngine {
    async fn fetch_date(&mut self, date: NaiveDate) -> Result<(), ProviderError> {
        for family in MetricFamily::CORE {
            self.sync_family(family, date).await?;
        }
        self.sync_activities(date).await?;
        if self.config.fetch_advanced_training_data {
            for family in MetricFamily::ADVANCED {
                self.sync_family(family, date).await?;
            }
        }
        Ok(())
    }

    async fn reauthenticate(&mut self) -> Result<(), ProviderError> {
        self.api.relogin().await
    }
}

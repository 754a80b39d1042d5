// ABOUTME: Table-driven metric transformer registry
// ABOUTME: Maps each metric family to its fetch endpoint and normalization function
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Metric Transformer Registry
//!
//! One normalization function per metric family, dispatched through
//! [`MetricFamily`]. Every transformer follows the same shared rules:
//!
//! - timestamps arrive either as naive GMT strings with fractional seconds
//!   or as epoch milliseconds; each payload field uses exactly one encoding
//! - a value of exactly zero is a real reading; only `null`/missing is absent
//! - summary-type points require their anchor timestamp and at least one
//!   non-null field, otherwise nothing is emitted for that date
//! - every point carries the run's device identity tag

pub mod activity;
pub mod body;
pub mod daily;
pub mod device;
pub mod intraday;
pub mod sleep;
pub mod training;

use crate::context::RunContext;
use crate::errors::ProviderError;
use crate::models::TimePoint;
use crate::providers::garmin::GarminApi;
use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

/// The metric families synchronized for every calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricFamily {
    DailyStats,
    Sleep,
    StepsIntraday,
    HeartRateIntraday,
    StressIntraday,
    BreathingRateIntraday,
    HrvIntraday,
    BodyComposition,
    TrainingReadiness,
    HillScore,
    RacePredictions,
    Vo2Max,
}

impl MetricFamily {
    /// Families fetched on every run.
    pub const CORE: [Self; 8] = [
        Self::DailyStats,
        Self::Sleep,
        Self::StepsIntraday,
        Self::HeartRateIntraday,
        Self::StressIntraday,
        Self::BreathingRateIntraday,
        Self::HrvIntraday,
        Self::BodyComposition,
    ];

    /// Families gated behind the advanced-training-data toggle.
    pub const ADVANCED: [Self; 4] = [
        Self::TrainingReadiness,
        Self::HillScore,
        Self::RacePredictions,
        Self::Vo2Max,
    ];

    /// Human-readable family name for log lines.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::DailyStats => "daily stats",
            Self::Sleep => "sleep",
            Self::StepsIntraday => "intraday steps",
            Self::HeartRateIntraday => "intraday heart rate",
            Self::StressIntraday => "intraday stress and body battery",
            Self::BreathingRateIntraday => "intraday breathing rate",
            Self::HrvIntraday => "intraday HRV",
            Self::BodyComposition => "body composition",
            Self::TrainingReadiness => "training readiness",
            Self::HillScore => "hill score",
            Self::RacePredictions => "race predictions",
            Self::Vo2Max => "VO2 max",
        }
    }

    /// Fetch the family's raw payload for one calendar date.
    ///
    /// # Errors
    ///
    /// Propagates the collaborator's classified [`ProviderError`].
    pub async fn fetch(
        self,
        api: &dyn GarminApi,
        date: NaiveDate,
    ) -> Result<Value, ProviderError> {
        match self {
            Self::DailyStats => api.daily_stats(date).await,
            Self::Sleep => api.sleep_data(date).await,
            Self::StepsIntraday => api.steps_data(date).await,
            Self::HeartRateIntraday => api.heart_rates(date).await,
            Self::StressIntraday => api.stress_data(date).await,
            Self::BreathingRateIntraday => api.respiration_data(date).await,
            Self::HrvIntraday => api.hrv_data(date).await,
            Self::BodyComposition => api.weigh_ins(date).await,
            Self::TrainingReadiness => api.training_readiness(date).await,
            Self::HillScore => api.hill_score(date).await,
            Self::RacePredictions => api.race_predictions().await,
            Self::Vo2Max => api.max_metrics(date).await,
        }
    }

    /// Normalize a raw payload into canonical points.
    ///
    /// # Errors
    ///
    /// Returns an error when the payload shape cannot be deserialized; the
    /// orchestrator logs and skips the family for that date.
    pub fn transform(
        self,
        payload: &Value,
        ctx: &RunContext,
        date: NaiveDate,
    ) -> Result<Vec<TimePoint>> {
        match self {
            Self::DailyStats => daily::transform(payload, ctx, date),
            Self::Sleep => sleep::transform(payload, ctx),
            Self::StepsIntraday => intraday::transform_steps(payload, ctx),
            Self::HeartRateIntraday => intraday::transform_heart_rate(payload, ctx),
            Self::StressIntraday => intraday::transform_stress(payload, ctx),
            Self::BreathingRateIntraday => intraday::transform_breathing_rate(payload, ctx),
            Self::HrvIntraday => intraday::transform_hrv(payload, ctx),
            Self::BodyComposition => body::transform(payload, ctx, date),
            Self::TrainingReadiness => training::transform_readiness(payload, ctx),
            Self::HillScore => training::transform_hill_score(payload, ctx, date),
            Self::RacePredictions => training::transform_race_predictions(payload, ctx, date),
            Self::Vo2Max => training::transform_vo2_max(payload, ctx, date),
        }
    }
}

/// Point skeleton with the run's device tag applied.
pub(crate) fn base_point(
    measurement: &str,
    time: DateTime<Utc>,
    ctx: &RunContext,
) -> TimePoint {
    TimePoint::new(measurement, time).tag("Device", &ctx.device_name)
}

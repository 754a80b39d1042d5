// ABOUTME: Main library entry point for the Garmin Connect to InfluxDB sync engine
// ABOUTME: Exposes the window resolver, retry controller, transformers and track extractor
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![deny(unsafe_code)]

//! # Garmin Sync
//!
//! Incremental synchronization of a Garmin Connect account's health and
//! activity metrics into an InfluxDB 1.x time-series database.
//!
//! The engine resolves which calendar dates still need fetching from a
//! persisted watermark, fetches each date under a retry controller that
//! classifies upstream failures (rate limit, transient, session expiry),
//! normalizes the loosely-typed payloads into canonical time-series points,
//! and reconstructs per-activity GPS traces from FIT exports with a TCX
//! fallback.
//!
//! ## Architecture
//!
//! - **Providers**: thin Garmin Connect API client behind the [`providers::garmin::GarminApi`] trait
//! - **Sink**: InfluxDB line-protocol writer behind the [`sink::TimeSeriesSink`] trait
//! - **Transform**: table-driven per-metric-family normalization
//! - **Track**: FIT/TCX activity track extraction with run-lifetime dedup
//! - **Sync**: the orchestrator composing all of the above in bulk or daemon mode

pub mod config;
pub mod context;
pub mod convert;
pub mod errors;
pub mod logging;
pub mod models;
pub mod providers;
pub mod retry;
pub mod sink;
pub mod sync;
pub mod track;
pub mod transform;
pub mod window;

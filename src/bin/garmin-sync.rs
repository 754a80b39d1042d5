// ABOUTME: Binary entry point for the Garmin Connect to InfluxDB sync daemon
// ABOUTME: Dispatches between one-shot bulk mode and the unbounded daemon loop
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use garmin_sync::config::Config;
use garmin_sync::errors::ProviderError;
use garmin_sync::logging;
use garmin_sync::providers::garmin::GarminClient;
use garmin_sync::sink::InfluxSink;
use garmin_sync::sync::SyncEngine;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "garmin-sync",
    version,
    about = "Incremental Garmin Connect health-metrics sync into InfluxDB"
)]
struct Cli {
    /// Bulk-mode start date (YYYY-MM-DD); runs the window once and exits
    #[arg(long)]
    start_date: Option<NaiveDate>,

    /// Bulk-mode end date (YYYY-MM-DD), defaults to today
    #[arg(long)]
    end_date: Option<NaiveDate>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    logging::init(&config.log_level);

    let sink = InfluxSink::new(&config.influxdb)?;
    sink.ping()
        .await
        .context("unable to connect to the InfluxDB database, aborted")?;

    let client = Arc::new(GarminClient::new(&config)?);
    if let Err(err) = client.login().await {
        match err {
            ProviderError::AuthExpired(msg) => {
                warn!("{msg}");
                client.interactive_login().await?;
            }
            other => return Err(other.into()),
        }
    }

    let start_date = cli.start_date.or(config.manual_start_date);
    let end_date = cli.end_date.unwrap_or(config.manual_end_date);

    let mut engine = SyncEngine::new(client, Arc::new(sink), config);
    match start_date {
        Some(start) => {
            engine.run_bulk(start, end_date).await?;
            info!(
                "Bulk update success: fetched all available health metrics for date range {start} to {end_date}"
            );
            Ok(())
        }
        None => engine.run_daemon().await,
    }
}

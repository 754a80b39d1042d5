// ABOUTME: Run-scoped mutable state passed explicitly to every component
// ABOUTME: Holds the resolved device name, local-time offset and the activity dedup guard
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use chrono::Duration;
use std::collections::HashSet;

/// Mutable state for one process lifetime.
///
/// There is exactly one writer at any time (the orchestrator, or the track
/// extractor it lends the context to), so no locking is involved.
#[derive(Debug)]
pub struct RunContext {
    /// Device tag stamped on every emitted point
    pub device_name: String,
    /// Whether the device name may still be overwritten by auto-detection
    pub device_name_automatic: bool,
    /// Offset between the account's local time and UTC, detected once per run
    pub local_offset: Duration,
    /// Activity ids already extracted in this process lifetime; append-only,
    /// cleared only by a restart
    parsed_activity_ids: HashSet<u64>,
}

impl RunContext {
    #[must_use]
    pub fn new(configured_device_name: Option<String>) -> Self {
        let device_name_automatic = configured_device_name.is_none();
        Self {
            device_name: configured_device_name.unwrap_or_else(|| "Unknown".to_owned()),
            device_name_automatic,
            local_offset: Duration::zero(),
            parsed_activity_ids: HashSet::new(),
        }
    }

    /// Dedup guard check; authoritative for this process's lifetime.
    #[must_use]
    pub fn is_activity_parsed(&self, id: u64) -> bool {
        self.parsed_activity_ids.contains(&id)
    }

    /// Record an activity after a successful or exhausted extraction attempt.
    pub fn mark_activity_parsed(&mut self, id: u64) {
        self.parsed_activity_ids.insert(id);
    }
}

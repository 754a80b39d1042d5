// ABOUTME: Upstream data-provider implementations
// ABOUTME: Currently the Garmin Connect web API client behind the GarminApi trait
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

pub mod garmin;

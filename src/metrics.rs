//! Lightweight metrics helpers for citypop.
//!
//! This module exposes a small set of convenience functions and RAII timers
//! wrapping the `metrics` crate macros. No exporter is embedded; the
//! application can install any compatible recorder externally.
//!
//! Provided metrics (labels vary by family):
//! * `citypop_requests_total` (counter)
//! * `citypop_request_duration_seconds` (histogram)
//! * `citypop_store_operations_total` (counter)
//! * `citypop_store_operation_duration_seconds` (histogram)
//! * `citypop_store_health_status` (gauge per backend)
//!
//! The `*Timer` structs leverage `Drop` to record durations even when early
//! returns or errors occur.
use std::{collections::HashMap, sync::Mutex, time::Instant};

use metrics::{
    Unit, counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram,
};
use once_cell::sync::Lazy;

pub const CITYPOP_REQUESTS_TOTAL: &str = "citypop_requests_total";
pub const CITYPOP_REQUEST_DURATION_SECONDS: &str = "citypop_request_duration_seconds";
pub const CITYPOP_STORE_OPERATIONS_TOTAL: &str = "citypop_store_operations_total"; // labels: backend, operation, outcome
pub const CITYPOP_STORE_OPERATION_DURATION_SECONDS: &str =
    "citypop_store_operation_duration_seconds";
pub const CITYPOP_STORE_HEALTH_STATUS: &str = "citypop_store_health_status";

/// Last reported health per store backend
pub static STORE_HEALTH_GAUGES: Lazy<Mutex<HashMap<String, f64>>> = Lazy::new(|| {
    describe_counter!(
        CITYPOP_REQUESTS_TOTAL,
        Unit::Count,
        "Total number of HTTP requests handled."
    );
    describe_histogram!(
        CITYPOP_REQUEST_DURATION_SECONDS,
        Unit::Seconds,
        "Latency of HTTP requests handled."
    );
    describe_counter!(
        CITYPOP_STORE_OPERATIONS_TOTAL,
        Unit::Count,
        "Total number of document store operations."
    );
    describe_histogram!(
        CITYPOP_STORE_OPERATION_DURATION_SECONDS,
        Unit::Seconds,
        "Latency of document store operations."
    );
    describe_gauge!(
        CITYPOP_STORE_HEALTH_STATUS,
        "Health of the document store (1 for healthy, 0 for unhealthy)"
    );

    Mutex::new(HashMap::new())
});

/// Set (and record) the health gauge for a store backend.
pub fn set_store_health_status(backend: &str, is_healthy: bool) {
    let health_value = if is_healthy { 1.0 } else { 0.0 };

    if let Ok(mut gauges) = STORE_HEALTH_GAUGES.lock() {
        gauges.insert(backend.to_string(), health_value);
    } else {
        tracing::error!("Failed to acquire lock for store health gauges");
        return;
    }

    gauge!(CITYPOP_STORE_HEALTH_STATUS, "backend" => backend.to_string()).set(health_value);
}

/// Increment the total request counter.
pub fn increment_request_total(path: &str, method: &str, status: u16) {
    counter!(
        CITYPOP_REQUESTS_TOTAL,
        "path" => path.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a completed request's duration.
pub fn record_request_duration(path: &str, method: &str, duration: std::time::Duration) {
    histogram!(
        CITYPOP_REQUEST_DURATION_SECONDS,
        "path" => path.to_string(),
        "method" => method.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Count a store operation by outcome (`ok` / `error`).
pub fn increment_store_operation_total(backend: &str, operation: &str, outcome: &str) {
    counter!(
        CITYPOP_STORE_OPERATIONS_TOTAL,
        "backend" => backend.to_string(),
        "operation" => operation.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a completed store operation's duration.
pub fn record_store_operation_duration(
    backend: &str,
    operation: &str,
    duration: std::time::Duration,
) {
    histogram!(
        CITYPOP_STORE_OPERATION_DURATION_SECONDS,
        "backend" => backend.to_string(),
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// RAII helper measuring request duration.
pub struct RequestTimer {
    start: Instant,
    path: String,
    method: String,
}

impl RequestTimer {
    pub fn new(path: &str, method: &str) -> Self {
        Self {
            start: Instant::now(),
            path: path.to_string(),
            method: method.to_string(),
        }
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        record_request_duration(&self.path, &self.method, self.start.elapsed());
    }
}

/// RAII helper measuring store operation duration.
pub struct StoreOperationTimer {
    start: Instant,
    backend: &'static str,
    operation: &'static str,
}

impl StoreOperationTimer {
    pub fn new(backend: &'static str, operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            backend,
            operation,
        }
    }
}

impl Drop for StoreOperationTimer {
    fn drop(&mut self) {
        record_store_operation_duration(self.backend, self.operation, self.start.elapsed());
    }
}

/// Initialize metric descriptions (idempotent).
pub fn init_metrics() -> eyre::Result<()> {
    tracing::info!("Initializing citypop metrics");

    Lazy::force(&STORE_HEALTH_GAUGES);

    tracing::info!("citypop metrics initialized");
    Ok(())
}

//! Prometheus metrics for the sync service: HTTP admin surface latency, and
//! the `RetryExecutor`/`CircuitBreaker` attempt/failure/state gauges that
//! govern every remote call. Ambient operability per §9 — carried even
//! though the spec's Non-goals exclude product-level metrics such as
//! inventory reconciliation.

#![allow(dead_code)]

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

/// Metric names as constants for consistency.
pub mod names {
    // HTTP admin surface
    pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

    // Poll cycles
    pub const POLL_CYCLES_TOTAL: &str = "poll_cycles_total";
    pub const POLL_CYCLE_DURATION_SECONDS: &str = "poll_cycle_duration_seconds";
    pub const ORDERS_POLLED_TOTAL: &str = "orders_polled_total";
    pub const ORDERS_CREATED_TOTAL: &str = "orders_created_total";
    pub const ORDERS_UPDATED_TOTAL: &str = "orders_updated_total";
    pub const ORDER_SYNC_ERRORS_TOTAL: &str = "order_sync_errors_total";

    // Retry / circuit breaker fabric
    pub const RETRY_ATTEMPTS_TOTAL: &str = "retry_attempts_total";
    pub const RETRY_RETRIES_TOTAL: &str = "retry_retries_total";
    pub const RETRY_FAILURES_TOTAL: &str = "retry_failures_total";
    pub const CIRCUIT_BREAKER_STATE: &str = "circuit_breaker_state";
}

/// Label keys.
pub mod labels {
    pub const METHOD: &str = "method";
    pub const ENDPOINT: &str = "endpoint";
    pub const STATUS: &str = "status";
    pub const EXECUTOR: &str = "executor";
}

/// Initializes the Prometheus metrics exporter. Returns a handle whose
/// `render()` backs the `/metrics` surface, matching the teacher's own
/// `metrics-exporter-prometheus` setup.
pub fn init_metrics() -> PrometheusHandle {
    let builder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(names::HTTP_REQUEST_DURATION_SECONDS.to_string()),
            &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
        )
        .unwrap()
        .set_buckets_for_metric(
            Matcher::Full(names::POLL_CYCLE_DURATION_SECONDS.to_string()),
            &[0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0],
        )
        .unwrap();

    builder.install_recorder().expect("failed to install Prometheus recorder")
}

pub fn record_http_request(method: &str, endpoint: &str, status: u16, duration_seconds: f64) {
    counter!(
        names::HTTP_REQUESTS_TOTAL,
        labels::METHOD => method.to_string(),
        labels::ENDPOINT => endpoint.to_string(),
        labels::STATUS => status.to_string(),
    )
    .increment(1);
    histogram!(
        names::HTTP_REQUEST_DURATION_SECONDS,
        labels::METHOD => method.to_string(),
        labels::ENDPOINT => endpoint.to_string(),
    )
    .record(duration_seconds);
}

pub fn record_poll_cycle(status: &str, duration_seconds: f64, polled: u32, created: u32, updated: u32, errors: u32) {
    counter!(names::POLL_CYCLES_TOTAL, labels::STATUS => status.to_string()).increment(1);
    histogram!(names::POLL_CYCLE_DURATION_SECONDS).record(duration_seconds);
    counter!(names::ORDERS_POLLED_TOTAL).increment(polled as u64);
    counter!(names::ORDERS_CREATED_TOTAL).increment(created as u64);
    counter!(names::ORDERS_UPDATED_TOTAL).increment(updated as u64);
    counter!(names::ORDER_SYNC_ERRORS_TOTAL).increment(errors as u64);
}

/// Called after every `RetryExecutor::execute` attempt to mirror the
/// in-process `ExecutorMetricsSnapshot` into Prometheus.
pub fn record_retry_snapshot(executor: &str, snapshot: &crate::retry::ExecutorMetricsSnapshot) {
    counter!(names::RETRY_ATTEMPTS_TOTAL, labels::EXECUTOR => executor.to_string())
        .absolute(snapshot.total_attempts);
    counter!(names::RETRY_RETRIES_TOTAL, labels::EXECUTOR => executor.to_string())
        .absolute(snapshot.total_retries);
    counter!(names::RETRY_FAILURES_TOTAL, labels::EXECUTOR => executor.to_string())
        .absolute(snapshot.total_failures);
}

pub fn record_circuit_state(executor: &str, state: crate::retry::CircuitState) {
    let value = match state {
        crate::retry::CircuitState::Closed => 0.0,
        crate::retry::CircuitState::HalfOpen => 1.0,
        crate::retry::CircuitState::Open => 2.0,
    };
    gauge!(names::CIRCUIT_BREAKER_STATE, labels::EXECUTOR => executor.to_string()).set(value);
}

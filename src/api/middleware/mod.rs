//! API middleware: HTTP metrics recording for the thin admin surface.

pub mod metrics;

pub use metrics::metrics_middleware;

//! Collects typed errors and warnings across one poll cycle and renders the
//! final summary consumed by the Report.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::time::Instant;

use crate::error::{ErrorSeverity, SyncError};

#[derive(Debug, Clone, Serialize)]
pub struct RecordedIssue {
    pub order_reference: Option<String>,
    pub code: String,
    pub message: String,
}

struct Inner {
    errors: Vec<RecordedIssue>,
    warnings: Vec<RecordedIssue>,
    processed: u32,
    success: u32,
    start: Instant,
    start_time: DateTime<Utc>,
}

pub struct ErrorAggregator {
    inner: Mutex<Inner>,
}

/// §4.3's `summary()` shape: `start`/`end` bracket the cycle in wall-clock
/// time, `duration_seconds` is derived from the monotonic clock.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatorSummary {
    pub processed: u32,
    pub error_count: u32,
    pub warning_count: u32,
    pub success_count: u32,
    pub duration_seconds: f64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub errors: Vec<RecordedIssue>,
    pub warnings: Vec<RecordedIssue>,
}

impl ErrorAggregator {
    pub fn new() -> Self {
        ErrorAggregator {
            inner: Mutex::new(Inner {
                errors: Vec::new(),
                warnings: Vec::new(),
                processed: 0,
                success: 0,
                start: Instant::now(),
                start_time: Utc::now(),
            }),
        }
    }

    /// Routes by severity: HIGH/CRITICAL become errors, LOW/MEDIUM become
    /// warnings, matching the source aggregator's bucketing.
    pub fn add(&self, order_reference: Option<&str>, err: &SyncError) {
        let issue = RecordedIssue {
            order_reference: order_reference.map(str::to_string),
            code: err.code().to_string(),
            message: err.to_string(),
        };
        let mut inner = self.inner.lock();
        match err.severity() {
            ErrorSeverity::High | ErrorSeverity::Critical => inner.errors.push(issue),
            ErrorSeverity::Low | ErrorSeverity::Medium => inner.warnings.push(issue),
        }
    }

    pub fn add_warning(&self, order_reference: Option<&str>, code: &str, message: impl Into<String>) {
        let mut inner = self.inner.lock();
        inner.warnings.push(RecordedIssue {
            order_reference: order_reference.map(str::to_string),
            code: code.to_string(),
            message: message.into(),
        });
    }

    pub fn increment_processed(&self) {
        self.inner.lock().processed += 1;
    }

    pub fn increment_success(&self) {
        self.inner.lock().success += 1;
    }

    /// Throws if any stored error carries critical severity. The severity is
    /// not retained per-issue today (only the bucket), so this inspects the
    /// error codes known to always be critical.
    pub fn raise_if_critical(&self) -> Result<(), SyncError> {
        let inner = self.inner.lock();
        if let Some(issue) = inner.errors.iter().find(|i| {
            i.code == "RMS_CONNECTION_FAILED"
                || i.code == "SERVICE_UNAVAILABLE"
                || i.code == "STOREFRONT_UNAUTHORIZED"
                || i.code == "CONFIGURATION_ERROR"
        }) {
            return Err(SyncError::Sync(issue.message.clone()));
        }
        Ok(())
    }

    /// Clears all recorded issues and counters, restarting the duration
    /// clock. Used by `resetStatistics` (§6).
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.errors.clear();
        inner.warnings.clear();
        inner.processed = 0;
        inner.success = 0;
        inner.start = Instant::now();
        inner.start_time = Utc::now();
    }

    pub fn summary(&self) -> AggregatorSummary {
        let inner = self.inner.lock();
        AggregatorSummary {
            processed: inner.processed,
            error_count: inner.errors.len() as u32,
            warning_count: inner.warnings.len() as u32,
            success_count: inner.success,
            duration_seconds: inner.start.elapsed().as_secs_f64(),
            start: inner.start_time,
            end: Utc::now(),
            errors: inner.errors.clone(),
            warnings: inner.warnings.clone(),
        }
    }
}

impl Default for ErrorAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_by_severity() {
        let agg = ErrorAggregator::new();
        agg.add(Some("SHOPIFY-1"), &SyncError::RmsConnection("down".into()));
        agg.add(Some("SHOPIFY-2"), &SyncError::RateLimited { retry_after_secs: 5 });
        let summary = agg.summary();
        assert_eq!(summary.error_count, 1);
        assert_eq!(summary.warning_count, 1);
    }

    #[test]
    fn raise_if_critical_flags_connection_loss() {
        let agg = ErrorAggregator::new();
        agg.add(None, &SyncError::RmsConnection("down".into()));
        assert!(agg.raise_if_critical().is_err());
    }
}

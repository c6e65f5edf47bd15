//! The polling orchestrator (§4.10): the single entry point the admin HTTP
//! surface and the background scheduler both call into. Owns the
//! cumulative counters and the long-lived `ErrorAggregator`, and
//! single-flights cycles so two overlapping callers never interleave.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, instrument};

use crate::services::error_aggregator::{AggregatorSummary, ErrorAggregator};
use crate::services::poller::{CycleStatistics, CycleStatus, OrderPoller, PollOptions};

#[derive(Debug, Clone, Default)]
struct CumulativeCounters {
    total_polled: u64,
    already_synced: u64,
    newly_synced: u64,
    updated: u64,
    sync_errors: u64,
    last_poll_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSnapshot {
    pub total_polled: u64,
    pub already_synced: u64,
    pub newly_synced: u64,
    pub updated: u64,
    pub sync_errors: u64,
    pub last_poll_time: Option<DateTime<Utc>>,
    pub error_summary: AggregatorSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportStatistics {
    pub total_polled: u32,
    pub already_synced: u32,
    pub newly_synced: u32,
    pub updated: u32,
    pub sync_errors: u32,
    pub success_rate: f64,
}

impl From<&CycleStatistics> for ReportStatistics {
    fn from(s: &CycleStatistics) -> Self {
        ReportStatistics {
            total_polled: s.total_polled,
            already_synced: s.already_synced,
            newly_synced: s.newly_synced,
            updated: s.updated,
            sync_errors: s.sync_errors,
            success_rate: s.success_rate(),
        }
    }
}

/// The `pollAndSync` return value (§6).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub duration_seconds: f64,
    pub message: String,
    pub statistics: ReportStatistics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_order_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct PollingOrchestrator {
    poller: OrderPoller,
    aggregator: ErrorAggregator,
    cumulative: Mutex<CumulativeCounters>,
    /// Enforces §5's "no interleaved cycles" rule: a second caller simply
    /// waits for the in-flight cycle to finish rather than running
    /// concurrently.
    single_flight: AsyncMutex<()>,
}

impl PollingOrchestrator {
    pub fn new(poller: OrderPoller) -> Self {
        PollingOrchestrator {
            poller,
            aggregator: ErrorAggregator::new(),
            cumulative: Mutex::new(CumulativeCounters::default()),
            single_flight: AsyncMutex::new(()),
        }
    }

    /// No heavy lifting here by design (§9): the gateway, store, and
    /// executors are constructed in `main` before the orchestrator exists,
    /// so there is no import-time side effect to replicate.
    pub async fn initialize(&self) {
        info!("polling orchestrator initialized");
    }

    pub async fn close(&self) {
        info!("polling orchestrator closed");
    }

    #[instrument(skip(self, opts))]
    pub async fn poll_and_sync(&self, opts: PollOptions) -> Report {
        let _guard = self.single_flight.lock().await;

        let dry_run = opts.dry_run;
        let result = self.poller.poll_and_sync(&opts, &self.aggregator).await;

        {
            let mut cumulative = self.cumulative.lock();
            cumulative.total_polled += result.statistics.total_polled as u64;
            cumulative.already_synced += result.statistics.already_synced as u64;
            cumulative.newly_synced += result.statistics.newly_synced as u64;
            cumulative.updated += result.statistics.updated as u64;
            cumulative.sync_errors += result.statistics.sync_errors as u64;
            cumulative.last_poll_time = Some(Utc::now());
        }

        let status = match result.status {
            CycleStatus::Success => "success",
            CycleStatus::DryRun => "dry_run",
            CycleStatus::Error => "error",
        };

        crate::metrics::record_poll_cycle(
            status,
            result.duration.as_secs_f64(),
            result.statistics.total_polled,
            result.statistics.newly_synced,
            result.statistics.updated,
            result.statistics.sync_errors,
        );
        let message = match result.status {
            CycleStatus::Success => format!(
                "synced {} new, {} updated orders",
                result.statistics.newly_synced, result.statistics.updated
            ),
            CycleStatus::DryRun => format!("dry run: {} orders would be synced", result.statistics.total_polled),
            CycleStatus::Error => result
                .error
                .clone()
                .unwrap_or_else(|| "poll cycle failed".to_string()),
        };

        Report {
            status,
            timestamp: Utc::now(),
            duration_seconds: (result.duration.as_secs_f64() * 100.0).round() / 100.0,
            message,
            statistics: ReportStatistics::from(&result.statistics),
            new_order_ids: if dry_run { Some(result.new_order_ids) } else { None },
            error: result.error,
        }
    }

    pub fn statistics(&self) -> StatisticsSnapshot {
        let cumulative = self.cumulative.lock().clone();
        StatisticsSnapshot {
            total_polled: cumulative.total_polled,
            already_synced: cumulative.already_synced,
            newly_synced: cumulative.newly_synced,
            updated: cumulative.updated,
            sync_errors: cumulative.sync_errors,
            last_poll_time: cumulative.last_poll_time,
            error_summary: self.aggregator.summary(),
        }
    }

    pub fn reset_statistics(&self) {
        *self.cumulative.lock() = CumulativeCounters::default();
        self.aggregator.reset();
    }
}

//! `order-sync`: polls a storefront for recently changed orders and
//! atomically upserts them into the RMS database behind a retry/circuit
//! breaker fabric. `main.rs` wires these modules into a runnable service;
//! everything below is also usable as a library for integration tests.

pub mod config;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod models;
pub mod retry;
pub mod services;
pub mod store;
pub mod utils;

pub mod api;

use crate::config::AppConfig;
use crate::services::orchestrator::PollingOrchestrator;

/// Shared state handed to every admin handler. `config` is kept around for
/// the scheduler loop in `main`; the handlers themselves only ever touch
/// `orchestrator`.
pub struct AppState {
    pub config: AppConfig,
    pub orchestrator: PollingOrchestrator,
}

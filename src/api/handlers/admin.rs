//! The thin admin surface (§6, SPEC_FULL ambient HTTP section): three
//! handlers that delegate straight to `PollingOrchestrator`, returning its
//! `Report`/`statistics()` bodies wrapped in the shared `ApiResponse`
//! envelope.

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::services::poller::PollOptions;
use crate::utils::response::ApiResponse;
use crate::AppState;

/// Accepts `{}` (or any subset of `PollOptions`' fields) and runs one
/// cycle with the scheduler's own defaults filling in whatever was
/// omitted.
pub async fn poll(
    State(state): State<Arc<AppState>>,
    Json(opts): Json<PollOptions>,
) -> Json<ApiResponse<crate::services::orchestrator::Report>> {
    let report = state.orchestrator.poll_and_sync(opts).await;
    Json(ApiResponse::success(report))
}

pub async fn stats(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<crate::services::orchestrator::StatisticsSnapshot>> {
    Json(ApiResponse::success(state.orchestrator.statistics()))
}

pub async fn reset_stats(State(state): State<Arc<AppState>>) -> Json<ApiResponse<()>> {
    state.orchestrator.reset_statistics();
    Json(ApiResponse::success(()))
}

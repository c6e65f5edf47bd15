//! The thin admin router (§6): `POST /poll`, `GET /stats`,
//! `POST /stats/reset`. The core's real inbound contract is the Rust
//! trait/function signatures these delegate to, not this HTTP surface.

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::api::handlers;
use crate::api::middleware::metrics_middleware;
use crate::AppState;

pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/poll", post(handlers::admin::poll))
        .route("/stats", get(handlers::admin::stats))
        .route("/stats/reset", post(handlers::admin::reset_stats))
        .layer(axum_middleware::from_fn(metrics_middleware))
}

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use order_sync::config::AppConfig;
use order_sync::gateway::reqwest_client::ReqwestStorefrontGateway;
use order_sync::metrics;
use order_sync::retry::RetryExecutor;
use order_sync::services::converter::OrderConverter;
use order_sync::services::customer_resolver::CustomerResolver;
use order_sync::services::orchestrator::PollingOrchestrator;
use order_sync::services::poller::{OrderPoller, PollOptions};
use order_sync::store::postgres::PgRmsStore;
use order_sync::{api, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "order_sync=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load()?;
    tracing::info!("starting order-sync v{}", env!("CARGO_PKG_VERSION"));

    let _metrics_handle = metrics::init_metrics();

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    tracing::info!("rms database connected");

    let http_client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?;

    let gateway = Arc::new(ReqwestStorefrontGateway::new(
        http_client,
        config.storefront_base_url.clone(),
        config.storefront_api_token.clone(),
    ));
    let store = Arc::new(PgRmsStore::new(pool));

    let storefront_executor = Arc::new(RetryExecutor::storefront());
    let rms_executor = Arc::new(RetryExecutor::rms());
    let sync_executor = Arc::new(RetryExecutor::sync());

    let customer_resolver = CustomerResolver::new(store.clone(), config.customer_resolver_config());
    let converter = OrderConverter::new(config.rms_store_id, config.shipping_item_id);

    let poller = OrderPoller::new(
        gateway,
        store,
        storefront_executor,
        rms_executor,
        sync_executor,
        converter,
        customer_resolver,
    );
    let orchestrator = PollingOrchestrator::new(poller);
    orchestrator.initialize().await;

    let state = Arc::new(AppState { config: config.clone(), orchestrator });

    if config.enable_order_polling {
        let scheduler_state = state.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(scheduler_state.config.poll_interval());
            ticker.tick().await; // first tick fires immediately; skip it, the scheduler waits a full interval
            loop {
                ticker.tick().await;
                let opts = PollOptions {
                    lookback_minutes: scheduler_state.config.order_polling_lookback_minutes,
                    batch_size: scheduler_state.config.batch_size(),
                    max_pages: scheduler_state.config.order_polling_max_pages,
                    dry_run: scheduler_state.config.dry_run,
                    financial_statuses: scheduler_state.config.allowed_financial_statuses(),
                    ..Default::default()
                };
                let report = scheduler_state.orchestrator.poll_and_sync(opts).await;
                tracing::info!(status = report.status, message = %report.message, "scheduled poll cycle finished");
            }
        });
        tracing::info!(
            interval_minutes = config.order_polling_interval_minutes,
            "background polling scheduler started"
        );
    } else {
        tracing::warn!("ORDER_SYNC__ENABLE_ORDER_POLLING is false, scheduler not started");
    }

    let app = Router::new()
        .route("/health", get(health_check))
        .merge(api::routes::create_router())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.http_port));
    tracing::info!("server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    state.orchestrator.close().await;
    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

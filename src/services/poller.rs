//! The cycle driver (§4.9): paginated fetch, existence check, per-order
//! convert + write, and a final report.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

use crate::error::SyncError;
use crate::gateway::StorefrontGateway;
use crate::models::{FinancialStatus, FulfillmentStatus, OrderFilter, OrderReference, StorefrontOrder};
use crate::retry::RetryExecutor;
use crate::services::converter::{OrderConverter, SkuResolution};
use crate::services::customer_resolver::CustomerResolver;
use crate::services::error_aggregator::ErrorAggregator;
use crate::services::writer::OrderWriter;
use crate::store::RmsStore;

/// The `POST /poll` request body (§6): every field optional, falling back to
/// the configured defaults so an empty `{}` reproduces the scheduler's own
/// cycle.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PollOptions {
    pub lookback_minutes: i64,
    pub batch_size: u32,
    pub max_pages: u32,
    pub dry_run: bool,
    pub include_test_orders: bool,
    pub financial_statuses: Option<Vec<FinancialStatus>>,
    pub fulfillment_statuses: Option<Vec<FulfillmentStatus>>,
}

impl Default for PollOptions {
    fn default() -> Self {
        PollOptions {
            lookback_minutes: 15,
            batch_size: 50,
            max_pages: 10,
            dry_run: false,
            include_test_orders: false,
            financial_statuses: Some(vec![
                FinancialStatus::Paid,
                FinancialStatus::PartiallyPaid,
                FinancialStatus::PartiallyRefunded,
            ]),
            fulfillment_statuses: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleStatistics {
    pub total_polled: u32,
    pub already_synced: u32,
    pub newly_synced: u32,
    pub updated: u32,
    pub sync_errors: u32,
}

impl CycleStatistics {
    pub fn success_rate(&self) -> f64 {
        let denom = self.newly_synced + self.updated + self.sync_errors;
        if denom == 0 {
            return 100.0;
        }
        ((self.newly_synced + self.updated) as f64 / denom as f64 * 100.0 * 100.0).round() / 100.0
    }
}

pub struct CycleResult {
    pub status: CycleStatus,
    pub statistics: CycleStatistics,
    pub new_order_ids: Vec<String>,
    pub error: Option<String>,
    pub duration: std::time::Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStatus {
    Success,
    DryRun,
    Error,
}

pub struct OrderPoller {
    gateway: Arc<dyn StorefrontGateway>,
    store: Arc<dyn RmsStore>,
    storefront_executor: Arc<RetryExecutor>,
    rms_executor: Arc<RetryExecutor>,
    sync_executor: Arc<RetryExecutor>,
    converter: OrderConverter,
    customer_resolver: CustomerResolver,
}

impl OrderPoller {
    pub fn new(
        gateway: Arc<dyn StorefrontGateway>,
        store: Arc<dyn RmsStore>,
        storefront_executor: Arc<RetryExecutor>,
        rms_executor: Arc<RetryExecutor>,
        sync_executor: Arc<RetryExecutor>,
        converter: OrderConverter,
        customer_resolver: CustomerResolver,
    ) -> Self {
        OrderPoller {
            gateway,
            store,
            storefront_executor,
            rms_executor,
            sync_executor,
            converter,
            customer_resolver,
        }
    }

    #[instrument(skip(self, opts, aggregator))]
    pub async fn poll_and_sync(&self, opts: &PollOptions, aggregator: &ErrorAggregator) -> CycleResult {
        let start = Instant::now();
        let cutoff = Utc::now() - chrono::Duration::minutes(opts.lookback_minutes);

        let filter = OrderFilter {
            updated_at_min: cutoff,
            financial_statuses: opts.financial_statuses.clone(),
            fulfillment_statuses: opts.fulfillment_statuses.clone(),
            include_test_orders: opts.include_test_orders,
        };

        if opts.batch_size == 0 {
            return CycleResult {
                status: CycleStatus::Success,
                statistics: CycleStatistics::default(),
                new_order_ids: vec![],
                error: None,
                duration: start.elapsed(),
            };
        }

        let orders = match self.fetch_all_pages(&filter, opts).await {
            Ok(orders) => orders,
            Err(err) => {
                aggregator.add(None, &err);
                return CycleResult {
                    status: CycleStatus::Error,
                    statistics: CycleStatistics::default(),
                    new_order_ids: vec![],
                    error: Some(err.to_string()),
                    duration: start.elapsed(),
                };
            }
        };

        let mut stats = CycleStatistics {
            total_polled: orders.len() as u32,
            ..Default::default()
        };

        let refs: Vec<OrderReference> = orders
            .iter()
            .filter_map(|o| o.extract_legacy_id())
            .map(|id| OrderReference::new(&id))
            .collect();

        let existence = match self
            .rms_executor
            .execute(|| {
                let store = self.store.clone();
                let refs = refs.clone();
                async move { store.batch_check_order_existence(&refs).await }
            })
            .await
        {
            Ok(map) => map,
            Err(err) => {
                aggregator.add(None, &err);
                return CycleResult {
                    status: CycleStatus::Error,
                    statistics: stats,
                    new_order_ids: vec![],
                    error: Some(err.to_string()),
                    duration: start.elapsed(),
                };
            }
        };
        stats.already_synced = existence.values().filter(|v| **v).count() as u32;

        if opts.dry_run {
            return CycleResult {
                status: CycleStatus::DryRun,
                statistics: stats,
                new_order_ids: refs.iter().map(|r| r.as_str().to_string()).collect(),
                error: None,
                duration: start.elapsed(),
            };
        }

        for order in &orders {
            if let Some(breaker) = self.storefront_executor.breaker() {
                if breaker.state() == crate::retry::CircuitState::Open {
                    warn!("storefront breaker open mid-cycle, aborting remaining orders");
                    return CycleResult {
                        status: CycleStatus::Error,
                        statistics: stats,
                        new_order_ids: vec![],
                        error: Some("storefront circuit breaker opened mid-cycle".to_string()),
                        duration: start.elapsed(),
                    };
                }
            }

            match self.sync_one(order, &mut stats, aggregator).await {
                Ok(()) => {}
                Err(err) => {
                    stats.sync_errors += 1;
                    aggregator.add(order.extract_legacy_id().as_deref(), &err);
                }
            }
            aggregator.increment_processed();
        }

        CycleResult {
            status: CycleStatus::Success,
            statistics: stats,
            new_order_ids: vec![],
            error: None,
            duration: start.elapsed(),
        }
    }

    async fn fetch_all_pages(
        &self,
        filter: &OrderFilter,
        opts: &PollOptions,
    ) -> Result<Vec<StorefrontOrder>, SyncError> {
        let mut orders = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0u32;

        loop {
            if pages >= opts.max_pages {
                break;
            }
            let page = self
                .storefront_executor
                .execute(|| {
                    let gateway = self.gateway.clone();
                    let filter = filter.clone();
                    let cursor = cursor.clone();
                    let page_size = opts.batch_size;
                    async move {
                        gateway
                            .fetch_recent_orders(&filter, page_size, cursor.as_deref())
                            .await
                    }
                })
                .await?;

            let has_next = page.has_next;
            let end_cursor = page.end_cursor.clone();
            let empty = page.orders.is_empty();
            orders.extend(page.orders);
            pages += 1;

            if !has_next || empty {
                break;
            }
            cursor = end_cursor;
        }

        Ok(orders)
    }

    async fn sync_one(
        &self,
        order: &StorefrontOrder,
        stats: &mut CycleStatistics,
        aggregator: &ErrorAggregator,
    ) -> Result<(), SyncError> {
        let legacy_id = order.extract_legacy_id().ok_or_else(|| SyncError::Conversion {
            reference: order.name.clone(),
            reason: "missing legacy id".to_string(),
        })?;
        let reference = OrderReference::new(&legacy_id);

        let customer_id = self
            .customer_resolver
            .resolve(order.customer.as_ref(), order.billing_address.as_ref())
            .await?;

        let existing = self.store.find_order_by_reference(&reference).await?;
        let order_id_for_entries = existing.as_ref().map(|e| e.id).unwrap_or(0);

        let sku_resolution = self.resolve_skus(order).await?;
        let outcome = self
            .converter
            .convert(order, customer_id, order_id_for_entries, &sku_resolution)?;

        for sku in &outcome.unresolved_skus {
            aggregator.add_warning(Some(reference.as_str()), "SKU_UNRESOLVED", format!("unresolved sku {sku}"));
        }

        let action = self
            .sync_executor
            .execute(|| {
                let writer_store = self.store.clone();
                let header = outcome.header.clone();
                let entries = outcome.entries.clone();
                let shipping_item_id = self.converter.shipping_item_id;
                let existing_row = existing.clone();
                async move {
                    OrderWriter::new(writer_store, shipping_item_id)
                        .upsert(existing_row, header, entries)
                        .await
                }
            })
            .await?;

        match action {
            crate::models::WriteAction::Created { .. } => {
                stats.newly_synced += 1;
                info!(reference = %reference, "order created");
            }
            crate::models::WriteAction::Updated { .. } => {
                stats.updated += 1;
                info!(reference = %reference, "order updated");
            }
        }
        aggregator.increment_success();
        Ok(())
    }

    async fn resolve_skus(&self, order: &StorefrontOrder) -> Result<SkuResolution, SyncError> {
        let mut resolution = SkuResolution::new();
        for line in &order.line_items {
            if let Some(sku) = &line.sku {
                if resolution.contains_key(sku) {
                    continue;
                }
                if let Some(item_id) = self.store.resolve_item_id_by_sku(sku).await? {
                    resolution.insert(sku.clone(), item_id);
                }
            }
        }
        Ok(resolution)
    }
}

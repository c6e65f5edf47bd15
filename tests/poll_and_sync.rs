//! End-to-end scenario tests wiring `MockStorefrontGateway` +
//! `InMemoryRmsStore` through the full `OrderPoller`/`PollingOrchestrator`
//! stack, with no real network or database.

use chrono::Utc;
use order_sync::gateway::mock::MockStorefrontGateway;
use order_sync::models::{
    FetchPage, FinancialStatus, LineItem, OrderTotals, OrderTransaction, ShippingLine,
    StorefrontOrder, TransactionKind, TransactionStatus,
};
use order_sync::retry::RetryExecutor;
use order_sync::services::converter::OrderConverter;
use order_sync::services::customer_resolver::{CustomerResolver, CustomerResolverConfig};
use order_sync::services::error_aggregator::ErrorAggregator;
use order_sync::services::orchestrator::PollingOrchestrator;
use order_sync::services::poller::{CycleStatus, OrderPoller, PollOptions};
use order_sync::store::memory::InMemoryRmsStore;
use rust_decimal_macros::dec;
use std::sync::Arc;

const SHIPPING_ITEM_ID: i64 = 9999;
const STORE_ID: i32 = 40;

fn money(v: rust_decimal::Decimal) -> order_sync::models::Money {
    order_sync::models::Money::new(v)
}

fn order_fixture(legacy_id: &str, total: rust_decimal::Decimal, sku: &str) -> StorefrontOrder {
    StorefrontOrder {
        external_id: format!("gid://storefront/Order/{legacy_id}"),
        legacy_id: legacy_id.to_string(),
        name: format!("#{legacy_id}"),
        created_at: Utc::now(),
        updated_at: Utc::now(),
        financial_status: FinancialStatus::Paid,
        fulfillment_status: None,
        cancelled_at: None,
        test: false,
        totals: OrderTotals {
            total: money(total),
            subtotal: money(total - dec!(5.00)),
            tax: money(dec!(0.00)),
            shipping: money(dec!(5.00)),
            discounts: money(dec!(0.00)),
        },
        customer: None,
        billing_address: None,
        shipping_address: None,
        line_items: vec![LineItem {
            external_id: format!("{legacy_id}-line-1"),
            title: "Widget".to_string(),
            sku: Some(sku.to_string()),
            quantity: 1,
            taxable: true,
            unit_price_original: money(total - dec!(5.00)),
            unit_price_discounted: money(total - dec!(5.00)),
            variant_id: None,
            product_id: None,
        }],
        shipping_line: Some(ShippingLine {
            title: "Standard".to_string(),
            code: None,
            discounted_price: money(dec!(5.00)),
        }),
        transactions: vec![OrderTransaction {
            kind: TransactionKind::Sale,
            status: TransactionStatus::Success,
            test: false,
            amount: money(total),
        }],
    }
}

struct Harness {
    gateway: Arc<MockStorefrontGateway>,
    store: Arc<InMemoryRmsStore>,
    poller: OrderPoller,
}

fn harness(pages: Vec<FetchPage>) -> Harness {
    let gateway = Arc::new(MockStorefrontGateway::with_pages(pages));
    let store = Arc::new(InMemoryRmsStore::new());
    store.seed_sku("WIDGET-1", 555);

    let resolver = CustomerResolver::new(
        store.clone(),
        CustomerResolverConfig {
            allow_guest_orders: true,
            require_customer_email: false,
            default_guest_customer_id: None,
        },
    );
    let poller = OrderPoller::new(
        gateway.clone(),
        store.clone(),
        Arc::new(RetryExecutor::storefront()),
        Arc::new(RetryExecutor::rms()),
        Arc::new(RetryExecutor::sync()),
        OrderConverter::new(STORE_ID, SHIPPING_ITEM_ID),
        resolver,
    );

    Harness { gateway, store, poller }
}

#[tokio::test]
async fn new_orders_are_created_on_first_cycle() {
    let h = harness(vec![FetchPage {
        orders: vec![order_fixture("1001", dec!(100.00), "WIDGET-1")],
        end_cursor: None,
        has_next: false,
    }]);
    let aggregator = ErrorAggregator::new();

    let result = h.poller.poll_and_sync(&PollOptions::default(), &aggregator).await;

    assert_eq!(result.status, CycleStatus::Success);
    assert_eq!(result.statistics.newly_synced, 1);
    assert_eq!(result.statistics.updated, 0);
    assert_eq!(result.statistics.sync_errors, 0);

    let order = h
        .store
        .find_order_by_reference(&order_sync::models::OrderReference::new("1001"))
        .await
        .unwrap()
        .expect("order should exist after first cycle");
    let entries = h.store.entries_for(order.id);
    // one product line + one shipping line
    assert_eq!(entries.len(), 2);
}

/// Re-running the same cycle against the same storefront page must not
/// double-create the order: the second run should see it via
/// `batchCheckOrderExistence`, convert again, and route to the update path.
#[tokio::test]
async fn rerunning_a_cycle_is_idempotent() {
    let h = harness(vec![
        FetchPage {
            orders: vec![order_fixture("2002", dec!(50.00), "WIDGET-1")],
            end_cursor: None,
            has_next: false,
        },
        FetchPage {
            orders: vec![order_fixture("2002", dec!(50.00), "WIDGET-1")],
            end_cursor: None,
            has_next: false,
        },
    ]);
    let aggregator = ErrorAggregator::new();

    let first = h.poller.poll_and_sync(&PollOptions::default(), &aggregator).await;
    assert_eq!(first.statistics.newly_synced, 1);

    let second = h.poller.poll_and_sync(&PollOptions::default(), &aggregator).await;
    assert_eq!(second.statistics.newly_synced, 0);
    assert_eq!(second.statistics.updated, 1);
    assert_eq!(second.statistics.already_synced, 1);

    // Still exactly one order row, not two.
    let order = h
        .store
        .find_order_by_reference(&order_sync::models::OrderReference::new("2002"))
        .await
        .unwrap();
    assert!(order.is_some());
}

#[tokio::test]
async fn dry_run_reports_without_writing() {
    let h = harness(vec![FetchPage {
        orders: vec![order_fixture("3003", dec!(75.00), "WIDGET-1")],
        end_cursor: None,
        has_next: false,
    }]);
    let aggregator = ErrorAggregator::new();

    let opts = PollOptions {
        dry_run: true,
        ..Default::default()
    };
    let result = h.poller.poll_and_sync(&opts, &aggregator).await;

    assert_eq!(result.status, CycleStatus::DryRun);
    assert_eq!(result.new_order_ids, vec!["SHOPIFY-3003".to_string()]);

    let order = h
        .store
        .find_order_by_reference(&order_sync::models::OrderReference::new("3003"))
        .await
        .unwrap();
    assert!(order.is_none(), "dry run must not write anything");
}

#[tokio::test]
async fn batch_size_zero_short_circuits_without_fetching() {
    let h = harness(vec![FetchPage {
        orders: vec![order_fixture("4004", dec!(10.00), "WIDGET-1")],
        end_cursor: None,
        has_next: false,
    }]);
    let aggregator = ErrorAggregator::new();

    let opts = PollOptions {
        batch_size: 0,
        ..Default::default()
    };
    let result = h.poller.poll_and_sync(&opts, &aggregator).await;

    assert_eq!(result.status, CycleStatus::Success);
    assert_eq!(result.statistics.total_polled, 0);
}

#[tokio::test]
async fn max_pages_one_stops_pagination() {
    let h = harness(vec![
        FetchPage {
            orders: vec![order_fixture("5001", dec!(10.00), "WIDGET-1")],
            end_cursor: Some("cursor-1".to_string()),
            has_next: true,
        },
        FetchPage {
            orders: vec![order_fixture("5002", dec!(10.00), "WIDGET-1")],
            end_cursor: None,
            has_next: false,
        },
    ]);
    let aggregator = ErrorAggregator::new();

    let opts = PollOptions {
        max_pages: 1,
        ..Default::default()
    };
    let result = h.poller.poll_and_sync(&opts, &aggregator).await;

    assert_eq!(result.statistics.total_polled, 1);
    assert_eq!(result.statistics.newly_synced, 1);
}

/// Two duplicate-reference orders returned on the same page (e.g. the
/// storefront re-sent the same order across a cursor boundary): the first
/// occurrence creates, the second sees it already exists and updates.
#[tokio::test]
async fn duplicate_reference_within_one_page_creates_then_updates() {
    let h = harness(vec![FetchPage {
        orders: vec![
            order_fixture("6006", dec!(20.00), "WIDGET-1"),
            order_fixture("6006", dec!(20.00), "WIDGET-1"),
        ],
        end_cursor: None,
        has_next: false,
    }]);
    let aggregator = ErrorAggregator::new();

    let result = h.poller.poll_and_sync(&PollOptions::default(), &aggregator).await;

    assert_eq!(result.statistics.total_polled, 2);
    assert_eq!(result.statistics.newly_synced, 1);
    assert_eq!(result.statistics.updated, 1);
}

#[tokio::test]
async fn unresolved_sku_is_recorded_as_warning_not_fatal() {
    let h = harness(vec![FetchPage {
        orders: vec![order_fixture("7007", dec!(30.00), "UNKNOWN-SKU")],
        end_cursor: None,
        has_next: false,
    }]);
    let aggregator = ErrorAggregator::new();

    let result = h.poller.poll_and_sync(&PollOptions::default(), &aggregator).await;

    assert_eq!(result.statistics.sync_errors, 0);
    assert_eq!(result.statistics.newly_synced, 1);
    assert_eq!(aggregator.summary().warning_count, 1);
}

#[tokio::test]
async fn gateway_failure_is_recorded_and_cycle_reports_error() {
    let gateway = Arc::new(MockStorefrontGateway::new(vec![]));
    *gateway.fail_next.lock() = Some(order_sync::error::SyncError::StorefrontConnection("unreachable".into()));
    let store = Arc::new(InMemoryRmsStore::new());
    let resolver = CustomerResolver::new(
        store.clone(),
        CustomerResolverConfig {
            allow_guest_orders: true,
            require_customer_email: false,
            default_guest_customer_id: None,
        },
    );
    let poller = OrderPoller::new(
        gateway,
        store,
        Arc::new(RetryExecutor::new(
            "storefront-test",
            order_sync::retry::RetryPolicy {
                max_attempts: 1,
                base_delay: std::time::Duration::from_millis(1),
                max_delay: std::time::Duration::from_millis(1),
                exponential_base: 2.0,
                jitter: false,
                op_timeout: std::time::Duration::from_secs(5),
            },
            None,
        )),
        Arc::new(RetryExecutor::rms()),
        Arc::new(RetryExecutor::sync()),
        OrderConverter::new(STORE_ID, SHIPPING_ITEM_ID),
        resolver,
    );
    let aggregator = ErrorAggregator::new();

    let result = poller.poll_and_sync(&PollOptions::default(), &aggregator).await;

    assert_eq!(result.status, CycleStatus::Error);
    assert!(result.error.is_some());
}

#[tokio::test]
async fn orchestrator_single_flights_concurrent_calls() {
    let h = harness(vec![
        FetchPage { orders: vec![], end_cursor: None, has_next: false },
        FetchPage { orders: vec![], end_cursor: None, has_next: false },
    ]);
    let orch = Arc::new(PollingOrchestrator::new(h.poller));

    let a = orch.clone();
    let b = orch.clone();
    let (ra, rb) = tokio::join!(
        a.poll_and_sync(PollOptions::default()),
        b.poll_and_sync(PollOptions::default())
    );

    assert_eq!(ra.status, "success");
    assert_eq!(rb.status, "success");

    let stats = orch.statistics();
    assert_eq!(stats.total_polled, 0);
}

#[tokio::test]
async fn statistics_reset_clears_cumulative_counters_and_errors() {
    let h = harness(vec![FetchPage {
        orders: vec![order_fixture("8008", dec!(15.00), "WIDGET-1")],
        end_cursor: None,
        has_next: false,
    }]);
    let orch = PollingOrchestrator::new(h.poller);

    orch.poll_and_sync(PollOptions::default()).await;
    assert_eq!(orch.statistics().newly_synced, 1);

    orch.reset_statistics();
    let stats = orch.statistics();
    assert_eq!(stats.newly_synced, 0);
    assert_eq!(stats.error_summary.error_count, 0);
}


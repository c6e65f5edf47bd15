//! Pure storefront → RMS conversion (§4.6). No I/O: the SKU resolver and
//! customer id are supplied by the caller, already resolved.

use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::error::SyncError;
use crate::models::rms::{CHANNEL_TYPE_STOREFRONT, ORDER_TYPE_SALE};
use crate::models::{
    FinancialStatus, Money, OrderEntry, OrderHeader, OrderReference, StorefrontOrder,
    TransactionKind, TransactionStatus,
};

/// Resolved once per order before conversion: SKU -> RMS item id.
pub type SkuResolution = HashMap<String, i64>;

pub struct ConversionOutcome {
    pub header: OrderHeader,
    pub entries: Vec<OrderEntry>,
    /// Per-line SKUs that had no resolved item id — recorded as warnings by
    /// the caller, never fatal.
    pub unresolved_skus: Vec<String>,
}

pub struct OrderConverter {
    pub store_id: i32,
    pub shipping_item_id: i64,
}

impl OrderConverter {
    pub fn new(store_id: i32, shipping_item_id: i64) -> Self {
        OrderConverter {
            store_id,
            shipping_item_id,
        }
    }

    /// Converts one storefront order into an RMS header + entries.
    /// `existing_order_id` is `None` on first sync (header carries no FK
    /// yet); entries always carry `order_id = 0` placeholder until the
    /// writer assigns the real id on create, or the real id directly on
    /// update (the caller passes it in when known).
    pub fn convert(
        &self,
        order: &StorefrontOrder,
        customer_id: Option<i64>,
        order_id_for_entries: i64,
        sku_resolution: &SkuResolution,
    ) -> Result<ConversionOutcome, SyncError> {
        let legacy_id = order.extract_legacy_id().ok_or_else(|| SyncError::Conversion {
            reference: order.name.clone(),
            reason: "could not extract a legacy id from externalId, legacyId, or name".to_string(),
        })?;
        let reference_number = OrderReference::new(&legacy_id);

        let shipping_charge = order
            .shipping_line
            .as_ref()
            .map(|s| s.discounted_price)
            .unwrap_or(Money::ZERO);

        let deposit = Self::compute_deposit(order.financial_status, &order.totals.total, &order.transactions);

        let header = OrderHeader {
            store_id: self.store_id,
            time: order.created_at,
            order_type: ORDER_TYPE_SALE,
            customer_id,
            total: order.totals.total,
            tax: order.totals.tax,
            deposit,
            shipping_charge_on_order: shipping_charge,
            reference_number: reference_number.clone(),
            channel_type: CHANNEL_TYPE_STOREFRONT,
            closed: 0,
            customer_email_cache: order.customer.as_ref().and_then(|c| c.email.clone()),
            storefront_order_number: order.name.clone(),
        };
        header.validate()?;

        let mut entries = Vec::with_capacity(order.line_items.len() + 1);
        let mut unresolved_skus = Vec::new();

        for line in &order.line_items {
            let Some(sku) = &line.sku else {
                unresolved_skus.push(line.external_id.clone());
                continue;
            };
            let Some(item_id) = sku_resolution.get(sku).copied() else {
                unresolved_skus.push(sku.clone());
                continue;
            };
            entries.push(OrderEntry {
                id: None,
                order_id: order_id_for_entries,
                item_id,
                price: line.unit_price_discounted,
                full_price: line.unit_price_original,
                cost: None,
                quantity_on_order: Decimal::from(line.quantity),
                quantity_rtd: Decimal::ZERO,
                taxable: if line.taxable { 1 } else { 0 },
                description: line.title.clone(),
                sales_rep_id: 0,
                discount_reason_code_id: 0,
                return_reason_code_id: 0,
                is_add_money: false,
                voucher_id: 0,
                comment: None,
                price_source: 0,
            });
        }

        if shipping_charge.is_positive() {
            entries.push(OrderEntry::shipping(
                order_id_for_entries,
                self.shipping_item_id,
                shipping_charge,
            ));
        }

        Ok(ConversionOutcome {
            header,
            entries,
            unresolved_skus,
        })
    }

    /// Rule 8 (§4.6): a pure function of `(financialStatus, transactions)`.
    /// Test transactions never count. Result is clamped to `>= 0`.
    pub fn compute_deposit(
        status: FinancialStatus,
        total: &Money,
        transactions: &[crate::models::OrderTransaction],
    ) -> Money {
        let deposit = match status {
            FinancialStatus::Paid => *total,
            FinancialStatus::PartiallyPaid | FinancialStatus::PartiallyRefunded => {
                let collected: Decimal = transactions
                    .iter()
                    .filter(|t| {
                        !t.test
                            && t.status == TransactionStatus::Success
                            && matches!(t.kind, TransactionKind::Sale | TransactionKind::Capture)
                    })
                    .map(|t| t.amount.as_decimal())
                    .sum();
                let refunded: Decimal = transactions
                    .iter()
                    .filter(|t| {
                        !t.test && t.status == TransactionStatus::Success && t.kind == TransactionKind::Refund
                    })
                    .map(|t| t.amount.as_decimal())
                    .sum();
                Money::new(collected - refunded)
            }
            FinancialStatus::Pending | FinancialStatus::Authorized | FinancialStatus::Voided => Money::ZERO,
            FinancialStatus::Refunded => Money::ZERO,
        };

        if deposit.as_decimal() < Decimal::ZERO {
            Money::ZERO
        } else {
            deposit
        }
    }
}

//! RMS row types: the shapes `RmsStore` reads and writes. Field names track
//! the RMS column names directly (`PascalCase` concepts rendered as
//! idiomatic Rust struct fields) since these are a near 1:1 mirror of the
//! underlying table.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::money::Money;

pub const CHANNEL_TYPE_STOREFRONT: i32 = 2;
pub const ORDER_TYPE_SALE: i32 = 1;

/// The stable cross-system key: `"SHOPIFY-" + legacyId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderReference(String);

impl OrderReference {
    const PREFIX: &'static str = "SHOPIFY-";

    pub fn new(legacy_id: &str) -> Self {
        OrderReference(format!("{}{}", Self::PREFIX, legacy_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses an existing reference string, validating the prefix invariant.
    pub fn parse(raw: &str) -> Result<Self, crate::error::SyncError> {
        if !raw.starts_with(Self::PREFIX) {
            return Err(crate::error::SyncError::InvalidOrderData(format!(
                "reference number {raw:?} missing required {:?} prefix",
                Self::PREFIX
            )));
        }
        Ok(OrderReference(raw.to_string()))
    }
}

impl fmt::Display for OrderReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderHeader {
    pub store_id: i32,
    pub time: DateTime<Utc>,
    pub order_type: i32,
    pub customer_id: Option<i64>,
    pub total: Money,
    pub tax: Money,
    pub deposit: Money,
    pub shipping_charge_on_order: Money,
    pub reference_number: OrderReference,
    pub channel_type: i32,
    pub closed: i32,
    pub customer_email_cache: Option<String>,
    pub storefront_order_number: String,
}

impl OrderHeader {
    /// The defensive validation rules from the converter (§4.6): these are
    /// non-retryable — a malformed header indicates a converter bug, not a
    /// transient failure, so callers must not retry on this error.
    pub fn validate(&self) -> Result<(), crate::error::SyncError> {
        if !self.reference_number.as_str().starts_with("SHOPIFY-") {
            return Err(crate::error::SyncError::InvalidOrderData(
                "reference number must start with SHOPIFY-".into(),
            ));
        }
        if self.channel_type != CHANNEL_TYPE_STOREFRONT {
            return Err(crate::error::SyncError::InvalidOrderData(format!(
                "channelType must be {CHANNEL_TYPE_STOREFRONT}"
            )));
        }
        if self.total.as_decimal() < Decimal::ZERO {
            return Err(crate::error::SyncError::InvalidOrderData(
                "total must be >= 0".into(),
            ));
        }
        if self.tax.as_decimal() < Decimal::ZERO {
            return Err(crate::error::SyncError::InvalidOrderData(
                "tax must be >= 0".into(),
            ));
        }
        if self.deposit.as_decimal() < Decimal::ZERO {
            return Err(crate::error::SyncError::InvalidOrderData(
                "deposit must be >= 0".into(),
            ));
        }
        Ok(())
    }
}

/// Patch applied to an existing header on the update path. All fields that
/// may legitimately change on re-sync; `closed` is deliberately absent —
/// this pipeline never flips it.
#[derive(Debug, Clone)]
pub struct OrderHeaderPatch {
    pub total: Money,
    pub tax: Money,
    pub deposit: Money,
    pub shipping_charge_on_order: Money,
    pub customer_id: Option<i64>,
    pub customer_email_cache: Option<String>,
}

impl From<&OrderHeader> for OrderHeaderPatch {
    fn from(h: &OrderHeader) -> Self {
        OrderHeaderPatch {
            total: h.total,
            tax: h.tax,
            deposit: h.deposit,
            shipping_charge_on_order: h.shipping_charge_on_order,
            customer_id: h.customer_id,
            customer_email_cache: h.customer_email_cache.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEntry {
    pub id: Option<i64>,
    pub order_id: i64,
    pub item_id: i64,
    pub price: Money,
    pub full_price: Money,
    pub cost: Option<Money>,
    pub quantity_on_order: Decimal,
    pub quantity_rtd: Decimal,
    pub taxable: i32,
    pub description: String,
    pub sales_rep_id: i32,
    pub discount_reason_code_id: i32,
    pub return_reason_code_id: i32,
    pub is_add_money: bool,
    pub voucher_id: i32,
    pub comment: Option<String>,
    pub price_source: i32,
}

impl OrderEntry {
    pub fn shipping(order_id: i64, shipping_item_id: i64, charge: Money) -> Self {
        OrderEntry {
            id: None,
            order_id,
            item_id: shipping_item_id,
            price: charge,
            full_price: charge,
            cost: None,
            quantity_on_order: Decimal::ONE,
            quantity_rtd: Decimal::ZERO,
            taxable: 1,
            description: "Shipping".to_string(),
            sales_rep_id: 0,
            discount_reason_code_id: 0,
            return_reason_code_id: 0,
            is_add_money: false,
            voucher_id: 0,
            comment: Some("Shipping Item".to_string()),
            price_source: 10,
        }
    }

    /// The shipping-removed-after-first-sync rewrite: zero out price and
    /// quantities but keep cost, description, and ops codes (§4.8.3.c).
    pub fn zeroed_shipping_patch(existing: &OrderEntry) -> OrderEntryPatch {
        OrderEntryPatch {
            price: Money::ZERO,
            full_price: Money::ZERO,
            cost: existing.cost,
            quantity_on_order: Decimal::ZERO,
            quantity_rtd: Decimal::ZERO,
            description: existing.description.clone(),
            taxable: existing.taxable,
            sales_rep_id: existing.sales_rep_id,
            discount_reason_code_id: existing.discount_reason_code_id,
            return_reason_code_id: existing.return_reason_code_id,
            is_add_money: existing.is_add_money,
            voucher_id: existing.voucher_id,
            comment: existing.comment.clone(),
            price_source: existing.price_source,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderEntryPatch {
    pub price: Money,
    pub full_price: Money,
    pub cost: Option<Money>,
    pub quantity_on_order: Decimal,
    pub quantity_rtd: Decimal,
    pub description: String,
    pub taxable: i32,
    pub sales_rep_id: i32,
    pub discount_reason_code_id: i32,
    pub return_reason_code_id: i32,
    pub is_add_money: bool,
    pub voucher_id: i32,
    pub comment: Option<String>,
    pub price_source: i32,
}

impl From<&OrderEntry> for OrderEntryPatch {
    fn from(e: &OrderEntry) -> Self {
        OrderEntryPatch {
            price: e.price,
            full_price: e.full_price,
            cost: e.cost,
            quantity_on_order: e.quantity_on_order,
            quantity_rtd: e.quantity_rtd,
            description: e.description.clone(),
            taxable: e.taxable,
            sales_rep_id: e.sales_rep_id,
            discount_reason_code_id: e.discount_reason_code_id,
            return_reason_code_id: e.return_reason_code_id,
            is_add_money: e.is_add_money,
            voucher_id: e.voucher_id,
            comment: e.comment.clone(),
            price_source: e.price_source,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderHistory {
    pub order_id: i64,
    pub date: DateTime<Utc>,
    pub delta_deposit: Money,
    pub transaction_number: i64,
    pub comment: String,
    pub store_id: i32,
    pub batch_id: i32,
    pub cashier_id: i32,
}

impl OrderHistory {
    /// No external transaction numbering exists for an integration-written
    /// row, so `transaction_number`/`batch_id`/`cashier_id` carry the same
    /// domain defaults as an `OrderEntry`'s ops codes.
    pub fn on_create(order_id: i64, store_id: i32, deposit: Money, at: DateTime<Utc>) -> Self {
        OrderHistory {
            order_id,
            date: at,
            delta_deposit: deposit,
            transaction_number: 0,
            comment: "order created via storefront sync".to_string(),
            store_id,
            batch_id: 0,
            cashier_id: 0,
        }
    }

    pub fn on_update(order_id: i64, store_id: i32, delta_deposit: Money, at: DateTime<Utc>) -> Self {
        OrderHistory {
            order_id,
            date: at,
            delta_deposit,
            transaction_number: 0,
            comment: "order updated via storefront sync".to_string(),
            store_id,
            batch_id: 0,
            cashier_id: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub id: i64,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub address1: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub address1: Option<String>,
    pub city: Option<String>,
}

/// What `OrderWriter::upsert` actually did, surfaced to the poller for
/// statistics tallying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteAction {
    Created {
        id: i64,
    },
    Updated {
        id: i64,
        entries_updated: u32,
        entries_created: u32,
        entries_deleted: u32,
    },
}

impl WriteAction {
    pub fn id(&self) -> i64 {
        match self {
            WriteAction::Created { id } => *id,
            WriteAction::Updated { id, .. } => *id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_requires_prefix() {
        assert!(OrderReference::parse("SHOPIFY-123").is_ok());
        assert!(OrderReference::parse("123").is_err());
    }

    #[test]
    fn reference_new_always_prefixes() {
        let r = OrderReference::new("999");
        assert_eq!(r.as_str(), "SHOPIFY-999");
    }
}

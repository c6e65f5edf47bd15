//! DTOs describing the shape returned by the storefront gateway. These are
//! intentionally flat records rather than `serde_json::Value` grab-bags —
//! the converter only ever touches the named fields below.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinancialStatus {
    Pending,
    Authorized,
    PartiallyPaid,
    Paid,
    PartiallyRefunded,
    Refunded,
    Voided,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FulfillmentStatus {
    Unfulfilled,
    PartiallyFulfilled,
    Fulfilled,
    Restocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Authorization,
    Sale,
    Capture,
    Refund,
    Void,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Success,
    Pending,
    Failure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderTotals {
    pub total: Money,
    pub subtotal: Money,
    pub tax: Money,
    pub shipping: Money,
    pub discounts: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorefrontCustomer {
    pub id: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorefrontAddress {
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub country: Option<String>,
    pub zip: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub external_id: String,
    pub title: String,
    pub sku: Option<String>,
    pub quantity: i64,
    pub taxable: bool,
    pub unit_price_original: Money,
    pub unit_price_discounted: Money,
    pub variant_id: Option<String>,
    pub product_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingLine {
    pub title: String,
    pub code: Option<String>,
    pub discounted_price: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderTransaction {
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub test: bool,
    pub amount: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorefrontOrder {
    pub external_id: String,
    pub legacy_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub financial_status: FinancialStatus,
    pub fulfillment_status: Option<FulfillmentStatus>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub test: bool,
    pub totals: OrderTotals,
    pub customer: Option<StorefrontCustomer>,
    pub billing_address: Option<StorefrontAddress>,
    pub shipping_address: Option<StorefrontAddress>,
    pub line_items: Vec<LineItem>,
    pub shipping_line: Option<ShippingLine>,
    pub transactions: Vec<OrderTransaction>,
}

impl StorefrontOrder {
    /// Extracts the numeric legacy id: prefers `legacyId`, then the digits
    /// at the end of the GID, then `name` with the leading `#` stripped.
    pub fn extract_legacy_id(&self) -> Option<String> {
        if !self.legacy_id.is_empty() {
            return Some(self.legacy_id.clone());
        }
        if let Some(digits) = self.external_id.rsplit('/').next() {
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                return Some(digits.to_string());
            }
        }
        let trimmed = self.name.trim_start_matches('#');
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
        None
    }
}

/// Structured predicate passed to `fetchRecentOrders`.
#[derive(Debug, Clone)]
pub struct OrderFilter {
    pub updated_at_min: DateTime<Utc>,
    pub financial_statuses: Option<Vec<FinancialStatus>>,
    pub fulfillment_statuses: Option<Vec<FulfillmentStatus>>,
    pub include_test_orders: bool,
}

#[derive(Debug, Clone)]
pub struct FetchPage {
    pub orders: Vec<StorefrontOrder>,
    pub end_cursor: Option<String>,
    pub has_next: bool,
}

//! Environment-driven configuration, loaded once at startup (§6's
//! configuration surface).

use serde::Deserialize;
use std::time::Duration;

use crate::error::SyncError;
use crate::models::FinancialStatus;
use crate::services::customer_resolver::CustomerResolverConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub database_max_connections: u32,

    pub storefront_base_url: String,
    pub storefront_api_token: String,

    /// `ORDER_POLLING_INTERVAL_MINUTES`: used only by the background
    /// scheduler loop, not by the core poller itself.
    #[serde(default = "default_poll_interval_minutes")]
    pub order_polling_interval_minutes: u64,
    /// `ORDER_POLLING_BATCH_SIZE`, clamped to <= 250 by `batch_size()`.
    #[serde(default = "default_batch_size")]
    pub order_polling_batch_size: u32,
    #[serde(default = "default_max_pages")]
    pub order_polling_max_pages: u32,
    #[serde(default = "default_lookback_minutes")]
    pub order_polling_lookback_minutes: i64,
    #[serde(default = "default_enable_order_polling")]
    pub enable_order_polling: bool,

    /// `ALLOWED_ORDER_FINANCIAL_STATUSES`, comma-separated
    /// (e.g. `PAID,PARTIALLY_PAID,PARTIALLY_REFUNDED`). Empty means "no
    /// financial-status filter" rather than "reject everything".
    #[serde(default)]
    pub allowed_order_financial_statuses: String,

    #[serde(default)]
    pub allow_orders_without_customer: bool,
    #[serde(default)]
    pub require_customer_email: bool,
    pub default_customer_id_for_guest_orders: Option<i64>,

    #[serde(default = "default_shipping_item_id")]
    pub shipping_item_id: i64,
    #[serde(default = "default_store_id")]
    pub rms_store_id: i32,

    #[serde(default = "default_http_port")]
    pub http_port: u16,

    #[serde(default)]
    pub dry_run: bool,
}

fn default_db_max_connections() -> u32 {
    10
}
fn default_poll_interval_minutes() -> u64 {
    10
}
fn default_batch_size() -> u32 {
    50
}
fn default_max_pages() -> u32 {
    10
}
fn default_lookback_minutes() -> i64 {
    15
}
fn default_enable_order_polling() -> bool {
    true
}
fn default_shipping_item_id() -> i64 {
    9999
}
fn default_store_id() -> i32 {
    40
}
fn default_http_port() -> u16 {
    8080
}

impl AppConfig {
    /// Loads configuration from environment variables (with an optional
    /// `.env` file already merged in by the caller), using `ORDER_SYNC_`
    /// as the variable prefix.
    pub fn load() -> Result<Self, SyncError> {
        let cfg = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("ORDER_SYNC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| SyncError::Configuration(e.to_string()))?;

        cfg.try_deserialize()
            .map_err(|e| SyncError::Configuration(e.to_string()))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.order_polling_interval_minutes * 60)
    }

    /// Clamped to 250 per spec.md §4.4's page-size ceiling.
    pub fn batch_size(&self) -> u32 {
        self.order_polling_batch_size.min(250)
    }

    pub fn allowed_financial_statuses(&self) -> Option<Vec<FinancialStatus>> {
        if self.allowed_order_financial_statuses.trim().is_empty() {
            return None;
        }
        let statuses: Vec<FinancialStatus> = self
            .allowed_order_financial_statuses
            .split(',')
            .filter_map(|raw| parse_financial_status(raw.trim()))
            .collect();
        if statuses.is_empty() {
            None
        } else {
            Some(statuses)
        }
    }

    pub fn customer_resolver_config(&self) -> CustomerResolverConfig {
        CustomerResolverConfig {
            allow_guest_orders: self.allow_orders_without_customer,
            require_customer_email: self.require_customer_email,
            default_guest_customer_id: self.default_customer_id_for_guest_orders,
        }
    }
}

fn parse_financial_status(raw: &str) -> Option<FinancialStatus> {
    match raw.to_ascii_uppercase().as_str() {
        "PENDING" => Some(FinancialStatus::Pending),
        "AUTHORIZED" => Some(FinancialStatus::Authorized),
        "PARTIALLY_PAID" => Some(FinancialStatus::PartiallyPaid),
        "PAID" => Some(FinancialStatus::Paid),
        "PARTIALLY_REFUNDED" => Some(FinancialStatus::PartiallyRefunded),
        "REFUNDED" => Some(FinancialStatus::Refunded),
        "VOIDED" => Some(FinancialStatus::Voided),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> AppConfig {
        AppConfig {
            database_url: "postgres://localhost/rms".to_string(),
            database_max_connections: 10,
            storefront_base_url: "https://example.myshopify.com".to_string(),
            storefront_api_token: "token".to_string(),
            order_polling_interval_minutes: 10,
            order_polling_batch_size: 500,
            order_polling_max_pages: 10,
            order_polling_lookback_minutes: 15,
            enable_order_polling: true,
            allowed_order_financial_statuses: "PAID,PARTIALLY_PAID".to_string(),
            allow_orders_without_customer: false,
            require_customer_email: false,
            default_customer_id_for_guest_orders: None,
            shipping_item_id: 9999,
            rms_store_id: 40,
            http_port: 8080,
            dry_run: false,
        }
    }

    #[test]
    fn batch_size_is_clamped_to_250() {
        assert_eq!(base().batch_size(), 250);
    }

    #[test]
    fn allowed_statuses_parses_comma_separated_list() {
        let statuses = base().allowed_financial_statuses().unwrap();
        assert_eq!(statuses, vec![FinancialStatus::Paid, FinancialStatus::PartiallyPaid]);
    }

    #[test]
    fn empty_allowed_statuses_means_no_filter() {
        let mut cfg = base();
        cfg.allowed_order_financial_statuses = String::new();
        assert!(cfg.allowed_financial_statuses().is_none());
    }
}

//! The storefront gateway contract (§4.4). The core depends only on this
//! trait; a real implementation lives in `reqwest_client`, and tests use
//! `mock`.

pub mod mock;
pub mod reqwest_client;

use async_trait::async_trait;

use crate::error::SyncError;
use crate::models::{FetchPage, OrderFilter, StorefrontOrder};

#[async_trait]
pub trait StorefrontGateway: Send + Sync {
    /// Fetches one page of orders matching `filter`, sorted by `updatedAt`
    /// descending. `page_size` must be clamped to 250 by the caller.
    async fn fetch_recent_orders(
        &self,
        filter: &OrderFilter,
        page_size: u32,
        cursor: Option<&str>,
    ) -> Result<FetchPage, SyncError>;

    async fn fetch_order_by_id(&self, external_id: &str) -> Result<Option<StorefrontOrder>, SyncError>;
}

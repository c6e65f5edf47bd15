//! In-memory gateway used by unit and scenario tests.

use async_trait::async_trait;
use parking_lot::Mutex;

use super::StorefrontGateway;
use crate::error::SyncError;
use crate::models::{FetchPage, OrderFilter, StorefrontOrder};

pub struct MockStorefrontGateway {
    pages: Mutex<Vec<FetchPage>>,
    by_id: Mutex<Vec<StorefrontOrder>>,
    pub fail_next: Mutex<Option<SyncError>>,
}

impl MockStorefrontGateway {
    pub fn new(orders: Vec<StorefrontOrder>) -> Self {
        MockStorefrontGateway {
            pages: Mutex::new(vec![FetchPage {
                orders,
                end_cursor: None,
                has_next: false,
            }]),
            by_id: Mutex::new(Vec::new()),
            fail_next: Mutex::new(None),
        }
    }

    pub fn with_pages(pages: Vec<FetchPage>) -> Self {
        MockStorefrontGateway {
            pages: Mutex::new(pages),
            by_id: Mutex::new(Vec::new()),
            fail_next: Mutex::new(None),
        }
    }
}

#[async_trait]
impl StorefrontGateway for MockStorefrontGateway {
    async fn fetch_recent_orders(
        &self,
        _filter: &OrderFilter,
        _page_size: u32,
        _cursor: Option<&str>,
    ) -> Result<FetchPage, SyncError> {
        if let Some(err) = self.fail_next.lock().take() {
            return Err(err);
        }
        let mut pages = self.pages.lock();
        if pages.is_empty() {
            return Ok(FetchPage {
                orders: vec![],
                end_cursor: None,
                has_next: false,
            });
        }
        Ok(pages.remove(0))
    }

    async fn fetch_order_by_id(&self, external_id: &str) -> Result<Option<StorefrontOrder>, SyncError> {
        Ok(self
            .by_id
            .lock()
            .iter()
            .find(|o| o.external_id == external_id)
            .cloned())
    }
}

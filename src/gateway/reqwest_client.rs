//! `reqwest`-backed implementation of [`StorefrontGateway`]. Encodes the
//! filter as the storefront's native query syntax and maps HTTP/transport
//! failures into [`SyncError`] variants the `RetryExecutor` can classify.

use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::instrument;

use super::StorefrontGateway;
use crate::error::SyncError;
use crate::models::{FetchPage, OrderFilter, StorefrontOrder};

pub struct ReqwestStorefrontGateway {
    client: Client,
    base_url: String,
    api_token: String,
}

impl ReqwestStorefrontGateway {
    pub fn new(client: Client, base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        ReqwestStorefrontGateway {
            client,
            base_url: base_url.into(),
            api_token: api_token.into(),
        }
    }

    /// Per the verified contract in spec §4.4: the remote service rejects
    /// compact offsets, so the cutoff must be serialized with a
    /// colon-separated timezone offset (`+00:00`, not `+0000`).
    fn serialize_cutoff(filter: &OrderFilter) -> String {
        filter
            .updated_at_min
            .to_rfc3339_opts(SecondsFormat::Secs, false)
    }

    fn build_query(&self, filter: &OrderFilter, page_size: u32, cursor: Option<&str>) -> Vec<(String, String)> {
        let mut params = vec![
            ("updated_at_min".to_string(), Self::serialize_cutoff(filter)),
            ("limit".to_string(), page_size.min(250).to_string()),
            ("test".to_string(), filter.include_test_orders.to_string()),
        ];
        if let Some(cursor) = cursor {
            params.push(("page_info".to_string(), cursor.to_string()));
        }
        if let Some(statuses) = &filter.financial_statuses {
            let joined = statuses
                .iter()
                .map(|s| format!("{s:?}"))
                .collect::<Vec<_>>()
                .join(",");
            params.push(("financial_status".to_string(), joined));
        }
        if let Some(statuses) = &filter.fulfillment_statuses {
            let joined = statuses
                .iter()
                .map(|s| format!("{s:?}"))
                .collect::<Vec<_>>()
                .join(",");
            params.push(("fulfillment_status".to_string(), joined));
        }
        params
    }

    async fn classify_response_error(resp: reqwest::Response) -> SyncError {
        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5);
            return SyncError::RateLimited {
                retry_after_secs: retry_after,
            };
        }
        let message = resp
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        crate::error::classify_storefront_status(status.as_u16(), message)
    }
}

#[derive(Debug, Deserialize)]
struct OrdersResponse {
    orders: Vec<StorefrontOrder>,
    end_cursor: Option<String>,
    has_next: bool,
}

#[async_trait]
impl StorefrontGateway for ReqwestStorefrontGateway {
    #[instrument(skip(self, filter))]
    async fn fetch_recent_orders(
        &self,
        filter: &OrderFilter,
        page_size: u32,
        cursor: Option<&str>,
    ) -> Result<FetchPage, SyncError> {
        let url = format!("{}/orders.json", self.base_url);
        let query = self.build_query(filter, page_size, cursor);

        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .query(&query)
            .send()
            .await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(SyncError::StorefrontUnauthorized("unauthorized".to_string()));
        }
        if !resp.status().is_success() {
            return Err(Self::classify_response_error(resp).await);
        }

        let body: OrdersResponse = resp.json().await?;
        Ok(FetchPage {
            orders: body.orders,
            end_cursor: body.end_cursor,
            has_next: body.has_next,
        })
    }

    #[instrument(skip(self))]
    async fn fetch_order_by_id(&self, external_id: &str) -> Result<Option<StorefrontOrder>, SyncError> {
        let url = format!("{}/orders/{}.json", self.base_url, external_id);
        let resp = self.client.get(&url).bearer_auth(&self.api_token).send().await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(Self::classify_response_error(resp).await);
        }

        #[derive(Deserialize)]
        struct Envelope {
            order: StorefrontOrder,
        }
        let envelope: Envelope = resp.json().await?;
        Ok(Some(envelope.order))
    }
}

//! The RMS store contract (§4.5): session-scoped transactional operations.
//! `postgres` is the production `sqlx` implementation; `memory` backs unit
//! and scenario tests without a database.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::SyncError;
use crate::models::{
    CustomerRecord, Money, NewCustomer, OrderEntry, OrderEntryPatch, OrderHeader, OrderHeaderPatch,
    OrderHistory, OrderReference,
};

/// An explicit transactional session. Implementations must guarantee commit
/// or rollback on every exit path — the writer never touches the connection
/// directly. `as_any_mut` lets each `RmsStore` impl safely recover its own
/// concrete session type (`PgSession`, `MemorySession`, …) from the trait
/// object the writer passes around.
#[async_trait]
pub trait Session: Send {
    async fn commit(self: Box<Self>) -> Result<(), SyncError>;
    async fn rollback(self: Box<Self>) -> Result<(), SyncError>;
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

#[derive(Debug, Clone)]
pub struct OrderRow {
    pub id: i64,
    pub reference_number: OrderReference,
    pub deposit: Money,
}

#[async_trait]
pub trait RmsStore: Send + Sync {
    async fn begin_session(&self) -> Result<Box<dyn Session>, SyncError>;

    async fn find_order_by_reference(&self, reference: &OrderReference) -> Result<Option<OrderRow>, SyncError>;

    /// Performed outside any transaction, per spec §4.5.
    async fn batch_check_order_existence(
        &self,
        references: &[OrderReference],
    ) -> Result<HashMap<OrderReference, bool>, SyncError>;

    async fn create_order(&self, header: &OrderHeader, session: &mut dyn Session) -> Result<i64, SyncError>;
    async fn update_order(
        &self,
        id: i64,
        patch: &OrderHeaderPatch,
        session: &mut dyn Session,
    ) -> Result<(), SyncError>;

    async fn list_order_entries(&self, order_id: i64, session: &mut dyn Session) -> Result<Vec<OrderEntry>, SyncError>;
    async fn create_order_entry(&self, entry: &OrderEntry, session: &mut dyn Session) -> Result<i64, SyncError>;
    async fn update_order_entry(
        &self,
        id: i64,
        patch: &OrderEntryPatch,
        session: &mut dyn Session,
    ) -> Result<(), SyncError>;
    async fn delete_order_entry(&self, id: i64, session: &mut dyn Session) -> Result<(), SyncError>;

    /// Appends an audit row in the same transaction as the header/entry
    /// writes it accompanies (§1/§3 — `OrderHistory`).
    async fn create_order_history(&self, history: &OrderHistory, session: &mut dyn Session) -> Result<(), SyncError>;

    async fn find_customer_by_email(&self, email: &str) -> Result<Option<CustomerRecord>, SyncError>;
    async fn create_customer(&self, fields: &NewCustomer) -> Result<i64, SyncError>;

    async fn resolve_item_id_by_sku(&self, sku: &str) -> Result<Option<i64>, SyncError>;
}

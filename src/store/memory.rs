//! In-memory [`RmsStore`] used by unit and scenario tests — no database
//! required. Each session stages its writes against a private snapshot of
//! the tables and only publishes them on `commit`; `rollback` (or simply
//! dropping the session) discards the snapshot, giving the same
//! atomicity contract as the Postgres implementation's transaction.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use super::{OrderRow, RmsStore, Session};
use crate::error::SyncError;
use crate::models::{
    CustomerRecord, NewCustomer, OrderEntry, OrderEntryPatch, OrderHeader, OrderHeaderPatch,
    OrderHistory, OrderReference,
};

#[derive(Default, Clone)]
struct Tables {
    orders: HashMap<i64, OrderHeader>,
    entries: HashMap<i64, OrderEntry>,
    customers: HashMap<i64, CustomerRecord>,
    skus: HashMap<String, i64>,
    history: Vec<OrderHistory>,
}

pub struct MemorySession {
    store: Arc<Mutex<Tables>>,
    staged: Tables,
}

#[async_trait]
impl Session for MemorySession {
    async fn commit(self: Box<Self>) -> Result<(), SyncError> {
        *self.store.lock() = self.staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), SyncError> {
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

pub struct InMemoryRmsStore {
    tables: Arc<Mutex<Tables>>,
    next_order_id: AtomicI64,
    next_entry_id: AtomicI64,
    next_customer_id: AtomicI64,
}

impl InMemoryRmsStore {
    pub fn new() -> Self {
        InMemoryRmsStore {
            tables: Arc::new(Mutex::new(Tables::default())),
            next_order_id: AtomicI64::new(1),
            next_entry_id: AtomicI64::new(1),
            next_customer_id: AtomicI64::new(1),
        }
    }

    pub fn seed_sku(&self, sku: &str, item_id: i64) {
        self.tables.lock().skus.insert(sku.to_string(), item_id);
    }

    pub fn entries_for(&self, order_id: i64) -> Vec<OrderEntry> {
        self.tables
            .lock()
            .entries
            .values()
            .filter(|e| e.order_id == order_id)
            .cloned()
            .collect()
    }

    pub fn order(&self, order_id: i64) -> Option<OrderHeader> {
        self.tables.lock().orders.get(&order_id).cloned()
    }

    pub fn history_for(&self, order_id: i64) -> Vec<OrderHistory> {
        self.tables
            .lock()
            .history
            .iter()
            .filter(|h| h.order_id == order_id)
            .cloned()
            .collect()
    }

    fn mem<'a>(session: &'a mut dyn Session) -> &'a mut MemorySession {
        session
            .as_any_mut()
            .downcast_mut::<MemorySession>()
            .expect("session passed to InMemoryRmsStore must be a MemorySession")
    }
}

impl Default for InMemoryRmsStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RmsStore for InMemoryRmsStore {
    async fn begin_session(&self) -> Result<Box<dyn Session>, SyncError> {
        let staged = self.tables.lock().clone();
        Ok(Box::new(MemorySession {
            store: self.tables.clone(),
            staged,
        }))
    }

    async fn find_order_by_reference(&self, reference: &OrderReference) -> Result<Option<OrderRow>, SyncError> {
        let tables = self.tables.lock();
        Ok(tables
            .orders
            .iter()
            .find(|(_, h)| h.reference_number == *reference)
            .map(|(id, h)| OrderRow {
                id: *id,
                reference_number: reference.clone(),
                deposit: h.deposit,
            }))
    }

    async fn batch_check_order_existence(
        &self,
        references: &[OrderReference],
    ) -> Result<HashMap<OrderReference, bool>, SyncError> {
        let tables = self.tables.lock();
        let existing: std::collections::HashSet<&OrderReference> =
            tables.orders.values().map(|h| &h.reference_number).collect();
        Ok(references
            .iter()
            .map(|r| (r.clone(), existing.contains(r)))
            .collect())
    }

    async fn create_order(&self, header: &OrderHeader, session: &mut dyn Session) -> Result<i64, SyncError> {
        let id = self.next_order_id.fetch_add(1, Ordering::SeqCst);
        Self::mem(session).staged.orders.insert(id, header.clone());
        Ok(id)
    }

    async fn update_order(
        &self,
        id: i64,
        patch: &OrderHeaderPatch,
        session: &mut dyn Session,
    ) -> Result<(), SyncError> {
        let mem = Self::mem(session);
        let existing = mem
            .staged
            .orders
            .get(&id)
            .cloned()
            .ok_or_else(|| SyncError::RmsQuery(format!("order {id} not found")))?;
        let mut updated = existing;
        updated.total = patch.total;
        updated.tax = patch.tax;
        updated.deposit = patch.deposit;
        updated.shipping_charge_on_order = patch.shipping_charge_on_order;
        updated.customer_id = patch.customer_id;
        updated.customer_email_cache = patch.customer_email_cache.clone();
        mem.staged.orders.insert(id, updated);
        Ok(())
    }

    async fn list_order_entries(&self, order_id: i64, session: &mut dyn Session) -> Result<Vec<OrderEntry>, SyncError> {
        let mem = Self::mem(session);
        Ok(mem
            .staged
            .entries
            .values()
            .filter(|e| e.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn create_order_entry(&self, entry: &OrderEntry, session: &mut dyn Session) -> Result<i64, SyncError> {
        let id = self.next_entry_id.fetch_add(1, Ordering::SeqCst);
        let mut stored = entry.clone();
        stored.id = Some(id);
        Self::mem(session).staged.entries.insert(id, stored);
        Ok(id)
    }

    async fn update_order_entry(
        &self,
        id: i64,
        patch: &OrderEntryPatch,
        session: &mut dyn Session,
    ) -> Result<(), SyncError> {
        let mem = Self::mem(session);
        let mut existing = mem
            .staged
            .entries
            .get(&id)
            .cloned()
            .ok_or_else(|| SyncError::RmsQuery(format!("entry {id} not found")))?;
        existing.price = patch.price;
        existing.full_price = patch.full_price;
        existing.cost = patch.cost;
        existing.quantity_on_order = patch.quantity_on_order;
        existing.quantity_rtd = patch.quantity_rtd;
        existing.description = patch.description.clone();
        existing.taxable = patch.taxable;
        existing.sales_rep_id = patch.sales_rep_id;
        existing.discount_reason_code_id = patch.discount_reason_code_id;
        existing.return_reason_code_id = patch.return_reason_code_id;
        existing.is_add_money = patch.is_add_money;
        existing.voucher_id = patch.voucher_id;
        existing.comment = patch.comment.clone();
        existing.price_source = patch.price_source;
        mem.staged.entries.insert(id, existing);
        Ok(())
    }

    async fn delete_order_entry(&self, id: i64, session: &mut dyn Session) -> Result<(), SyncError> {
        Self::mem(session).staged.entries.remove(&id);
        Ok(())
    }

    async fn create_order_history(&self, history: &OrderHistory, session: &mut dyn Session) -> Result<(), SyncError> {
        Self::mem(session).staged.history.push(history.clone());
        Ok(())
    }

    async fn find_customer_by_email(&self, email: &str) -> Result<Option<CustomerRecord>, SyncError> {
        Ok(self
            .tables
            .lock()
            .customers
            .values()
            .find(|c| c.email == email)
            .cloned())
    }

    async fn create_customer(&self, fields: &NewCustomer) -> Result<i64, SyncError> {
        let id = self.next_customer_id.fetch_add(1, Ordering::SeqCst);
        self.tables.lock().customers.insert(
            id,
            CustomerRecord {
                id,
                email: fields.email.clone(),
                first_name: fields.first_name.clone(),
                last_name: fields.last_name.clone(),
                phone: fields.phone.clone(),
                address1: fields.address1.clone(),
                city: fields.city.clone(),
            },
        );
        Ok(id)
    }

    async fn resolve_item_id_by_sku(&self, sku: &str) -> Result<Option<i64>, SyncError> {
        Ok(self.tables.lock().skus.get(sku).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header(reference: &str) -> OrderHeader {
        OrderHeader {
            store_id: 40,
            time: chrono::Utc::now(),
            order_type: 1,
            customer_id: None,
            total: crate::models::Money::ZERO,
            tax: crate::models::Money::ZERO,
            deposit: crate::models::Money::ZERO,
            shipping_charge_on_order: crate::models::Money::ZERO,
            reference_number: OrderReference::new(reference),
            channel_type: 2,
            closed: 0,
            customer_email_cache: None,
            storefront_order_number: format!("#{reference}"),
        }
    }

    #[tokio::test]
    async fn create_then_find_by_reference() {
        let store = InMemoryRmsStore::new();
        let mut session = store.begin_session().await.unwrap();
        let id = store
            .create_order(&sample_header("123"), session.as_mut())
            .await
            .unwrap();
        session.commit().await.unwrap();

        let found = store
            .find_order_by_reference(&OrderReference::new("123"))
            .await
            .unwrap();
        assert_eq!(found.unwrap().id, id);
    }

    #[tokio::test]
    async fn rollback_discards_staged_writes() {
        let store = InMemoryRmsStore::new();
        let mut session = store.begin_session().await.unwrap();
        store
            .create_order(&sample_header("456"), session.as_mut())
            .await
            .unwrap();
        session.rollback().await.unwrap();

        let found = store
            .find_order_by_reference(&OrderReference::new("456"))
            .await
            .unwrap();
        assert!(found.is_none());
    }
}

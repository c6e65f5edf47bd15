//! Atomic order upsert (§4.8). Everything happens inside one `RmsStore`
//! session; any error propagates unchanged after a rollback, so a failed
//! upsert never leaves a partially-written order.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{instrument, warn};

use crate::error::SyncError;
use crate::models::{OrderEntry, OrderEntryPatch, OrderHeader, OrderHeaderPatch, OrderHistory, WriteAction};
use crate::store::{OrderRow, RmsStore};

pub struct OrderWriter {
    store: Arc<dyn RmsStore>,
    shipping_item_id: i64,
}

impl OrderWriter {
    pub fn new(store: Arc<dyn RmsStore>, shipping_item_id: i64) -> Self {
        OrderWriter {
            store,
            shipping_item_id,
        }
    }

    #[instrument(skip(self, header, entries))]
    pub async fn upsert(
        &self,
        existing: Option<OrderRow>,
        header: OrderHeader,
        entries: Vec<OrderEntry>,
    ) -> Result<WriteAction, SyncError> {
        let mut session = self.store.begin_session().await?;

        let result = match existing {
            None => self.create(&header, entries, session.as_mut()).await,
            Some(row) => self.update(row, &header, entries, session.as_mut()).await,
        };

        match result {
            Ok(action) => {
                session.commit().await?;
                Ok(action)
            }
            Err(err) => {
                // Rollback errors are logged but the original error wins —
                // the caller needs to know why the upsert failed, not why
                // the rollback (which should always succeed) did.
                if let Err(rollback_err) = session.rollback().await {
                    warn!(error = %rollback_err, "rollback failed after upsert error");
                }
                Err(err)
            }
        }
    }

    async fn create(
        &self,
        header: &OrderHeader,
        entries: Vec<OrderEntry>,
        session: &mut dyn crate::store::Session,
    ) -> Result<WriteAction, SyncError> {
        let id = self.store.create_order(header, session).await?;
        for mut entry in entries {
            entry.order_id = id;
            self.store.create_order_entry(&entry, session).await?;
        }
        let history = OrderHistory::on_create(id, header.store_id, header.deposit, Utc::now());
        self.store.create_order_history(&history, session).await?;
        Ok(WriteAction::Created { id })
    }

    async fn update(
        &self,
        existing: OrderRow,
        header: &OrderHeader,
        entries: Vec<OrderEntry>,
        session: &mut dyn crate::store::Session,
    ) -> Result<WriteAction, SyncError> {
        let id = existing.id;
        let previous_deposit = existing.deposit;
        self.store.update_order(id, &OrderHeaderPatch::from(header), session).await?;

        let existing = self.store.list_order_entries(id, session).await?;
        let existing_by_item: HashMap<i64, &OrderEntry> =
            existing.iter().map(|e| (e.item_id, e)).collect();
        let converted_items: std::collections::HashSet<i64> = entries.iter().map(|e| e.item_id).collect();

        let mut updated = 0u32;
        let mut created = 0u32;
        let mut deleted = 0u32;

        for mut entry in entries {
            entry.order_id = id;
            if let Some(existing_entry) = existing_by_item.get(&entry.item_id) {
                let entry_id = existing_entry
                    .id
                    .expect("entries loaded from the store always carry an id");
                self.store
                    .update_order_entry(entry_id, &OrderEntryPatch::from(&entry), session)
                    .await?;
                updated += 1;
            } else {
                self.store.create_order_entry(&entry, session).await?;
                created += 1;
            }
        }

        for existing_entry in &existing {
            if converted_items.contains(&existing_entry.item_id) {
                continue;
            }
            let entry_id = existing_entry.id.expect("entries loaded from the store always carry an id");
            if existing_entry.item_id == self.shipping_item_id {
                // Shipping removed after a prior sync: zero it out, never
                // delete (§4.8.3.c).
                let patch = OrderEntry::zeroed_shipping_patch(existing_entry);
                self.store.update_order_entry(entry_id, &patch, session).await?;
            } else {
                self.store.delete_order_entry(entry_id, session).await?;
                deleted += 1;
            }
        }

        if header.shipping_charge_on_order.is_positive() && !converted_items.contains(&self.shipping_item_id) {
            warn!(
                order_id = id,
                "header has a positive shipping charge but no converted entry carries the shipping item id"
            );
        }

        let delta_deposit = header.deposit - previous_deposit;
        let history = OrderHistory::on_update(id, header.store_id, delta_deposit, Utc::now());
        self.store.create_order_history(&history, session).await?;

        Ok(WriteAction::Updated {
            id,
            entries_updated: updated,
            entries_created: created,
            entries_deleted: deleted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Money, OrderReference};
    use crate::store::memory::InMemoryRmsStore;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn row(id: i64, reference: &str, deposit: Money) -> OrderRow {
        OrderRow {
            id,
            reference_number: OrderReference::new(reference),
            deposit,
        }
    }

    fn header(reference: &str, shipping: Money) -> OrderHeader {
        OrderHeader {
            store_id: 40,
            time: Utc::now(),
            order_type: 1,
            customer_id: None,
            total: Money::from_str("150.00").unwrap(),
            tax: Money::from_str("15.00").unwrap(),
            deposit: Money::from_str("150.00").unwrap(),
            shipping_charge_on_order: shipping,
            reference_number: OrderReference::new(reference),
            channel_type: 2,
            closed: 0,
            customer_email_cache: None,
            storefront_order_number: format!("#{reference}"),
        }
    }

    fn entry(item_id: i64, qty: i64) -> OrderEntry {
        OrderEntry {
            id: None,
            order_id: 0,
            item_id,
            price: Money::from_str("10.00").unwrap(),
            full_price: Money::from_str("10.00").unwrap(),
            cost: None,
            quantity_on_order: Decimal::from(qty),
            quantity_rtd: Decimal::ZERO,
            taxable: 1,
            description: format!("item-{item_id}"),
            sales_rep_id: 0,
            discount_reason_code_id: 0,
            return_reason_code_id: 0,
            is_add_money: false,
            voucher_id: 0,
            comment: None,
            price_source: 0,
        }
    }

    #[tokio::test]
    async fn create_path_writes_header_and_entries() {
        let store = Arc::new(InMemoryRmsStore::new());
        let writer = OrderWriter::new(store.clone(), 9999);
        let action = writer
            .upsert(None, header("1", Money::from_str("5.00").unwrap()), vec![entry(1, 2)])
            .await
            .unwrap();
        let id = action.id();
        assert!(matches!(action, WriteAction::Created { .. }));
        assert_eq!(store.entries_for(id).len(), 1);
    }

    // S3: quantity change + product removed.
    #[tokio::test]
    async fn update_path_reconciles_entries() {
        let store = Arc::new(InMemoryRmsStore::new());
        let writer = OrderWriter::new(store.clone(), 9999);
        let created = writer
            .upsert(None, header("2", Money::ZERO), vec![entry(1, 2), entry(2, 1)])
            .await
            .unwrap();
        let id = created.id();

        let updated = writer
            .upsert(
                Some(row(id, "2", Money::from_str("150.00").unwrap())),
                header("2", Money::ZERO),
                vec![entry(1, 5)],
            )
            .await
            .unwrap();

        match updated {
            WriteAction::Updated {
                entries_updated,
                entries_created,
                entries_deleted,
                ..
            } => {
                assert_eq!(entries_updated, 1);
                assert_eq!(entries_created, 0);
                assert_eq!(entries_deleted, 1);
            }
            _ => panic!("expected update action"),
        }
        let remaining = store.entries_for(id);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].quantity_on_order, Decimal::from(5));
    }

    // S4: shipping removed after first sync -> zeroed, not deleted.
    #[tokio::test]
    async fn shipping_removed_is_zeroed_not_deleted() {
        let store = Arc::new(InMemoryRmsStore::new());
        let writer = OrderWriter::new(store.clone(), 9999);
        let shipping_entry = OrderEntry::shipping(0, 9999, Money::from_str("5.00").unwrap());
        let created = writer
            .upsert(None, header("3", Money::from_str("5.00").unwrap()), vec![shipping_entry])
            .await
            .unwrap();
        let id = created.id();

        let updated = writer
            .upsert(Some(row(id, "3", Money::from_str("150.00").unwrap())), header("3", Money::ZERO), vec![])
            .await
            .unwrap();
        match updated {
            WriteAction::Updated { entries_deleted, .. } => assert_eq!(entries_deleted, 0),
            _ => panic!("expected update action"),
        }
        let remaining = store.entries_for(id);
        assert_eq!(remaining.len(), 1);
        assert!(remaining[0].price.is_zero());
        assert_eq!(remaining[0].quantity_on_order, Decimal::ZERO);
    }

    #[tokio::test]
    async fn upsert_writes_an_audit_history_row_each_time() {
        let store = Arc::new(InMemoryRmsStore::new());
        let writer = OrderWriter::new(store.clone(), 9999);
        let created = writer
            .upsert(None, header("5", Money::ZERO), vec![entry(1, 1)])
            .await
            .unwrap();
        let id = created.id();
        let after_create = store.history_for(id);
        assert_eq!(after_create.len(), 1);
        assert_eq!(after_create[0].delta_deposit, Money::from_str("150.00").unwrap());

        let mut edited = header("5", Money::ZERO);
        edited.deposit = Money::from_str("100.00").unwrap();
        writer
            .upsert(
                Some(row(id, "5", Money::from_str("150.00").unwrap())),
                edited,
                vec![entry(1, 1)],
            )
            .await
            .unwrap();
        let after_update = store.history_for(id);
        assert_eq!(after_update.len(), 2);
        assert_eq!(after_update[1].delta_deposit, Money::from_str("-50.00").unwrap());
    }

    #[tokio::test]
    async fn rollback_leaves_no_partial_write() {
        let store = Arc::new(InMemoryRmsStore::new());
        let writer = OrderWriter::new(store.clone(), 9999);
        let mut session = store.begin_session().await.unwrap();
        let existing_before = store
            .find_order_by_reference(&OrderReference::new("4"))
            .await
            .unwrap();
        assert!(existing_before.is_none());
        // Simulate a failure mid-transaction by rolling back directly
        // instead of committing.
        let _ = store
            .create_order(&header("4", Money::ZERO), session.as_mut())
            .await
            .unwrap();
        session.rollback().await.unwrap();
        let existing_after = store
            .find_order_by_reference(&OrderReference::new("4"))
            .await
            .unwrap();
        assert!(existing_after.is_none());
        let _ = writer;
    }
}

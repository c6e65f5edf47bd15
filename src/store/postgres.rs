//! `sqlx`/Postgres-backed [`RmsStore`]. Mirrors the original `OrderRepository`
//! in spirit: every write that must be atomic runs against a borrowed
//! `sqlx::Transaction`, never against the bare pool.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use tracing::instrument;

use super::{OrderRow, RmsStore, Session};
use crate::error::SyncError;
use crate::models::{
    rms::CHANNEL_TYPE_STOREFRONT, CustomerRecord, Money, NewCustomer, OrderEntry, OrderEntryPatch,
    OrderHeader, OrderHeaderPatch, OrderHistory, OrderReference,
};

pub struct PgSession {
    tx: Option<Transaction<'static, Postgres>>,
}

#[async_trait]
impl Session for PgSession {
    async fn commit(mut self: Box<Self>) -> Result<(), SyncError> {
        let tx = self.tx.take().expect("session used after close");
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), SyncError> {
        let tx = self.tx.take().expect("session used after close");
        tx.rollback().await?;
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl PgSession {
    /// Recovers the underlying transaction from a `&mut dyn Session` that is
    /// known, by construction, to have been opened by `PgRmsStore`.
    fn tx_mut<'a>(session: &'a mut dyn Session) -> &'a mut Transaction<'static, Postgres> {
        session
            .as_any_mut()
            .downcast_mut::<PgSession>()
            .expect("session passed to PgRmsStore must be a PgSession")
            .tx
            .as_mut()
            .expect("session used after close")
    }
}

pub struct PgRmsStore {
    pool: PgPool,
}

impl PgRmsStore {
    pub fn new(pool: PgPool) -> Self {
        PgRmsStore { pool }
    }
}

#[async_trait]
impl RmsStore for PgRmsStore {
    async fn begin_session(&self) -> Result<Box<dyn Session>, SyncError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgSession { tx: Some(tx) }))
    }

    #[instrument(skip(self))]
    async fn find_order_by_reference(&self, reference: &OrderReference) -> Result<Option<OrderRow>, SyncError> {
        let row = sqlx::query!(
            r#"SELECT "OrderID" as id, "Deposit" as deposit FROM "Order"
               WHERE "ReferenceNumber" = $1 AND "ChannelType" = $2"#,
            reference.as_str(),
            CHANNEL_TYPE_STOREFRONT,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| OrderRow {
            id: r.id,
            reference_number: reference.clone(),
            deposit: Money::new(r.deposit),
        }))
    }

    #[instrument(skip(self, references))]
    async fn batch_check_order_existence(
        &self,
        references: &[OrderReference],
    ) -> Result<HashMap<OrderReference, bool>, SyncError> {
        let raw: Vec<&str> = references.iter().map(OrderReference::as_str).collect();
        let rows = sqlx::query!(
            r#"SELECT "ReferenceNumber" as reference FROM "Order" WHERE "ReferenceNumber" = ANY($1)"#,
            &raw as &[&str],
        )
        .fetch_all(&self.pool)
        .await?;

        let existing: std::collections::HashSet<String> =
            rows.into_iter().map(|r| r.reference).collect();

        Ok(references
            .iter()
            .map(|r| (r.clone(), existing.contains(r.as_str())))
            .collect())
    }

    #[instrument(skip(self, header, session))]
    async fn create_order(&self, header: &OrderHeader, session: &mut dyn Session) -> Result<i64, SyncError> {
        let tx = PgSession::tx_mut(session);
        let row = sqlx::query!(
            r#"INSERT INTO "Order"
                ("StoreID", "Time", "Type", "CustomerID", "Total", "Tax", "Deposit",
                 "ShippingChargeOnOrder", "ReferenceNumber", "ChannelType", "Closed", "CustomerEmailCache")
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
               RETURNING "OrderID" as id"#,
            header.store_id,
            header.time,
            header.order_type,
            header.customer_id,
            header.total.as_decimal(),
            header.tax.as_decimal(),
            header.deposit.as_decimal(),
            header.shipping_charge_on_order.as_decimal(),
            header.reference_number.as_str(),
            header.channel_type,
            header.closed,
            header.customer_email_cache,
        )
        .fetch_one(&mut **tx)
        .await?;
        Ok(row.id)
    }

    #[instrument(skip(self, patch, session))]
    async fn update_order(
        &self,
        id: i64,
        patch: &OrderHeaderPatch,
        session: &mut dyn Session,
    ) -> Result<(), SyncError> {
        let tx = PgSession::tx_mut(session);
        sqlx::query!(
            r#"UPDATE "Order" SET "Total" = $1, "Tax" = $2, "Deposit" = $3,
               "ShippingChargeOnOrder" = $4, "CustomerID" = $5, "CustomerEmailCache" = $6
               WHERE "OrderID" = $7"#,
            patch.total.as_decimal(),
            patch.tax.as_decimal(),
            patch.deposit.as_decimal(),
            patch.shipping_charge_on_order.as_decimal(),
            patch.customer_id,
            patch.customer_email_cache,
            id,
        )
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    #[instrument(skip(self, session))]
    async fn list_order_entries(&self, order_id: i64, session: &mut dyn Session) -> Result<Vec<OrderEntry>, SyncError> {
        let tx = PgSession::tx_mut(session);
        let rows = sqlx::query_as!(
            OrderEntryRow,
            r#"SELECT "EntryID" as id, "OrderID" as order_id, "ItemID" as item_id,
                      "Price" as price, "FullPrice" as full_price, "Cost" as cost,
                      "QuantityOnOrder" as quantity_on_order, "QuantityRTD" as quantity_rtd,
                      "Taxable" as taxable, "Description" as description,
                      "SalesRepID" as sales_rep_id, "DiscountReasonCodeID" as discount_reason_code_id,
                      "ReturnReasonCodeID" as return_reason_code_id, "IsAddMoney" as is_add_money,
                      "VoucherID" as voucher_id, "Comment" as comment, "PriceSource" as price_source
               FROM "OrderEntry" WHERE "OrderID" = $1"#,
            order_id,
        )
        .fetch_all(&mut **tx)
        .await?;

        Ok(rows.into_iter().map(OrderEntryRow::into_entry).collect())
    }

    #[instrument(skip(self, entry, session))]
    async fn create_order_entry(&self, entry: &OrderEntry, session: &mut dyn Session) -> Result<i64, SyncError> {
        let tx = PgSession::tx_mut(session);
        let row = sqlx::query!(
            r#"INSERT INTO "OrderEntry"
                ("OrderID", "ItemID", "Price", "FullPrice", "Cost", "QuantityOnOrder", "QuantityRTD",
                 "Taxable", "Description", "SalesRepID", "DiscountReasonCodeID", "ReturnReasonCodeID",
                 "IsAddMoney", "VoucherID", "Comment", "PriceSource")
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
               RETURNING "EntryID" as id"#,
            entry.order_id,
            entry.item_id,
            entry.price.as_decimal(),
            entry.full_price.as_decimal(),
            entry.cost.map(|c| c.as_decimal()),
            entry.quantity_on_order,
            entry.quantity_rtd,
            entry.taxable,
            entry.description,
            entry.sales_rep_id,
            entry.discount_reason_code_id,
            entry.return_reason_code_id,
            entry.is_add_money,
            entry.voucher_id,
            entry.comment,
            entry.price_source,
        )
        .fetch_one(&mut **tx)
        .await?;
        Ok(row.id)
    }

    #[instrument(skip(self, patch, session))]
    async fn update_order_entry(
        &self,
        id: i64,
        patch: &OrderEntryPatch,
        session: &mut dyn Session,
    ) -> Result<(), SyncError> {
        let tx = PgSession::tx_mut(session);
        sqlx::query!(
            r#"UPDATE "OrderEntry" SET "Price" = $1, "FullPrice" = $2, "Cost" = $3,
               "QuantityOnOrder" = $4, "QuantityRTD" = $5, "Description" = $6
               WHERE "EntryID" = $7"#,
            patch.price.as_decimal(),
            patch.full_price.as_decimal(),
            patch.cost.map(|c| c.as_decimal()),
            patch.quantity_on_order,
            patch.quantity_rtd,
            patch.description,
            id,
        )
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    #[instrument(skip(self, session))]
    async fn delete_order_entry(&self, id: i64, session: &mut dyn Session) -> Result<(), SyncError> {
        let tx = PgSession::tx_mut(session);
        sqlx::query!(r#"DELETE FROM "OrderEntry" WHERE "EntryID" = $1"#, id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, history, session))]
    async fn create_order_history(&self, history: &OrderHistory, session: &mut dyn Session) -> Result<(), SyncError> {
        let tx = PgSession::tx_mut(session);
        sqlx::query!(
            r#"INSERT INTO "OrderHistory"
                ("OrderID", "Date", "DeltaDeposit", "TransactionNumber", "Comment", "StoreID", "BatchID", "CashierID")
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
            history.order_id,
            history.date,
            history.delta_deposit.as_decimal(),
            history.transaction_number,
            history.comment,
            history.store_id,
            history.batch_id,
            history.cashier_id,
        )
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_customer_by_email(&self, email: &str) -> Result<Option<CustomerRecord>, SyncError> {
        let row = sqlx::query_as!(
            CustomerRecord,
            r#"SELECT "CustomerID" as id, "Email" as email, "FirstName" as first_name,
                      "LastName" as last_name, "Phone" as phone, "Address1" as address1, "City" as city
               FROM "Customer" WHERE "Email" = $1"#,
            email,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self, fields))]
    async fn create_customer(&self, fields: &NewCustomer) -> Result<i64, SyncError> {
        let row = sqlx::query!(
            r#"INSERT INTO "Customer" ("Email", "FirstName", "LastName", "Phone", "Address1", "City")
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING "CustomerID" as id"#,
            fields.email,
            fields.first_name,
            fields.last_name,
            fields.phone,
            fields.address1,
            fields.city,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row.id)
    }

    #[instrument(skip(self))]
    async fn resolve_item_id_by_sku(&self, sku: &str) -> Result<Option<i64>, SyncError> {
        let row = sqlx::query!(r#"SELECT "ItemID" as id FROM "Item" WHERE "SKU" = $1"#, sku)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.id))
    }
}

struct OrderEntryRow {
    id: Option<i64>,
    order_id: i64,
    item_id: i64,
    price: rust_decimal::Decimal,
    full_price: rust_decimal::Decimal,
    cost: Option<rust_decimal::Decimal>,
    quantity_on_order: rust_decimal::Decimal,
    quantity_rtd: rust_decimal::Decimal,
    taxable: i32,
    description: String,
    sales_rep_id: i32,
    discount_reason_code_id: i32,
    return_reason_code_id: i32,
    is_add_money: bool,
    voucher_id: i32,
    comment: Option<String>,
    price_source: i32,
}

impl OrderEntryRow {
    fn into_entry(self) -> OrderEntry {
        OrderEntry {
            id: self.id,
            order_id: self.order_id,
            item_id: self.item_id,
            price: crate::models::Money::new(self.price),
            full_price: crate::models::Money::new(self.full_price),
            cost: self.cost.map(crate::models::Money::new),
            quantity_on_order: self.quantity_on_order,
            quantity_rtd: self.quantity_rtd,
            taxable: self.taxable,
            description: self.description,
            sales_rep_id: self.sales_rep_id,
            discount_reason_code_id: self.discount_reason_code_id,
            return_reason_code_id: self.return_reason_code_id,
            is_add_money: self.is_add_money,
            voucher_id: self.voucher_id,
            comment: self.comment,
            price_source: self.price_source,
        }
    }
}

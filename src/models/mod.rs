pub mod money;
pub mod rms;
pub mod storefront;

pub use money::Money;
pub use rms::{
    CustomerRecord, NewCustomer, OrderEntry, OrderEntryPatch, OrderHeader, OrderHeaderPatch,
    OrderHistory, OrderReference, WriteAction,
};
pub use storefront::{
    FetchPage, FinancialStatus, FulfillmentStatus, LineItem, OrderFilter, OrderTotals,
    OrderTransaction, ShippingLine, StorefrontAddress, StorefrontCustomer, StorefrontOrder,
    TransactionKind, TransactionStatus,
};

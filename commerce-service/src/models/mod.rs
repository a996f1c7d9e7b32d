//! Domain models for commerce-service.

mod credit;
mod product;
mod sale;
mod sequence;
mod shift;
mod stock;

pub use credit::{CreditEntryType, CreditLedgerEntry, CustomerAccount, OpenAccount};
pub use product::{CreateProduct, Product};
pub use sale::{
    AddItem, CreateSale, Payment, PaymentMethod, RecordPayment, Refund, Sale, SaleItem,
    SaleStatus, SaleTotals,
};
pub use sequence::{format_document_number, DocumentSequence};
pub use shift::{CashShift, ShiftStatus};
pub use stock::{ProductStock, StockAdjustment, StockAlert};

//! Service layer: the ledger components and their shared infrastructure.

pub mod alerts;
pub mod credit;
pub mod database;
pub mod events;
pub mod metrics;
pub mod sales;
pub mod sequences;
pub mod shifts;
pub mod stock;

pub use alerts::StockAlerts;
pub use credit::CreditLedger;
pub use database::Database;
pub use events::{DomainEvent, EventOutbox};
pub use metrics::{get_metrics, init_metrics};
pub use sales::SaleLedger;
pub use sequences::SequenceGenerator;
pub use shifts::CashShiftLedger;
pub use stock::StockLedger;

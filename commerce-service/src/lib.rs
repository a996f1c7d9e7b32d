//! Commerce Service - Transactional commerce ledger for multi-tenant retail
//! operations: sale lifecycle, stock reservations, document sequences, cash
//! shifts and customer credit.

pub mod config;
pub mod dtos;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;

use config::CommerceConfig;
use services::{CashShiftLedger, CreditLedger, Database, EventOutbox, SaleLedger, StockAlerts, StockLedger};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: CommerceConfig,
    pub db: Database,
    pub sales: SaleLedger,
    pub shifts: CashShiftLedger,
    pub credit: CreditLedger,
    pub stock: StockLedger,
    pub alerts: StockAlerts,
    pub outbox: EventOutbox,
}

pub use startup::Application;

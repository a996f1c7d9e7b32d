//! Minimal catalog rows the ledger depends on.
//!
//! Catalog management lives elsewhere; the ledger keeps only what it needs
//! to price lines, decide stock tracking, and guard deletions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub product_id: Uuid,
    pub tenant_id: Uuid,
    pub sku: String,
    pub name: String,
    pub unit_price: Decimal,
    pub cost_price: Option<Decimal>,
    /// Service products set this false and never get stock rows.
    pub track_stock: bool,
    pub active: bool,
    pub created_utc: DateTime<Utc>,
}

/// Input for registering a product.
#[derive(Debug, Clone)]
pub struct CreateProduct {
    pub sku: String,
    pub name: String,
    pub unit_price: Decimal,
    pub cost_price: Option<Decimal>,
    pub track_stock: bool,
}

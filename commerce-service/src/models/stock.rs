//! Per-store stock rows and low-stock alerts.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// On-hand and reserved quantity for one (store, product) pair. Rows exist
/// only for products with stock tracking enabled and are created lazily on
/// first movement.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProductStock {
    pub tenant_id: Uuid,
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i64,
    pub reserved_qty: i64,
    pub min_qty: i64,
    pub updated_utc: DateTime<Utc>,
}

impl ProductStock {
    /// On-hand minus reserved. Never negative at any commit point.
    pub fn available(&self) -> i64 {
        self.quantity - self.reserved_qty
    }

    pub fn is_low(&self) -> bool {
        self.quantity < self.min_qty
    }
}

/// One low-stock observation per (store, product, day).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StockAlert {
    pub alert_id: Uuid,
    pub tenant_id: Uuid,
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub alert_date: NaiveDate,
    pub quantity: i64,
    pub min_qty: i64,
    pub created_utc: DateTime<Utc>,
}

/// Input for a manual stock adjustment (receiving, count corrections).
#[derive(Debug, Clone)]
pub struct StockAdjustment {
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub delta: i64,
    pub reason: String,
    /// When present, also updates the row's low-stock threshold.
    pub min_qty: Option<i64>,
}

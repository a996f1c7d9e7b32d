//! Request/response bodies for the HTTP surface.

use crate::models::{Payment, PaymentMethod, Refund, Sale, SaleItem};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub sku: String,
    pub name: String,
    pub unit_price: Decimal,
    pub cost_price: Option<Decimal>,
    #[serde(default = "default_true")]
    pub track_stock: bool,
}

#[derive(Deserialize)]
pub struct CreateSaleRequest {
    pub store_id: Uuid,
    pub store_code: String,
    pub customer_id: Option<Uuid>,
    #[serde(default)]
    pub is_credit_sale: bool,
    #[serde(default = "default_true")]
    pub reserve_stock: bool,
    #[serde(default)]
    pub tax: Decimal,
}

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub product_id: Option<Uuid>,
    pub description: Option<String>,
    pub quantity: i64,
    pub unit_price_override: Option<Decimal>,
    #[serde(default)]
    pub price_override_authorized: bool,
    #[serde(default)]
    pub discount: Decimal,
}

#[derive(Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

#[derive(Deserialize)]
pub struct CancelSaleRequest {
    pub reason: String,
}

#[derive(Deserialize)]
pub struct RecordPaymentRequest {
    pub shift_id: Uuid,
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub reference: Option<String>,
}

#[derive(Deserialize)]
pub struct RefundRequest {
    pub amount: Decimal,
    pub method: PaymentMethod,
    /// Defaults to the acting user when approval routing is not in play.
    pub approved_by: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct OpenShiftRequest {
    pub store_id: Uuid,
    pub opening_float: Decimal,
}

#[derive(Deserialize)]
pub struct CloseShiftRequest {
    pub closing_cash: Decimal,
}

#[derive(Deserialize)]
pub struct OpenAccountRequest {
    pub store_id: Uuid,
    pub customer_id: Uuid,
    pub credit_limit: Decimal,
}

#[derive(Deserialize)]
pub struct CreditPaymentRequest {
    pub store_id: Uuid,
    pub amount: Decimal,
    pub reference: Option<String>,
}

#[derive(Deserialize)]
pub struct StoreQuery {
    pub store_id: Uuid,
}

#[derive(Deserialize)]
pub struct AvailabilityQuery {
    pub store_id: Uuid,
    pub amount: Decimal,
}

#[derive(Deserialize)]
pub struct EntriesQuery {
    pub store_id: Uuid,
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct AdjustStockRequest {
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub delta: i64,
    pub reason: String,
    pub min_qty: Option<i64>,
}

#[derive(Deserialize)]
pub struct SyncAlertsRequest {
    pub store_id: Uuid,
}

/// Read-only snapshot of one sale for receipts, reporting and analytics.
#[derive(Serialize)]
pub struct SaleSnapshot {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    pub payments: Vec<Payment>,
    pub refunds: Vec<Refund>,
}

#[derive(Serialize)]
pub struct AvailabilityResponse {
    pub available: bool,
}

#[derive(Serialize)]
pub struct SyncAlertsResponse {
    pub created: u64,
}

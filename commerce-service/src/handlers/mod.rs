//! HTTP handlers for the commerce ledger API.
//!
//! All routes are tenant-scoped via the `TenantContext` extractor; handlers
//! stay thin and delegate to the ledger services.

pub mod credit;
pub mod products;
pub mod sales;
pub mod shifts;
pub mod stock;

use crate::AppState;
use axum::routing::{get, patch, post};
use axum::Router;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/products", post(products::create_product))
        .route(
            "/api/v1/products/:product_id",
            get(products::get_product).delete(products::delete_product),
        )
        .route("/api/v1/sales", post(sales::create_sale))
        .route("/api/v1/sales/:sale_id", get(sales::get_sale))
        .route("/api/v1/sales/:sale_id/items", post(sales::add_item))
        .route(
            "/api/v1/sales/:sale_id/items/:item_id",
            patch(sales::update_quantity).delete(sales::remove_item),
        )
        .route("/api/v1/sales/:sale_id/recalculate", post(sales::recalculate))
        .route("/api/v1/sales/:sale_id/submit", post(sales::submit))
        .route("/api/v1/sales/:sale_id/cancel", post(sales::cancel))
        .route("/api/v1/sales/:sale_id/payments", post(sales::record_payment))
        .route("/api/v1/sales/:sale_id/refunds", post(sales::refund))
        .route("/api/v1/shifts", post(shifts::open_shift))
        .route("/api/v1/shifts/:shift_id", get(shifts::get_shift))
        .route("/api/v1/shifts/:shift_id/close", post(shifts::close_shift))
        .route("/api/v1/credit/accounts", post(credit::open_account))
        .route("/api/v1/credit/accounts/:customer_id", get(credit::get_account))
        .route(
            "/api/v1/credit/accounts/:customer_id/availability",
            get(credit::check_availability),
        )
        .route(
            "/api/v1/credit/accounts/:customer_id/payments",
            post(credit::record_payment),
        )
        .route(
            "/api/v1/credit/accounts/:customer_id/entries",
            get(credit::list_entries),
        )
        .route("/api/v1/stock/adjustments", post(stock::adjust))
        .route("/api/v1/stock/alerts/sync", post(stock::sync_alerts))
        .route("/api/v1/stock/alerts/:store_id", get(stock::list_alerts))
        .route("/api/v1/stock/:store_id/:product_id", get(stock::get_stock))
}

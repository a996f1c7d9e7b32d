//! Stock ledger handlers.

use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::dtos::{AdjustStockRequest, SyncAlertsRequest, SyncAlertsResponse};
use crate::error::LedgerError;
use crate::middleware::TenantContext;
use crate::models::{ProductStock, StockAdjustment, StockAlert};
use crate::AppState;

pub async fn adjust(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<AdjustStockRequest>,
) -> Result<Json<ProductStock>, AppError> {
    tenant.actor()?;

    let input = StockAdjustment {
        store_id: payload.store_id,
        product_id: payload.product_id,
        delta: payload.delta,
        reason: payload.reason,
        min_qty: payload.min_qty,
    };

    let stock = state.stock.adjust(tenant.tenant_id, &input).await?;

    Ok(Json(stock))
}

pub async fn get_stock(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path((store_id, product_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ProductStock>, AppError> {
    let stock = state
        .stock
        .get_stock(tenant.tenant_id, store_id, product_id)
        .await?
        .ok_or(LedgerError::NotFound {
            entity: "stock row",
            id: product_id,
        })?;

    Ok(Json(stock))
}

pub async fn sync_alerts(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<SyncAlertsRequest>,
) -> Result<Json<SyncAlertsResponse>, AppError> {
    let created = state
        .alerts
        .sync_low_stock(tenant.tenant_id, payload.store_id)
        .await?;

    Ok(Json(SyncAlertsResponse { created }))
}

pub async fn list_alerts(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(store_id): Path<Uuid>,
) -> Result<Json<Vec<StockAlert>>, AppError> {
    let alerts = state
        .alerts
        .list_alerts(tenant.tenant_id, store_id, None)
        .await?;

    Ok(Json(alerts))
}

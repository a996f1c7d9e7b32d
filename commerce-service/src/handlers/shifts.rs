//! Cash shift handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::dtos::{CloseShiftRequest, OpenShiftRequest};
use crate::error::LedgerError;
use crate::middleware::TenantContext;
use crate::models::CashShift;
use crate::AppState;

pub async fn open_shift(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<OpenShiftRequest>,
) -> Result<(StatusCode, Json<CashShift>), AppError> {
    let cashier = tenant.actor()?;

    let shift = state
        .shifts
        .open_shift(
            tenant.tenant_id,
            payload.store_id,
            cashier,
            payload.opening_float,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(shift)))
}

pub async fn get_shift(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(shift_id): Path<Uuid>,
) -> Result<Json<CashShift>, AppError> {
    let shift = state
        .shifts
        .get_shift(tenant.tenant_id, shift_id)
        .await?
        .ok_or(LedgerError::NotFound {
            entity: "shift",
            id: shift_id,
        })?;

    Ok(Json(shift))
}

pub async fn close_shift(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(shift_id): Path<Uuid>,
    Json(payload): Json<CloseShiftRequest>,
) -> Result<Json<CashShift>, AppError> {
    tenant.actor()?;

    let shift = state
        .shifts
        .close_shift(tenant.tenant_id, shift_id, payload.closing_cash)
        .await?;

    Ok(Json(shift))
}

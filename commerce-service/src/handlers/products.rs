//! Product catalog handlers (the slice of catalog the ledger owns).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::dtos::CreateProductRequest;
use crate::error::LedgerError;
use crate::middleware::TenantContext;
use crate::models::{CreateProduct, Product};
use crate::AppState;

pub async fn create_product(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    tenant.actor()?;

    let input = CreateProduct {
        sku: payload.sku,
        name: payload.name,
        unit_price: payload.unit_price,
        cost_price: payload.cost_price,
        track_stock: payload.track_stock,
    };

    let product = state.db.create_product(tenant.tenant_id, &input).await?;

    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn get_product(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Product>, AppError> {
    let product = state
        .db
        .get_product(tenant.tenant_id, product_id)
        .await?
        .ok_or(LedgerError::NotFound {
            entity: "product",
            id: product_id,
        })?;

    Ok(Json(product))
}

pub async fn delete_product(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(product_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    tenant.actor()?;

    state.db.delete_product(tenant.tenant_id, product_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

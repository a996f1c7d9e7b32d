//! Sale lifecycle handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::dtos::{
    AddItemRequest, CancelSaleRequest, CreateSaleRequest, RecordPaymentRequest, RefundRequest,
    SaleSnapshot, UpdateQuantityRequest,
};
use crate::error::LedgerError;
use crate::middleware::TenantContext;
use crate::models::{AddItem, CreateSale, Payment, RecordPayment, Refund, Sale, SaleItem};
use crate::AppState;

pub async fn create_sale(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<CreateSaleRequest>,
) -> Result<(StatusCode, Json<Sale>), AppError> {
    let seller = tenant.actor()?;

    let input = CreateSale {
        store_id: payload.store_id,
        store_code: payload.store_code,
        customer_id: payload.customer_id,
        is_credit_sale: payload.is_credit_sale,
        reserve_stock: payload.reserve_stock,
        tax: payload.tax,
    };

    let sale = state
        .sales
        .create_sale(tenant.tenant_id, seller, &input)
        .await?;

    Ok((StatusCode::CREATED, Json(sale)))
}

pub async fn get_sale(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(sale_id): Path<Uuid>,
) -> Result<Json<SaleSnapshot>, AppError> {
    let sale = state
        .sales
        .get_sale(tenant.tenant_id, sale_id)
        .await?
        .ok_or(LedgerError::NotFound {
            entity: "sale",
            id: sale_id,
        })?;

    let items = state.sales.get_items(tenant.tenant_id, sale_id).await?;
    let payments = state.sales.get_payments(tenant.tenant_id, sale_id).await?;
    let refunds = state.sales.get_refunds(tenant.tenant_id, sale_id).await?;

    Ok(Json(SaleSnapshot {
        sale,
        items,
        payments,
        refunds,
    }))
}

pub async fn add_item(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(sale_id): Path<Uuid>,
    Json(payload): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<SaleItem>), AppError> {
    let actor = tenant.actor()?;

    let input = AddItem {
        product_id: payload.product_id,
        description: payload.description,
        quantity: payload.quantity,
        unit_price_override: payload.unit_price_override,
        price_override_authorized: payload.price_override_authorized,
        discount: payload.discount,
    };

    let item = state
        .sales
        .add_item(tenant.tenant_id, sale_id, actor, &input)
        .await?;

    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn update_quantity(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path((sale_id, item_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> Result<Json<SaleItem>, AppError> {
    let actor = tenant.actor()?;

    let item = state
        .sales
        .update_quantity(tenant.tenant_id, sale_id, item_id, actor, payload.quantity)
        .await?;

    Ok(Json(item))
}

pub async fn remove_item(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path((sale_id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    let actor = tenant.actor()?;

    state
        .sales
        .remove_item(tenant.tenant_id, sale_id, item_id, actor)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn recalculate(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(sale_id): Path<Uuid>,
) -> Result<Json<Sale>, AppError> {
    let sale = state.sales.recalculate(tenant.tenant_id, sale_id).await?;

    Ok(Json(sale))
}

pub async fn submit(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(sale_id): Path<Uuid>,
) -> Result<Json<Sale>, AppError> {
    let actor = tenant.actor()?;

    let sale = state.sales.submit(tenant.tenant_id, sale_id, actor).await?;

    Ok(Json(sale))
}

pub async fn cancel(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(sale_id): Path<Uuid>,
    Json(payload): Json<CancelSaleRequest>,
) -> Result<Json<Sale>, AppError> {
    let actor = tenant.actor()?;

    let sale = state
        .sales
        .cancel(tenant.tenant_id, sale_id, actor, payload.reason)
        .await?;

    Ok(Json(sale))
}

pub async fn record_payment(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(sale_id): Path<Uuid>,
    Json(payload): Json<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), AppError> {
    let cashier = tenant.actor()?;

    let input = RecordPayment {
        shift_id: payload.shift_id,
        method: payload.method,
        amount: payload.amount,
        reference: payload.reference,
    };

    let payment = state
        .sales
        .record_payment(tenant.tenant_id, sale_id, cashier, &input)
        .await?;

    Ok((StatusCode::CREATED, Json(payment)))
}

pub async fn refund(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(sale_id): Path<Uuid>,
    Json(payload): Json<RefundRequest>,
) -> Result<(StatusCode, Json<Refund>), AppError> {
    let actor = tenant.actor()?;
    let approved_by = payload.approved_by.unwrap_or(actor);

    let refund = state
        .sales
        .refund(
            tenant.tenant_id,
            sale_id,
            actor,
            approved_by,
            payload.amount,
            payload.method,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(refund)))
}

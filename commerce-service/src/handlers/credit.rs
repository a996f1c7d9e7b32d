//! Credit ledger handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::dtos::{
    AvailabilityQuery, AvailabilityResponse, CreditPaymentRequest, EntriesQuery,
    OpenAccountRequest, StoreQuery,
};
use crate::error::LedgerError;
use crate::middleware::TenantContext;
use crate::models::{CreditLedgerEntry, CustomerAccount, OpenAccount};
use crate::AppState;

pub async fn open_account(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<OpenAccountRequest>,
) -> Result<(StatusCode, Json<CustomerAccount>), AppError> {
    tenant.actor()?;

    let input = OpenAccount {
        store_id: payload.store_id,
        customer_id: payload.customer_id,
        credit_limit: payload.credit_limit,
    };

    let account = state.credit.open_account(tenant.tenant_id, &input).await?;

    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn get_account(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(customer_id): Path<Uuid>,
    Query(query): Query<StoreQuery>,
) -> Result<Json<CustomerAccount>, AppError> {
    let account = state
        .credit
        .get_account(tenant.tenant_id, query.store_id, customer_id)
        .await?
        .ok_or(LedgerError::NotFound {
            entity: "customer account",
            id: customer_id,
        })?;

    Ok(Json(account))
}

pub async fn check_availability(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(customer_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let available = state
        .credit
        .check_availability(tenant.tenant_id, query.store_id, customer_id, query.amount)
        .await?;

    Ok(Json(AvailabilityResponse { available }))
}

pub async fn record_payment(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(customer_id): Path<Uuid>,
    Json(payload): Json<CreditPaymentRequest>,
) -> Result<(StatusCode, Json<CreditLedgerEntry>), AppError> {
    let actor = tenant.actor()?;

    let entry = state
        .credit
        .record_credit_payment(
            tenant.tenant_id,
            payload.store_id,
            customer_id,
            payload.amount,
            payload.reference,
            actor,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn list_entries(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(customer_id): Path<Uuid>,
    Query(query): Query<EntriesQuery>,
) -> Result<Json<Vec<CreditLedgerEntry>>, AppError> {
    let account = state
        .credit
        .get_account(tenant.tenant_id, query.store_id, customer_id)
        .await?
        .ok_or(LedgerError::NotFound {
            entity: "customer account",
            id: customer_id,
        })?;

    let entries = state
        .credit
        .list_entries(tenant.tenant_id, account.account_id, query.limit.unwrap_or(100))
        .await?;

    Ok(Json(entries))
}

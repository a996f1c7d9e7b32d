//! Business-rule violations raised by the ledger components.
//!
//! Every variant is raised synchronously inside the operation's transaction,
//! which rolls back wholesale; none of these leave partial effects behind.
//! Transient failures (lock timeouts) are a separate category mapped in
//! `services::database::db_err`.

use rust_decimal::Decimal;
use service_core::error::AppError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Operation not valid for the entity's current lifecycle state,
    /// e.g. editing a submitted sale or paying into a closed shift.
    #[error("{entity} {id} is {state}, cannot {operation}")]
    InvalidState {
        entity: &'static str,
        id: Uuid,
        state: String,
        operation: &'static str,
    },

    /// Reservation or decrement exceeds available quantity.
    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: Uuid,
        available: i64,
        requested: i64,
    },

    /// Payment or credit repayment exceeds the outstanding amount.
    #[error("Amount {amount} exceeds outstanding {outstanding}")]
    Overpayment {
        amount: Decimal,
        outstanding: Decimal,
    },

    #[error("Cashier {cashier_id} already has an open shift in store {store_id}")]
    ShiftAlreadyOpen { store_id: Uuid, cashier_id: Uuid },

    /// Delete blocked by live references.
    #[error("Cannot delete {entity} {id}: referenced by {referenced_by}")]
    ReferentialIntegrity {
        entity: &'static str,
        id: Uuid,
        referenced_by: &'static str,
    },

    #[error("Sale {sale_id} has no items and cannot be submitted")]
    EmptySale { sale_id: Uuid },

    /// New credit would exceed the account limit. Availability must be
    /// checked before extending credit; the limit is never applied
    /// retroactively.
    #[error("Credit of {requested} exceeds available credit {available}")]
    CreditLimitExceeded {
        requested: Decimal,
        available: Decimal,
    },

    /// A unit-price override was supplied without the pre-authorized
    /// override capability for the sale's store.
    #[error("Price override on sale {sale_id} is not authorized")]
    PriceOverrideDenied { sale_id: Uuid },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match &err {
            LedgerError::NotFound { .. } => AppError::NotFound(anyhow::anyhow!("{}", err)),
            LedgerError::Overpayment { .. } | LedgerError::EmptySale { .. } => {
                AppError::BadRequest(anyhow::anyhow!("{}", err))
            }
            _ => AppError::Conflict(anyhow::anyhow!("{}", err)),
        }
    }
}

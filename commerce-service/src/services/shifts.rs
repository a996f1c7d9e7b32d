//! Cash shift ledger: open/close lifecycle and running totals.

use crate::error::LedgerError;
use crate::models::{CashShift, PaymentMethod};
use crate::services::database::{db_err, Database};
use crate::services::metrics::DB_QUERY_DURATION;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::PgConnection;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Clone)]
pub struct CashShiftLedger {
    db: Database,
}

impl CashShiftLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Open a shift for a cashier. At most one open shift per
    /// (store, cashier); the partial unique index backs the check, so a
    /// racing second open fails here rather than creating a duplicate.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, store_id = %store_id, cashier_id = %cashier_id))]
    pub async fn open_shift(
        &self,
        tenant_id: Uuid,
        store_id: Uuid,
        cashier_id: Uuid,
        opening_float: Decimal,
    ) -> Result<CashShift, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["open_shift"])
            .start_timer();

        let shift_id = Uuid::new_v4();
        let shift = sqlx::query_as::<_, CashShift>(
            r#"
            INSERT INTO cash_shifts (
                shift_id, tenant_id, store_id, cashier_id, status,
                opening_float, total_sales, total_cash_payments, expected_cash
            )
            VALUES ($1, $2, $3, $4, 'open', $5, 0, 0, $5)
            RETURNING shift_id, tenant_id, store_id, cashier_id, status, opening_float,
                total_sales, total_cash_payments, expected_cash, closing_cash, variance,
                opened_utc, closed_utc
            "#,
        )
        .bind(shift_id)
        .bind(tenant_id)
        .bind(store_id)
        .bind(cashier_id)
        .bind(opening_float)
        .fetch_one(self.db.pool())
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                LedgerError::ShiftAlreadyOpen {
                    store_id,
                    cashier_id,
                }
                .into()
            }
            _ => db_err("Failed to open shift", e),
        })?;

        timer.observe_duration();

        info!(shift_id = %shift.shift_id, opening_float = %opening_float, "Shift opened");

        Ok(shift)
    }

    /// Get a shift by ID.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, shift_id = %shift_id))]
    pub async fn get_shift(
        &self,
        tenant_id: Uuid,
        shift_id: Uuid,
    ) -> Result<Option<CashShift>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_shift"])
            .start_timer();

        let shift = sqlx::query_as::<_, CashShift>(
            r#"
            SELECT shift_id, tenant_id, store_id, cashier_id, status, opening_float,
                total_sales, total_cash_payments, expected_cash, closing_cash, variance,
                opened_utc, closed_utc
            FROM cash_shifts
            WHERE tenant_id = $1 AND shift_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(shift_id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(|e| db_err("Failed to get shift", e))?;

        timer.observe_duration();

        Ok(shift)
    }

    /// Close an open shift: record the counted cash and derive the variance
    /// from the freshly locked totals.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, shift_id = %shift_id))]
    pub async fn close_shift(
        &self,
        tenant_id: Uuid,
        shift_id: Uuid,
        closing_cash: Decimal,
    ) -> Result<CashShift, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["close_shift"])
            .start_timer();

        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(|e| db_err("Failed to begin transaction", e))?;

        let shift = Self::lock_shift(&mut tx, tenant_id, shift_id).await?;

        if !shift.is_open() {
            return Err(LedgerError::InvalidState {
                entity: "shift",
                id: shift_id,
                state: shift.status.clone(),
                operation: "close",
            }
            .into());
        }

        let variance = shift.variance_against(closing_cash);

        let closed = sqlx::query_as::<_, CashShift>(
            r#"
            UPDATE cash_shifts
            SET status = 'closed',
                closing_cash = $3,
                variance = $4,
                closed_utc = NOW()
            WHERE tenant_id = $1 AND shift_id = $2
            RETURNING shift_id, tenant_id, store_id, cashier_id, status, opening_float,
                total_sales, total_cash_payments, expected_cash, closing_cash, variance,
                opened_utc, closed_utc
            "#,
        )
        .bind(tenant_id)
        .bind(shift_id)
        .bind(closing_cash)
        .bind(variance)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_err("Failed to close shift", e))?;

        tx.commit()
            .await
            .map_err(|e| db_err("Failed to commit transaction", e))?;

        timer.observe_duration();

        info!(
            shift_id = %shift_id,
            closing_cash = %closing_cash,
            variance = %variance,
            "Shift closed"
        );

        Ok(closed)
    }

    // -------------------------------------------------------------------------
    // Transaction-composable operations (used by the sale ledger)
    // -------------------------------------------------------------------------

    /// Fold a payment into the shift's running totals.
    ///
    /// The totals are re-read under an exclusive lock immediately before the
    /// write; the shift id handed in is only a key, never a source of
    /// totals, so a concurrently posted payment is never clobbered.
    pub(crate) async fn apply_payment(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        shift_id: Uuid,
        method: PaymentMethod,
        amount: Decimal,
    ) -> Result<CashShift, AppError> {
        let shift = Self::lock_shift(conn, tenant_id, shift_id).await?;

        if !shift.is_open() {
            return Err(LedgerError::InvalidState {
                entity: "shift",
                id: shift_id,
                state: shift.status.clone(),
                operation: "record payment",
            }
            .into());
        }

        let cash_delta = if method == PaymentMethod::Cash {
            amount
        } else {
            Decimal::ZERO
        };

        let updated = sqlx::query_as::<_, CashShift>(
            r#"
            UPDATE cash_shifts
            SET total_sales = total_sales + $3,
                total_cash_payments = total_cash_payments + $4,
                expected_cash = opening_float + total_cash_payments + $4
            WHERE tenant_id = $1 AND shift_id = $2
            RETURNING shift_id, tenant_id, store_id, cashier_id, status, opening_float,
                total_sales, total_cash_payments, expected_cash, closing_cash, variance,
                opened_utc, closed_utc
            "#,
        )
        .bind(tenant_id)
        .bind(shift_id)
        .bind(amount)
        .bind(cash_delta)
        .fetch_one(conn)
        .await
        .map_err(|e| db_err("Failed to update shift totals", e))?;

        Ok(updated)
    }

    /// Lock the shift row for update.
    async fn lock_shift(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        shift_id: Uuid,
    ) -> Result<CashShift, AppError> {
        sqlx::query_as::<_, CashShift>(
            r#"
            SELECT shift_id, tenant_id, store_id, cashier_id, status, opening_float,
                total_sales, total_cash_payments, expected_cash, closing_cash, variance,
                opened_utc, closed_utc
            FROM cash_shifts
            WHERE tenant_id = $1 AND shift_id = $2
            FOR UPDATE
            "#,
        )
        .bind(tenant_id)
        .bind(shift_id)
        .fetch_optional(conn)
        .await
        .map_err(|e| db_err("Failed to lock shift row", e))?
        .ok_or_else(|| {
            LedgerError::NotFound {
                entity: "shift",
                id: shift_id,
            }
            .into()
        })
    }
}

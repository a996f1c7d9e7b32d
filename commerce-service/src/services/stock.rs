//! Stock ledger: reservations, decrements and manual adjustments.
//!
//! The reservation check and the write always happen under the same row
//! lock; two concurrent adds can never both observe sufficient availability.

use crate::error::LedgerError;
use crate::models::{Product, ProductStock, StockAdjustment};
use crate::services::database::{db_err, Database};
use crate::services::metrics::DB_QUERY_DURATION;
use service_core::error::AppError;
use sqlx::PgConnection;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Clone)]
pub struct StockLedger {
    db: Database,
}

impl StockLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Read the stock row for one (store, product) pair.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, store_id = %store_id, product_id = %product_id))]
    pub async fn get_stock(
        &self,
        tenant_id: Uuid,
        store_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<ProductStock>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_stock"])
            .start_timer();

        let stock = sqlx::query_as::<_, ProductStock>(
            r#"
            SELECT tenant_id, store_id, product_id, quantity, reserved_qty, min_qty, updated_utc
            FROM product_stock
            WHERE tenant_id = $1 AND store_id = $2 AND product_id = $3
            "#,
        )
        .bind(tenant_id)
        .bind(store_id)
        .bind(product_id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(|e| db_err("Failed to get stock", e))?;

        timer.observe_duration();

        Ok(stock)
    }

    /// Manual adjustment (receiving, stock count corrections). Fails when
    /// the product does not track stock or when the adjustment would push
    /// available below zero.
    #[instrument(skip(self, input), fields(tenant_id = %tenant_id, product_id = %input.product_id, delta = input.delta))]
    pub async fn adjust(
        &self,
        tenant_id: Uuid,
        input: &StockAdjustment,
    ) -> Result<ProductStock, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["adjust_stock"])
            .start_timer();

        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(|e| db_err("Failed to begin transaction", e))?;

        let product = Database::get_product_on(&mut tx, tenant_id, input.product_id)
            .await?
            .ok_or(LedgerError::NotFound {
                entity: "product",
                id: input.product_id,
            })?;

        if !product.track_stock {
            return Err(LedgerError::InvalidState {
                entity: "product",
                id: product.product_id,
                state: "untracked".to_string(),
                operation: "adjust stock",
            }
            .into());
        }

        let stock = Self::lock_or_create(&mut tx, tenant_id, input.store_id, input.product_id).await?;

        let new_quantity = stock.quantity + input.delta;
        if new_quantity < stock.reserved_qty {
            return Err(LedgerError::InsufficientStock {
                product_id: input.product_id,
                available: stock.available(),
                requested: -input.delta,
            }
            .into());
        }

        let updated = sqlx::query_as::<_, ProductStock>(
            r#"
            UPDATE product_stock
            SET quantity = $4,
                min_qty = COALESCE($5, min_qty),
                updated_utc = NOW()
            WHERE tenant_id = $1 AND store_id = $2 AND product_id = $3
            RETURNING tenant_id, store_id, product_id, quantity, reserved_qty, min_qty, updated_utc
            "#,
        )
        .bind(tenant_id)
        .bind(input.store_id)
        .bind(input.product_id)
        .bind(new_quantity)
        .bind(input.min_qty)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_err("Failed to adjust stock", e))?;

        tx.commit()
            .await
            .map_err(|e| db_err("Failed to commit transaction", e))?;

        timer.observe_duration();

        info!(
            product_id = %input.product_id,
            delta = input.delta,
            quantity = updated.quantity,
            reason = %input.reason,
            "Stock adjusted"
        );

        Ok(updated)
    }

    // -------------------------------------------------------------------------
    // Transaction-composable operations (used by the sale ledger)
    // -------------------------------------------------------------------------

    /// Place a hold of `qty` against available stock. No-op for products
    /// with stock tracking disabled (no row is created for them).
    pub(crate) async fn reserve(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        store_id: Uuid,
        product: &Product,
        qty: i64,
    ) -> Result<(), AppError> {
        if !product.track_stock {
            return Ok(());
        }

        let stock = Self::lock_or_create(conn, tenant_id, store_id, product.product_id).await?;

        if stock.available() < qty {
            return Err(LedgerError::InsufficientStock {
                product_id: product.product_id,
                available: stock.available(),
                requested: qty,
            }
            .into());
        }

        sqlx::query(
            r#"
            UPDATE product_stock
            SET reserved_qty = reserved_qty + $4, updated_utc = NOW()
            WHERE tenant_id = $1 AND store_id = $2 AND product_id = $3
            "#,
        )
        .bind(tenant_id)
        .bind(store_id)
        .bind(product.product_id)
        .bind(qty)
        .execute(conn)
        .await
        .map_err(|e| db_err("Failed to reserve stock", e))?;

        Ok(())
    }

    /// Give back a hold, floored at zero.
    pub(crate) async fn release(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        store_id: Uuid,
        product_id: Uuid,
        qty: i64,
    ) -> Result<(), AppError> {
        let Some(_stock) = Self::lock(conn, tenant_id, store_id, product_id).await? else {
            return Ok(());
        };

        sqlx::query(
            r#"
            UPDATE product_stock
            SET reserved_qty = GREATEST(reserved_qty - $4, 0), updated_utc = NOW()
            WHERE tenant_id = $1 AND store_id = $2 AND product_id = $3
            "#,
        )
        .bind(tenant_id)
        .bind(store_id)
        .bind(product_id)
        .bind(qty)
        .execute(conn)
        .await
        .map_err(|e| db_err("Failed to release stock", e))?;

        Ok(())
    }

    /// Physically consume `qty` when a sale item converts to consumed.
    /// With `consume_reservation`, a previously held reservation is
    /// surrendered along with the on-hand quantity.
    pub(crate) async fn decrement(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        store_id: Uuid,
        product_id: Uuid,
        qty: i64,
        consume_reservation: bool,
    ) -> Result<(), AppError> {
        let stock = Self::lock(conn, tenant_id, store_id, product_id)
            .await?
            .ok_or(LedgerError::InsufficientStock {
                product_id,
                available: 0,
                requested: qty,
            })?;

        let new_quantity = stock.quantity - qty;
        let new_reserved = if consume_reservation {
            (stock.reserved_qty - qty).max(0)
        } else {
            stock.reserved_qty
        };

        if new_quantity < new_reserved || new_quantity < 0 {
            return Err(LedgerError::InsufficientStock {
                product_id,
                available: stock.available(),
                requested: qty,
            }
            .into());
        }

        sqlx::query(
            r#"
            UPDATE product_stock
            SET quantity = $4, reserved_qty = $5, updated_utc = NOW()
            WHERE tenant_id = $1 AND store_id = $2 AND product_id = $3
            "#,
        )
        .bind(tenant_id)
        .bind(store_id)
        .bind(product_id)
        .bind(new_quantity)
        .bind(new_reserved)
        .execute(conn)
        .await
        .map_err(|e| db_err("Failed to decrement stock", e))?;

        Ok(())
    }

    /// Lock the stock row for update, if it exists.
    async fn lock(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        store_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<ProductStock>, AppError> {
        sqlx::query_as::<_, ProductStock>(
            r#"
            SELECT tenant_id, store_id, product_id, quantity, reserved_qty, min_qty, updated_utc
            FROM product_stock
            WHERE tenant_id = $1 AND store_id = $2 AND product_id = $3
            FOR UPDATE
            "#,
        )
        .bind(tenant_id)
        .bind(store_id)
        .bind(product_id)
        .fetch_optional(conn)
        .await
        .map_err(|e| db_err("Failed to lock stock row", e))
    }

    /// Lock the stock row, creating it lazily on first movement. Losers of
    /// the creation race fall through to the locked read.
    async fn lock_or_create(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        store_id: Uuid,
        product_id: Uuid,
    ) -> Result<ProductStock, AppError> {
        sqlx::query(
            r#"
            INSERT INTO product_stock (tenant_id, store_id, product_id, quantity, reserved_qty, min_qty)
            VALUES ($1, $2, $3, 0, 0, 0)
            ON CONFLICT (tenant_id, store_id, product_id) DO NOTHING
            "#,
        )
        .bind(tenant_id)
        .bind(store_id)
        .bind(product_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| db_err("Failed to ensure stock row", e))?;

        let stock = Self::lock(conn, tenant_id, store_id, product_id)
            .await?
            .ok_or_else(|| {
                AppError::DatabaseError(anyhow::anyhow!("Stock row vanished after creation"))
            })?;

        Ok(stock)
    }
}

//! Database service for commerce-service.

use crate::error::LedgerError;
use crate::models::{CreateProduct, Product};
use crate::services::metrics::{DB_QUERY_DURATION, ERRORS_TOTAL};
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::PgConnection;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Postgres error code for "lock not available" (lock_timeout expired).
const LOCK_NOT_AVAILABLE: &str = "55P03";

/// Map a sqlx error into the transport error taxonomy. Lock-acquisition
/// timeouts are the transient category callers may retry; everything else
/// is a database error.
pub(crate) fn db_err(action: &str, e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(ref db) = e {
        if db.code().as_deref() == Some(LOCK_NOT_AVAILABLE) {
            ERRORS_TOTAL.with_label_values(&["transient"]).inc();
            return AppError::Transient(anyhow::anyhow!("{}: lock wait timed out", action));
        }
    }
    ERRORS_TOTAL.with_label_values(&["db_error"]).inc();
    AppError::DatabaseError(anyhow::anyhow!("{}: {}", action, e))
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "commerce-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Product Catalog Operations
    // -------------------------------------------------------------------------

    /// Register a product.
    #[instrument(skip(self, input), fields(tenant_id = %tenant_id, sku = %input.sku))]
    pub async fn create_product(
        &self,
        tenant_id: Uuid,
        input: &CreateProduct,
    ) -> Result<Product, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_product"])
            .start_timer();

        let product_id = Uuid::new_v4();
        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (product_id, tenant_id, sku, name, unit_price, cost_price, track_stock, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE)
            RETURNING product_id, tenant_id, sku, name, unit_price, cost_price, track_stock, active, created_utc
            "#,
        )
        .bind(product_id)
        .bind(tenant_id)
        .bind(&input.sku)
        .bind(&input.name)
        .bind(input.unit_price)
        .bind(input.cost_price)
        .bind(input.track_stock)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Product with SKU '{}' already exists for tenant",
                    input.sku
                ))
            }
            _ => db_err("Failed to create product", e),
        })?;

        timer.observe_duration();

        info!(product_id = %product.product_id, sku = %product.sku, "Product created");

        Ok(product)
    }

    /// Get a product by ID.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_id = %product_id))]
    pub async fn get_product(
        &self,
        tenant_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<Product>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_product"])
            .start_timer();

        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT product_id, tenant_id, sku, name, unit_price, cost_price, track_stock, active, created_utc
            FROM products
            WHERE tenant_id = $1 AND product_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("Failed to get product", e))?;

        timer.observe_duration();

        Ok(product)
    }

    /// Same lookup on an open transaction, for callers composing larger
    /// units of work.
    pub(crate) async fn get_product_on(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<Product>, AppError> {
        sqlx::query_as::<_, Product>(
            r#"
            SELECT product_id, tenant_id, sku, name, unit_price, cost_price, track_stock, active, created_utc
            FROM products
            WHERE tenant_id = $1 AND product_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(product_id)
        .fetch_optional(conn)
        .await
        .map_err(|e| db_err("Failed to get product", e))
    }

    /// Delete a product.
    ///
    /// A product that has ever appeared on a non-cancelled sale cannot be
    /// deleted; a product whose only footprint is a stock row can, and the
    /// stock row goes with it.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_id = %product_id))]
    pub async fn delete_product(&self, tenant_id: Uuid, product_id: Uuid) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_product"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("Failed to begin transaction", e))?;

        let referenced: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM sale_items si
                JOIN sales s ON s.sale_id = si.sale_id
                WHERE si.tenant_id = $1 AND si.product_id = $2 AND s.status <> 'cancelled'
            )
            "#,
        )
        .bind(tenant_id)
        .bind(product_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_err("Failed to check product references", e))?;

        if referenced {
            return Err(LedgerError::ReferentialIntegrity {
                entity: "product",
                id: product_id,
                referenced_by: "a sale",
            }
            .into());
        }

        let result = sqlx::query(
            r#"
            DELETE FROM products
            WHERE tenant_id = $1 AND product_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(product_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_err("Failed to delete product", e))?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::NotFound {
                entity: "product",
                id: product_id,
            }
            .into());
        }

        tx.commit()
            .await
            .map_err(|e| db_err("Failed to commit transaction", e))?;

        timer.observe_duration();

        info!(product_id = %product_id, "Product deleted");

        Ok(())
    }
}

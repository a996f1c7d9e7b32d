//! Low-stock alert detection.
//!
//! Detection only: one alert row per (store, product, day). Delivery of
//! notifications is a downstream consumer's job.

use crate::models::StockAlert;
use crate::services::database::{db_err, Database};
use crate::services::metrics::DB_QUERY_DURATION;
use chrono::NaiveDate;
use service_core::error::AppError;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Clone)]
pub struct StockAlerts {
    db: Database,
}

impl StockAlerts {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Scan tracked stock in a store and record a low-stock alert for every
    /// product with `quantity < min_qty`. Idempotent per day: re-running
    /// creates no duplicate rows.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, store_id = %store_id))]
    pub async fn sync_low_stock(&self, tenant_id: Uuid, store_id: Uuid) -> Result<u64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["sync_low_stock"])
            .start_timer();

        let result = sqlx::query(
            r#"
            INSERT INTO stock_alerts (alert_id, tenant_id, store_id, product_id, alert_date, quantity, min_qty)
            SELECT gen_random_uuid(), ps.tenant_id, ps.store_id, ps.product_id, CURRENT_DATE,
                   ps.quantity, ps.min_qty
            FROM product_stock ps
            WHERE ps.tenant_id = $1 AND ps.store_id = $2 AND ps.quantity < ps.min_qty
            ON CONFLICT (tenant_id, store_id, product_id, alert_date) DO NOTHING
            "#,
        )
        .bind(tenant_id)
        .bind(store_id)
        .execute(self.db.pool())
        .await
        .map_err(|e| db_err("Failed to sync low-stock alerts", e))?;

        timer.observe_duration();

        let created = result.rows_affected();
        if created > 0 {
            info!(store_id = %store_id, created = created, "Low-stock alerts recorded");
        }

        Ok(created)
    }

    /// List alerts for a store, optionally for one day.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, store_id = %store_id))]
    pub async fn list_alerts(
        &self,
        tenant_id: Uuid,
        store_id: Uuid,
        alert_date: Option<NaiveDate>,
    ) -> Result<Vec<StockAlert>, AppError> {
        let alerts = sqlx::query_as::<_, StockAlert>(
            r#"
            SELECT alert_id, tenant_id, store_id, product_id, alert_date, quantity, min_qty, created_utc
            FROM stock_alerts
            WHERE tenant_id = $1 AND store_id = $2
              AND ($3::date IS NULL OR alert_date = $3)
            ORDER BY created_utc DESC
            "#,
        )
        .bind(tenant_id)
        .bind(store_id)
        .bind(alert_date)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| db_err("Failed to list alerts", e))?;

        Ok(alerts)
    }
}

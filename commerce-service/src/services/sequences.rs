//! Gap-free document sequence generator.

use crate::models::{format_document_number, DocumentSequence};
use crate::services::database::db_err;
use service_core::error::AppError;
use sqlx::PgConnection;
use uuid::Uuid;

/// Issues monotonically increasing document numbers per
/// (store, prefix, period) key.
///
/// The generator runs inside the caller's transaction so a rolled-back
/// document never burns a number. Issuance is serialized per key by the
/// exclusive row lock; independent keys proceed in parallel.
pub struct SequenceGenerator;

impl SequenceGenerator {
    /// Issue the next number for the key and return it formatted as
    /// `PREFIX-STORECODE-PERIOD-NNNNNN`.
    ///
    /// The row is created on first use for a new period; losers of the
    /// creation race fall through the `ON CONFLICT DO NOTHING` to the
    /// locked read and receive distinct subsequent numbers.
    pub async fn next(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        store_code: &str,
        prefix: &str,
        period_key: &str,
    ) -> Result<String, AppError> {
        sqlx::query(
            r#"
            INSERT INTO document_sequences (tenant_id, store_code, prefix, period_key, next_number)
            VALUES ($1, $2, $3, $4, 1)
            ON CONFLICT (tenant_id, store_code, prefix, period_key) DO NOTHING
            "#,
        )
        .bind(tenant_id)
        .bind(store_code)
        .bind(prefix)
        .bind(period_key)
        .execute(&mut *conn)
        .await
        .map_err(|e| db_err("Failed to ensure sequence row", e))?;

        let seq = sqlx::query_as::<_, DocumentSequence>(
            r#"
            SELECT tenant_id, store_code, prefix, period_key, next_number
            FROM document_sequences
            WHERE tenant_id = $1 AND store_code = $2 AND prefix = $3 AND period_key = $4
            FOR UPDATE
            "#,
        )
        .bind(tenant_id)
        .bind(store_code)
        .bind(prefix)
        .bind(period_key)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| db_err("Failed to lock sequence row", e))?;

        let issued = seq.next_number;

        sqlx::query(
            r#"
            UPDATE document_sequences
            SET next_number = next_number + 1
            WHERE tenant_id = $1 AND store_code = $2 AND prefix = $3 AND period_key = $4
            "#,
        )
        .bind(tenant_id)
        .bind(store_code)
        .bind(prefix)
        .bind(period_key)
        .execute(&mut *conn)
        .await
        .map_err(|e| db_err("Failed to advance sequence", e))?;

        Ok(format_document_number(prefix, store_code, period_key, issued))
    }
}

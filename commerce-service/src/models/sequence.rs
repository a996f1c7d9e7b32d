//! Document sequence row and number formatting.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Monotonic counter per (store, prefix, period). Mutated only under an
/// exclusive row lock by the sequence generator.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DocumentSequence {
    pub tenant_id: Uuid,
    pub store_code: String,
    pub prefix: String,
    pub period_key: String,
    pub next_number: i64,
}

/// Format a document number as `PREFIX-STORECODE-PERIOD-NNNNNN`.
///
/// This exact shape appears on printed documents and is a durable external
/// contract.
pub fn format_document_number(
    prefix: &str,
    store_code: &str,
    period_key: &str,
    number: i64,
) -> String {
    format!("{}-{}-{}-{:06}", prefix, store_code, period_key, number)
}

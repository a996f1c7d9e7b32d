//! Cash shift model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Shift status: `Open -> Closed`, terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftStatus {
    Open,
    Closed,
}

impl ShiftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftStatus::Open => "open",
            ShiftStatus::Closed => "closed",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "closed" => ShiftStatus::Closed,
            _ => ShiftStatus::Open,
        }
    }
}

/// A cashier's cash-handling session. Totals accumulate as payments post
/// and are always mutated against a freshly locked row, never a copy the
/// caller has been holding.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CashShift {
    pub shift_id: Uuid,
    pub tenant_id: Uuid,
    pub store_id: Uuid,
    pub cashier_id: Uuid,
    pub status: String,
    pub opening_float: Decimal,
    pub total_sales: Decimal,
    pub total_cash_payments: Decimal,
    /// `opening_float + total_cash_payments`, maintained on every cash payment.
    pub expected_cash: Decimal,
    pub closing_cash: Option<Decimal>,
    pub variance: Option<Decimal>,
    pub opened_utc: DateTime<Utc>,
    pub closed_utc: Option<DateTime<Utc>>,
}

impl CashShift {
    pub fn parsed_status(&self) -> ShiftStatus {
        ShiftStatus::from_string(&self.status)
    }

    pub fn is_open(&self) -> bool {
        self.parsed_status() == ShiftStatus::Open
    }

    /// `variance = counted closing cash - expected cash`.
    pub fn variance_against(&self, closing_cash: Decimal) -> Decimal {
        closing_cash - self.expected_cash
    }
}

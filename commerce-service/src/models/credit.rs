//! Customer credit account and its append-only entry log.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Kind of balance-changing event on a customer account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditEntryType {
    /// Credit extended at the point of sale; stored amount is positive.
    SaleOnCredit,
    /// Repayment from the customer; stored amount is negative.
    CreditPayment,
    /// Manual or refund-driven correction; sign follows the correction.
    Adjustment,
}

impl CreditEntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditEntryType::SaleOnCredit => "sale_on_credit",
            CreditEntryType::CreditPayment => "credit_payment",
            CreditEntryType::Adjustment => "adjustment",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "credit_payment" => CreditEntryType::CreditPayment,
            "adjustment" => CreditEntryType::Adjustment,
            _ => CreditEntryType::SaleOnCredit,
        }
    }
}

/// Customer credit account. `balance` is a derived cache: it must always
/// equal the `balance_after` of the account's latest ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CustomerAccount {
    pub account_id: Uuid,
    pub tenant_id: Uuid,
    pub store_id: Uuid,
    pub customer_id: Uuid,
    pub credit_limit: Decimal,
    pub balance: Decimal,
    pub created_utc: DateTime<Utc>,
}

impl CustomerAccount {
    pub fn available_credit(&self) -> Decimal {
        self.credit_limit - self.balance
    }

    /// Whether `amount` of new credit fits under the limit. The limit is
    /// enforced when extending credit, never retroactively.
    pub fn can_extend(&self, amount: Decimal) -> bool {
        amount <= self.available_credit()
    }
}

/// Immutable record of one balance change. Never edited or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CreditLedgerEntry {
    pub entry_id: Uuid,
    pub tenant_id: Uuid,
    pub account_id: Uuid,
    pub entry_type: String,
    /// Signed: positive extends credit, negative repays it.
    pub amount: Decimal,
    /// Account balance immediately after applying `amount`.
    pub balance_after: Decimal,
    pub sale_id: Option<Uuid>,
    pub reference: Option<String>,
    pub recorded_by: Uuid,
    pub created_utc: DateTime<Utc>,
}

/// Input for opening a customer account (including the synthetic walk-in
/// default customer, which is an ordinary row).
#[derive(Debug, Clone)]
pub struct OpenAccount {
    pub store_id: Uuid,
    pub customer_id: Uuid,
    pub credit_limit: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(limit: i64, balance: i64) -> CustomerAccount {
        CustomerAccount {
            account_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            store_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            credit_limit: Decimal::from(limit),
            balance: Decimal::from(balance),
            created_utc: Utc::now(),
        }
    }

    #[test]
    fn availability_respects_limit() {
        let acct = account(500_000, 0);
        assert!(acct.can_extend(Decimal::from(400_000)));
        assert!(!acct.can_extend(Decimal::from(600_000)));
    }

    #[test]
    fn availability_shrinks_with_balance() {
        let acct = account(500_000, 450_000);
        assert_eq!(acct.available_credit(), Decimal::from(50_000));
        assert!(acct.can_extend(Decimal::from(50_000)));
        assert!(!acct.can_extend(Decimal::from(50_001)));
    }

    #[test]
    fn entry_type_round_trips() {
        for t in [
            CreditEntryType::SaleOnCredit,
            CreditEntryType::CreditPayment,
            CreditEntryType::Adjustment,
        ] {
            assert_eq!(CreditEntryType::from_string(t.as_str()), t);
        }
    }
}

//! Sale, sale item, payment and refund models.
//!
//! Line items use the snapshot pattern: name and prices are frozen at the
//! moment the item is added so the sale history survives later catalog edits.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Sale lifecycle status.
///
/// `Draft -> PendingPayment -> {PartiallyPaid -> Paid}`, with `Cancelled`
/// reachable from everything before `Paid` and `Refunded` only from `Paid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Draft,
    PendingPayment,
    PartiallyPaid,
    Paid,
    Cancelled,
    Refunded,
}

impl SaleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Draft => "draft",
            SaleStatus::PendingPayment => "pending_payment",
            SaleStatus::PartiallyPaid => "partially_paid",
            SaleStatus::Paid => "paid",
            SaleStatus::Cancelled => "cancelled",
            SaleStatus::Refunded => "refunded",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "pending_payment" => SaleStatus::PendingPayment,
            "partially_paid" => SaleStatus::PartiallyPaid,
            "paid" => SaleStatus::Paid,
            "cancelled" => SaleStatus::Cancelled,
            "refunded" => SaleStatus::Refunded,
            _ => SaleStatus::Draft,
        }
    }

    /// Items can only be added, changed or removed while the sale is a draft.
    pub fn is_mutable(&self) -> bool {
        matches!(self, SaleStatus::Draft)
    }

    /// Payments apply between submission and full payment.
    pub fn accepts_payment(&self) -> bool {
        matches!(self, SaleStatus::PendingPayment | SaleStatus::PartiallyPaid)
    }

    /// Cancellation is forbidden once the sale is fully paid.
    pub fn can_cancel(&self) -> bool {
        matches!(
            self,
            SaleStatus::Draft | SaleStatus::PendingPayment | SaleStatus::PartiallyPaid
        )
    }
}

/// Payment tender method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Credit,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Credit => "credit",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "card" => PaymentMethod::Card,
            "credit" => PaymentMethod::Credit,
            _ => PaymentMethod::Cash,
        }
    }
}

/// Sale document.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Sale {
    pub sale_id: Uuid,
    pub tenant_id: Uuid,
    pub store_id: Uuid,
    /// Store code snapshot used for document numbers.
    pub store_code: String,
    pub seller_id: Uuid,
    pub customer_id: Option<Uuid>,
    pub invoice_number: Option<String>,
    pub status: String,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub amount_paid: Decimal,
    pub amount_due: Decimal,
    pub is_credit_sale: bool,
    /// When set, stock is reserved at add-item time and consumed at payment;
    /// when unset, stock is decremented directly at the moment of full payment.
    pub reserve_stock: bool,
    pub cancel_reason: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub submitted_utc: Option<DateTime<Utc>>,
    pub paid_utc: Option<DateTime<Utc>>,
    pub cancelled_utc: Option<DateTime<Utc>>,
    pub refunded_utc: Option<DateTime<Utc>>,
}

impl Sale {
    pub fn parsed_status(&self) -> SaleStatus {
        SaleStatus::from_string(&self.status)
    }
}

/// A line on a sale. `product_id` is null for ad-hoc service lines.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SaleItem {
    pub item_id: Uuid,
    pub sale_id: Uuid,
    pub tenant_id: Uuid,
    pub product_id: Option<Uuid>,
    pub name_snapshot: String,
    pub unit_price: Decimal,
    pub cost_price: Option<Decimal>,
    pub quantity: i64,
    pub discount: Decimal,
    pub line_total: Decimal,
    pub created_utc: DateTime<Utc>,
}

impl SaleItem {
    /// `line_total = unit_price * quantity - discount`.
    pub fn compute_line_total(unit_price: Decimal, quantity: i64, discount: Decimal) -> Decimal {
        unit_price * Decimal::from(quantity) - discount
    }
}

/// Payment applied to a sale within a cash shift.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub payment_id: Uuid,
    pub tenant_id: Uuid,
    pub sale_id: Uuid,
    pub shift_id: Uuid,
    pub cashier_id: Uuid,
    pub method: String,
    pub amount: Decimal,
    pub reference: Option<String>,
    pub created_utc: DateTime<Utc>,
}

/// Refund against a paid sale. Created at most once per refund action and
/// never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Refund {
    pub refund_id: Uuid,
    pub tenant_id: Uuid,
    pub sale_id: Uuid,
    pub amount: Decimal,
    pub method: String,
    pub approved_by: Uuid,
    pub processed_by: Uuid,
    pub created_utc: DateTime<Utc>,
}

/// Input for creating a draft sale.
#[derive(Debug, Clone)]
pub struct CreateSale {
    pub store_id: Uuid,
    pub store_code: String,
    pub customer_id: Option<Uuid>,
    pub is_credit_sale: bool,
    pub reserve_stock: bool,
    pub tax: Decimal,
}

/// Input for adding a line to a draft sale.
///
/// A unit-price override is honored only when the caller presents the
/// pre-authorized override flag; the grant itself is checked upstream
/// against the sale's own store.
#[derive(Debug, Clone)]
pub struct AddItem {
    pub product_id: Option<Uuid>,
    /// Required for ad-hoc lines; ignored when a product is referenced.
    pub description: Option<String>,
    pub quantity: i64,
    pub unit_price_override: Option<Decimal>,
    pub price_override_authorized: bool,
    pub discount: Decimal,
}

/// Input for the payment-processor entry point.
#[derive(Debug, Clone)]
pub struct RecordPayment {
    pub shift_id: Uuid,
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub reference: Option<String>,
}

/// Derived sale totals. `recalculate` persists exactly these values, so
/// recomputing from an unchanged item set is idempotent by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleTotals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl SaleTotals {
    /// `subtotal = sum(unit_price * qty)`, `discount = sum(line discounts)`,
    /// `total = subtotal - discount + tax`.
    pub fn from_items(items: &[SaleItem], tax: Decimal) -> Self {
        let subtotal: Decimal = items
            .iter()
            .map(|i| i.unit_price * Decimal::from(i.quantity))
            .sum();
        let discount: Decimal = items.iter().map(|i| i.discount).sum();
        SaleTotals {
            subtotal,
            discount,
            tax,
            total: subtotal - discount + tax,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(unit_price: i64, quantity: i64, discount: i64) -> SaleItem {
        SaleItem {
            item_id: Uuid::new_v4(),
            sale_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            product_id: None,
            name_snapshot: "test".to_string(),
            unit_price: Decimal::from(unit_price),
            cost_price: None,
            quantity,
            discount: Decimal::from(discount),
            line_total: SaleItem::compute_line_total(
                Decimal::from(unit_price),
                quantity,
                Decimal::from(discount),
            ),
            created_utc: Utc::now(),
        }
    }

    #[test]
    fn line_total_subtracts_discount() {
        let total = SaleItem::compute_line_total(Decimal::from(2500), 3, Decimal::from(500));
        assert_eq!(total, Decimal::from(7000));
    }

    #[test]
    fn totals_from_items() {
        let items = vec![item(1000, 2, 0), item(500, 4, 200)];
        let totals = SaleTotals::from_items(&items, Decimal::from(300));

        assert_eq!(totals.subtotal, Decimal::from(4000));
        assert_eq!(totals.discount, Decimal::from(200));
        assert_eq!(totals.total, Decimal::from(4100));
    }

    #[test]
    fn totals_recomputation_is_idempotent() {
        let items = vec![item(1999, 3, 100)];
        let first = SaleTotals::from_items(&items, Decimal::ZERO);
        let second = SaleTotals::from_items(&items, Decimal::ZERO);
        assert_eq!(first, second);
    }

    #[test]
    fn totals_of_empty_sale_are_zero() {
        let totals = SaleTotals::from_items(&[], Decimal::ZERO);
        assert_eq!(totals.total, Decimal::ZERO);
        assert_eq!(totals.subtotal, Decimal::ZERO);
    }

    #[test]
    fn status_round_trips_through_string() {
        for status in [
            SaleStatus::Draft,
            SaleStatus::PendingPayment,
            SaleStatus::PartiallyPaid,
            SaleStatus::Paid,
            SaleStatus::Cancelled,
            SaleStatus::Refunded,
        ] {
            assert_eq!(SaleStatus::from_string(status.as_str()), status);
        }
    }

    #[test]
    fn status_predicates_follow_lifecycle() {
        assert!(SaleStatus::Draft.is_mutable());
        assert!(!SaleStatus::PendingPayment.is_mutable());

        assert!(SaleStatus::PendingPayment.accepts_payment());
        assert!(SaleStatus::PartiallyPaid.accepts_payment());
        assert!(!SaleStatus::Paid.accepts_payment());
        assert!(!SaleStatus::Draft.accepts_payment());

        assert!(SaleStatus::Draft.can_cancel());
        assert!(SaleStatus::PartiallyPaid.can_cancel());
        assert!(!SaleStatus::Paid.can_cancel());
        assert!(!SaleStatus::Refunded.can_cancel());
    }
}

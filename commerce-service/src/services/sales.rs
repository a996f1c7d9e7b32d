//! Sale ledger: the sale state machine and payment orchestration.
//!
//! Every public operation is one transaction. The payment path touches four
//! counter-bearing rows and locks them in a fixed order (sale, shift,
//! account, stock) so concurrent payments cannot deadlock each other.

use crate::error::LedgerError;
use crate::models::{
    AddItem, CreateSale, Payment, PaymentMethod, RecordPayment, Refund, Sale, SaleItem,
    SaleStatus, SaleTotals,
};
use crate::services::credit::CreditLedger;
use crate::services::database::{db_err, Database};
use crate::services::events::{DomainEvent, EventOutbox};
use crate::services::metrics::{DB_QUERY_DURATION, LEDGER_OPS_TOTAL};
use crate::services::sequences::SequenceGenerator;
use crate::services::shifts::CashShiftLedger;
use crate::services::stock::StockLedger;
use chrono::Utc;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::PgConnection;
use tracing::{info, instrument};
use uuid::Uuid;

/// Document prefix for sale invoices.
const INVOICE_PREFIX: &str = "FA";

const SALE_COLUMNS: &str = r#"sale_id, tenant_id, store_id, store_code, seller_id, customer_id,
    invoice_number, status, subtotal, discount, tax, total, amount_paid, amount_due,
    is_credit_sale, reserve_stock, cancel_reason,
    created_utc, submitted_utc, paid_utc, cancelled_utc, refunded_utc"#;

const ITEM_COLUMNS: &str = r#"item_id, sale_id, tenant_id, product_id, name_snapshot,
    unit_price, cost_price, quantity, discount, line_total, created_utc"#;

#[derive(Clone)]
pub struct SaleLedger {
    db: Database,
    events: EventOutbox,
}

impl SaleLedger {
    pub fn new(db: Database, events: EventOutbox) -> Self {
        Self { db, events }
    }

    // -------------------------------------------------------------------------
    // Draft lifecycle
    // -------------------------------------------------------------------------

    /// Create a new draft sale with zero totals and no items.
    #[instrument(skip(self, input), fields(tenant_id = %tenant_id, seller_id = %seller_id))]
    pub async fn create_sale(
        &self,
        tenant_id: Uuid,
        seller_id: Uuid,
        input: &CreateSale,
    ) -> Result<Sale, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_sale"])
            .start_timer();

        let sale_id = Uuid::new_v4();
        let sale = sqlx::query_as::<_, Sale>(&format!(
            r#"
            INSERT INTO sales (
                sale_id, tenant_id, store_id, store_code, seller_id, customer_id,
                status, tax, is_credit_sale, reserve_stock
            )
            VALUES ($1, $2, $3, $4, $5, $6, 'draft', $7, $8, $9)
            RETURNING {SALE_COLUMNS}
            "#
        ))
        .bind(sale_id)
        .bind(tenant_id)
        .bind(input.store_id)
        .bind(&input.store_code)
        .bind(seller_id)
        .bind(input.customer_id)
        .bind(input.tax)
        .bind(input.is_credit_sale)
        .bind(input.reserve_stock)
        .fetch_one(self.db.pool())
        .await
        .map_err(|e| db_err("Failed to create sale", e))?;

        timer.observe_duration();

        info!(sale_id = %sale.sale_id, "Draft sale created");

        Ok(sale)
    }

    /// Add a line to a draft sale, reserving stock for tracked products
    /// when the sale is in reservation mode.
    ///
    /// A unit-price override on a catalog product requires the
    /// pre-authorized override flag; ad-hoc lines simply carry the price
    /// the caller names.
    #[instrument(skip(self, input), fields(tenant_id = %tenant_id, sale_id = %sale_id, actor = %actor))]
    pub async fn add_item(
        &self,
        tenant_id: Uuid,
        sale_id: Uuid,
        actor: Uuid,
        input: &AddItem,
    ) -> Result<SaleItem, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["add_item"])
            .start_timer();

        if input.quantity <= 0 {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Quantity must be positive"
            )));
        }

        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(|e| db_err("Failed to begin transaction", e))?;

        let sale = Self::lock_sale(&mut tx, tenant_id, sale_id).await?;
        let status = sale.parsed_status();
        if !status.is_mutable() {
            return Err(LedgerError::InvalidState {
                entity: "sale",
                id: sale_id,
                state: sale.status.clone(),
                operation: "add item",
            }
            .into());
        }

        let (name_snapshot, unit_price, cost_price) = match input.product_id {
            Some(product_id) => {
                let product = Database::get_product_on(&mut tx, tenant_id, product_id)
                    .await?
                    .ok_or(LedgerError::NotFound {
                        entity: "product",
                        id: product_id,
                    })?;

                let unit_price = match input.unit_price_override {
                    Some(price) => {
                        if !input.price_override_authorized {
                            return Err(LedgerError::PriceOverrideDenied { sale_id }.into());
                        }
                        price
                    }
                    None => product.unit_price,
                };

                if sale.reserve_stock && product.track_stock {
                    StockLedger::reserve(
                        &mut tx,
                        tenant_id,
                        sale.store_id,
                        &product,
                        input.quantity,
                    )
                    .await?;
                }

                (product.name.clone(), unit_price, product.cost_price)
            }
            None => {
                let name = input.description.clone().ok_or_else(|| {
                    AppError::BadRequest(anyhow::anyhow!("Ad-hoc line requires a description"))
                })?;
                let unit_price = input.unit_price_override.ok_or_else(|| {
                    AppError::BadRequest(anyhow::anyhow!("Ad-hoc line requires a unit price"))
                })?;
                (name, unit_price, None)
            }
        };

        let line_total =
            SaleItem::compute_line_total(unit_price, input.quantity, input.discount);

        let item = sqlx::query_as::<_, SaleItem>(&format!(
            r#"
            INSERT INTO sale_items (
                item_id, sale_id, tenant_id, product_id, name_snapshot,
                unit_price, cost_price, quantity, discount, line_total
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(sale_id)
        .bind(tenant_id)
        .bind(input.product_id)
        .bind(&name_snapshot)
        .bind(unit_price)
        .bind(cost_price)
        .bind(input.quantity)
        .bind(input.discount)
        .bind(line_total)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_err("Failed to add sale item", e))?;

        Self::recalculate_on(&mut tx, tenant_id, &sale).await?;

        tx.commit()
            .await
            .map_err(|e| db_err("Failed to commit transaction", e))?;

        timer.observe_duration();

        info!(sale_id = %sale_id, item_id = %item.item_id, quantity = input.quantity, "Sale item added");

        Ok(item)
    }

    /// Change the quantity on a draft line, adjusting the stock reservation
    /// by the exact delta.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, sale_id = %sale_id, item_id = %item_id, actor = %actor))]
    pub async fn update_quantity(
        &self,
        tenant_id: Uuid,
        sale_id: Uuid,
        item_id: Uuid,
        actor: Uuid,
        quantity: i64,
    ) -> Result<SaleItem, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_quantity"])
            .start_timer();

        if quantity <= 0 {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Quantity must be positive; remove the item instead"
            )));
        }

        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(|e| db_err("Failed to begin transaction", e))?;

        let sale = Self::lock_sale(&mut tx, tenant_id, sale_id).await?;
        if !sale.parsed_status().is_mutable() {
            return Err(LedgerError::InvalidState {
                entity: "sale",
                id: sale_id,
                state: sale.status.clone(),
                operation: "update item",
            }
            .into());
        }

        let item = Self::fetch_item(&mut tx, tenant_id, sale_id, item_id).await?;
        let delta = quantity - item.quantity;

        if delta != 0 {
            if let Some(product_id) = item.product_id {
                let product = Database::get_product_on(&mut tx, tenant_id, product_id)
                    .await?
                    .ok_or(LedgerError::NotFound {
                        entity: "product",
                        id: product_id,
                    })?;

                if sale.reserve_stock && product.track_stock {
                    if delta > 0 {
                        StockLedger::reserve(&mut tx, tenant_id, sale.store_id, &product, delta)
                            .await?;
                    } else {
                        StockLedger::release(
                            &mut tx,
                            tenant_id,
                            sale.store_id,
                            product_id,
                            -delta,
                        )
                        .await?;
                    }
                }
            }
        }

        let line_total = SaleItem::compute_line_total(item.unit_price, quantity, item.discount);

        let updated = sqlx::query_as::<_, SaleItem>(&format!(
            r#"
            UPDATE sale_items
            SET quantity = $4, line_total = $5
            WHERE tenant_id = $1 AND sale_id = $2 AND item_id = $3
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(tenant_id)
        .bind(sale_id)
        .bind(item_id)
        .bind(quantity)
        .bind(line_total)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_err("Failed to update sale item", e))?;

        Self::recalculate_on(&mut tx, tenant_id, &sale).await?;

        tx.commit()
            .await
            .map_err(|e| db_err("Failed to commit transaction", e))?;

        timer.observe_duration();

        Ok(updated)
    }

    /// Remove a line from a draft sale, releasing its reservation.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, sale_id = %sale_id, item_id = %item_id, actor = %actor))]
    pub async fn remove_item(
        &self,
        tenant_id: Uuid,
        sale_id: Uuid,
        item_id: Uuid,
        actor: Uuid,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["remove_item"])
            .start_timer();

        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(|e| db_err("Failed to begin transaction", e))?;

        let sale = Self::lock_sale(&mut tx, tenant_id, sale_id).await?;
        if !sale.parsed_status().is_mutable() {
            return Err(LedgerError::InvalidState {
                entity: "sale",
                id: sale_id,
                state: sale.status.clone(),
                operation: "remove item",
            }
            .into());
        }

        let item = Self::fetch_item(&mut tx, tenant_id, sale_id, item_id).await?;

        if let Some(product_id) = item.product_id {
            if sale.reserve_stock {
                let product = Database::get_product_on(&mut tx, tenant_id, product_id).await?;
                if product.map(|p| p.track_stock).unwrap_or(false) {
                    StockLedger::release(&mut tx, tenant_id, sale.store_id, product_id, item.quantity)
                        .await?;
                }
            }
        }

        sqlx::query(
            r#"
            DELETE FROM sale_items
            WHERE tenant_id = $1 AND sale_id = $2 AND item_id = $3
            "#,
        )
        .bind(tenant_id)
        .bind(sale_id)
        .bind(item_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_err("Failed to remove sale item", e))?;

        Self::recalculate_on(&mut tx, tenant_id, &sale).await?;

        tx.commit()
            .await
            .map_err(|e| db_err("Failed to commit transaction", e))?;

        timer.observe_duration();

        info!(sale_id = %sale_id, item_id = %item_id, "Sale item removed");

        Ok(())
    }

    /// Recompute and persist the sale totals from its current items.
    /// Idempotent: an unchanged item set yields identical totals.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, sale_id = %sale_id))]
    pub async fn recalculate(&self, tenant_id: Uuid, sale_id: Uuid) -> Result<Sale, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["recalculate"])
            .start_timer();

        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(|e| db_err("Failed to begin transaction", e))?;

        let sale = Self::lock_sale(&mut tx, tenant_id, sale_id).await?;
        if !sale.parsed_status().is_mutable() {
            return Err(LedgerError::InvalidState {
                entity: "sale",
                id: sale_id,
                state: sale.status.clone(),
                operation: "recalculate",
            }
            .into());
        }

        let updated = Self::recalculate_on(&mut tx, tenant_id, &sale).await?;

        tx.commit()
            .await
            .map_err(|e| db_err("Failed to commit transaction", e))?;

        timer.observe_duration();

        Ok(updated)
    }

    // -------------------------------------------------------------------------
    // Submission and payment
    // -------------------------------------------------------------------------

    /// Submit a draft sale to the cashier queue: totals are finalized and
    /// the invoice number is assigned exactly once.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, sale_id = %sale_id, actor = %actor))]
    pub async fn submit(&self, tenant_id: Uuid, sale_id: Uuid, actor: Uuid) -> Result<Sale, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["submit_sale"])
            .start_timer();

        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(|e| db_err("Failed to begin transaction", e))?;

        let sale = Self::lock_sale(&mut tx, tenant_id, sale_id).await?;
        if sale.parsed_status() != SaleStatus::Draft {
            return Err(LedgerError::InvalidState {
                entity: "sale",
                id: sale_id,
                state: sale.status.clone(),
                operation: "submit",
            }
            .into());
        }

        let items = Self::fetch_items(&mut tx, tenant_id, sale_id).await?;
        if items.is_empty() {
            return Err(LedgerError::EmptySale { sale_id }.into());
        }

        let totals = SaleTotals::from_items(&items, sale.tax);

        let invoice_number = match &sale.invoice_number {
            Some(existing) => existing.clone(),
            None => {
                let period_key = Utc::now().format("%Y").to_string();
                SequenceGenerator::next(
                    &mut tx,
                    tenant_id,
                    &sale.store_code,
                    INVOICE_PREFIX,
                    &period_key,
                )
                .await?
            }
        };

        let submitted = sqlx::query_as::<_, Sale>(&format!(
            r#"
            UPDATE sales
            SET status = 'pending_payment',
                invoice_number = $3,
                subtotal = $4,
                discount = $5,
                total = $6,
                amount_due = $6 - amount_paid,
                submitted_utc = NOW()
            WHERE tenant_id = $1 AND sale_id = $2
            RETURNING {SALE_COLUMNS}
            "#
        ))
        .bind(tenant_id)
        .bind(sale_id)
        .bind(&invoice_number)
        .bind(totals.subtotal)
        .bind(totals.discount)
        .bind(totals.total)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_err("Failed to submit sale", e))?;

        EventOutbox::enqueue(
            &mut tx,
            &DomainEvent::SaleSubmitted {
                tenant_id,
                store_id: submitted.store_id,
                sale_id,
                seller_id: submitted.seller_id,
                customer_id: submitted.customer_id,
                invoice_number: invoice_number.clone(),
                total: submitted.total,
                period_key: DomainEvent::current_period_key(),
            },
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| db_err("Failed to commit transaction", e))?;

        self.events.publish().await;

        timer.observe_duration();
        LEDGER_OPS_TOTAL.with_label_values(&["submit", "ok"]).inc();

        info!(
            sale_id = %sale_id,
            invoice_number = %invoice_number,
            total = %submitted.total,
            "Sale submitted"
        );

        Ok(submitted)
    }

    /// Payment-processor entry point: apply a payment to a submitted sale.
    ///
    /// One transaction covers the Payment row, the sale totals and status
    /// transition, the shift running totals, the credit-ledger entry when
    /// paying on credit, and the stock decrement on reaching PAID.
    #[instrument(skip(self, input), fields(tenant_id = %tenant_id, sale_id = %sale_id, cashier_id = %cashier_id))]
    pub async fn record_payment(
        &self,
        tenant_id: Uuid,
        sale_id: Uuid,
        cashier_id: Uuid,
        input: &RecordPayment,
    ) -> Result<Payment, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["record_payment"])
            .start_timer();

        if input.amount <= Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Payment amount must be positive"
            )));
        }

        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(|e| db_err("Failed to begin transaction", e))?;

        // Lock order: sale, shift, account, stock.
        let sale = Self::lock_sale(&mut tx, tenant_id, sale_id).await?;
        if !sale.parsed_status().accepts_payment() {
            return Err(LedgerError::InvalidState {
                entity: "sale",
                id: sale_id,
                state: sale.status.clone(),
                operation: "record payment",
            }
            .into());
        }

        if input.amount > sale.amount_due {
            return Err(LedgerError::Overpayment {
                amount: input.amount,
                outstanding: sale.amount_due,
            }
            .into());
        }

        CashShiftLedger::apply_payment(&mut tx, tenant_id, input.shift_id, input.method, input.amount)
            .await?;

        if input.method == PaymentMethod::Credit {
            let customer_id = sale.customer_id.ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!(
                    "Credit payment requires a customer on the sale"
                ))
            })?;

            let account = CreditLedger::lock_account(&mut tx, tenant_id, sale.store_id, customer_id)
                .await?
                .ok_or(LedgerError::NotFound {
                    entity: "customer account",
                    id: customer_id,
                })?;

            if !account.can_extend(input.amount) {
                return Err(LedgerError::CreditLimitExceeded {
                    requested: input.amount,
                    available: account.available_credit(),
                }
                .into());
            }

            let entry =
                CreditLedger::record_credit_sale(&mut tx, &account, sale_id, input.amount, cashier_id)
                    .await?;

            EventOutbox::enqueue(
                &mut tx,
                &DomainEvent::CreditSaleRecorded {
                    tenant_id,
                    account_id: account.account_id,
                    sale_id,
                    amount: input.amount,
                    balance_after: entry.balance_after,
                    period_key: DomainEvent::current_period_key(),
                },
            )
            .await?;
        }

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (
                payment_id, tenant_id, sale_id, shift_id, cashier_id, method, amount, reference
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING payment_id, tenant_id, sale_id, shift_id, cashier_id, method, amount,
                reference, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(sale_id)
        .bind(input.shift_id)
        .bind(cashier_id)
        .bind(input.method.as_str())
        .bind(input.amount)
        .bind(&input.reference)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_err("Failed to insert payment", e))?;

        let new_paid = sale.amount_paid + input.amount;
        let new_due = sale.total - new_paid;
        let became_paid = new_due <= Decimal::ZERO;

        if became_paid {
            // Reservation and consumption are distinct events: with
            // reserve_stock the hold converts into the decrement here; without
            // it, stock falls only now.
            let items = Self::fetch_items(&mut tx, tenant_id, sale_id).await?;
            for item in &items {
                let Some(product_id) = item.product_id else {
                    continue;
                };
                let product = Database::get_product_on(&mut tx, tenant_id, product_id).await?;
                if product.map(|p| p.track_stock).unwrap_or(false) {
                    StockLedger::decrement(
                        &mut tx,
                        tenant_id,
                        sale.store_id,
                        product_id,
                        item.quantity,
                        sale.reserve_stock,
                    )
                    .await?;
                }
            }
        }

        let new_status = if became_paid {
            SaleStatus::Paid
        } else {
            SaleStatus::PartiallyPaid
        };

        sqlx::query(
            r#"
            UPDATE sales
            SET amount_paid = $3,
                amount_due = $4,
                status = $5,
                paid_utc = CASE WHEN $6 THEN NOW() ELSE paid_utc END
            WHERE tenant_id = $1 AND sale_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(sale_id)
        .bind(new_paid)
        .bind(new_due)
        .bind(new_status.as_str())
        .bind(became_paid)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_err("Failed to update sale totals", e))?;

        EventOutbox::enqueue(
            &mut tx,
            &DomainEvent::PaymentRecorded {
                tenant_id,
                store_id: sale.store_id,
                sale_id,
                shift_id: input.shift_id,
                cashier_id,
                method: input.method.as_str().to_string(),
                amount: input.amount,
                period_key: DomainEvent::current_period_key(),
            },
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| db_err("Failed to commit transaction", e))?;

        self.events.publish().await;

        timer.observe_duration();
        LEDGER_OPS_TOTAL.with_label_values(&["payment", "ok"]).inc();

        info!(
            sale_id = %sale_id,
            payment_id = %payment.payment_id,
            amount = %input.amount,
            method = input.method.as_str(),
            status = new_status.as_str(),
            "Payment recorded"
        );

        Ok(payment)
    }

    // -------------------------------------------------------------------------
    // Cancellation and refund
    // -------------------------------------------------------------------------

    /// Cancel a sale before it is fully paid, releasing exactly the stock
    /// it still holds reserved.
    #[instrument(skip(self, reason), fields(tenant_id = %tenant_id, sale_id = %sale_id, actor = %actor))]
    pub async fn cancel(
        &self,
        tenant_id: Uuid,
        sale_id: Uuid,
        actor: Uuid,
        reason: String,
    ) -> Result<Sale, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["cancel_sale"])
            .start_timer();

        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(|e| db_err("Failed to begin transaction", e))?;

        let sale = Self::lock_sale(&mut tx, tenant_id, sale_id).await?;
        if !sale.parsed_status().can_cancel() {
            return Err(LedgerError::InvalidState {
                entity: "sale",
                id: sale_id,
                state: sale.status.clone(),
                operation: "cancel",
            }
            .into());
        }

        if sale.reserve_stock {
            let items = Self::fetch_items(&mut tx, tenant_id, sale_id).await?;
            for item in &items {
                let Some(product_id) = item.product_id else {
                    continue;
                };
                let product = Database::get_product_on(&mut tx, tenant_id, product_id).await?;
                if product.map(|p| p.track_stock).unwrap_or(false) {
                    StockLedger::release(&mut tx, tenant_id, sale.store_id, product_id, item.quantity)
                        .await?;
                }
            }
        }

        let cancelled = sqlx::query_as::<_, Sale>(&format!(
            r#"
            UPDATE sales
            SET status = 'cancelled',
                cancel_reason = $3,
                cancelled_utc = NOW()
            WHERE tenant_id = $1 AND sale_id = $2
            RETURNING {SALE_COLUMNS}
            "#
        ))
        .bind(tenant_id)
        .bind(sale_id)
        .bind(&reason)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_err("Failed to cancel sale", e))?;

        EventOutbox::enqueue(
            &mut tx,
            &DomainEvent::SaleCancelled {
                tenant_id,
                store_id: sale.store_id,
                sale_id,
                seller_id: actor,
                reason: reason.clone(),
                period_key: DomainEvent::current_period_key(),
            },
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| db_err("Failed to commit transaction", e))?;

        self.events.publish().await;

        timer.observe_duration();
        LEDGER_OPS_TOTAL.with_label_values(&["cancel", "ok"]).inc();

        info!(sale_id = %sale_id, reason = %reason, "Sale cancelled");

        Ok(cancelled)
    }

    /// Refund a paid sale.
    ///
    /// Policy: any refund is terminal. A refund that does not cover the
    /// full paid amount still moves the sale to REFUNDED, and the
    /// remainder is not refundable afterwards. For credit sales the
    /// account balance is unwound by up to the refunded amount.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, sale_id = %sale_id, actor = %actor, amount = %amount))]
    pub async fn refund(
        &self,
        tenant_id: Uuid,
        sale_id: Uuid,
        actor: Uuid,
        approved_by: Uuid,
        amount: Decimal,
        method: PaymentMethod,
    ) -> Result<Refund, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["refund_sale"])
            .start_timer();

        if amount <= Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Refund amount must be positive"
            )));
        }

        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(|e| db_err("Failed to begin transaction", e))?;

        let sale = Self::lock_sale(&mut tx, tenant_id, sale_id).await?;
        if sale.parsed_status() != SaleStatus::Paid {
            return Err(LedgerError::InvalidState {
                entity: "sale",
                id: sale_id,
                state: sale.status.clone(),
                operation: "refund",
            }
            .into());
        }

        if amount > sale.amount_paid {
            return Err(LedgerError::Overpayment {
                amount,
                outstanding: sale.amount_paid,
            }
            .into());
        }

        let refund = sqlx::query_as::<_, Refund>(
            r#"
            INSERT INTO refunds (
                refund_id, tenant_id, sale_id, amount, method, approved_by, processed_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING refund_id, tenant_id, sale_id, amount, method, approved_by, processed_by,
                created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(sale_id)
        .bind(amount)
        .bind(method.as_str())
        .bind(approved_by)
        .bind(actor)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_err("Failed to insert refund", e))?;

        if sale.is_credit_sale {
            if let Some(customer_id) = sale.customer_id {
                if let Some(account) =
                    CreditLedger::lock_account(&mut tx, tenant_id, sale.store_id, customer_id)
                        .await?
                {
                    let reversal = amount.min(account.balance);
                    if reversal > Decimal::ZERO {
                        CreditLedger::record_adjustment(
                            &mut tx,
                            &account,
                            -reversal,
                            Some(sale_id),
                            Some(format!("refund {}", refund.refund_id)),
                            actor,
                        )
                        .await?;
                    }
                }
            }
        }

        sqlx::query(
            r#"
            UPDATE sales
            SET status = 'refunded', refunded_utc = NOW()
            WHERE tenant_id = $1 AND sale_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(sale_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_err("Failed to mark sale refunded", e))?;

        EventOutbox::enqueue(
            &mut tx,
            &DomainEvent::RefundCreated {
                tenant_id,
                store_id: sale.store_id,
                sale_id,
                refund_id: refund.refund_id,
                amount,
                period_key: DomainEvent::current_period_key(),
            },
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| db_err("Failed to commit transaction", e))?;

        self.events.publish().await;

        timer.observe_duration();
        LEDGER_OPS_TOTAL.with_label_values(&["refund", "ok"]).inc();

        info!(
            sale_id = %sale_id,
            refund_id = %refund.refund_id,
            amount = %amount,
            "Refund created"
        );

        Ok(refund)
    }

    // -------------------------------------------------------------------------
    // Read-only snapshots
    // -------------------------------------------------------------------------

    /// Get a sale by ID.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, sale_id = %sale_id))]
    pub async fn get_sale(&self, tenant_id: Uuid, sale_id: Uuid) -> Result<Option<Sale>, AppError> {
        sqlx::query_as::<_, Sale>(&format!(
            r#"
            SELECT {SALE_COLUMNS}
            FROM sales
            WHERE tenant_id = $1 AND sale_id = $2
            "#
        ))
        .bind(tenant_id)
        .bind(sale_id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(|e| db_err("Failed to get sale", e))
    }

    /// Get all items for a sale.
    pub async fn get_items(
        &self,
        tenant_id: Uuid,
        sale_id: Uuid,
    ) -> Result<Vec<SaleItem>, AppError> {
        sqlx::query_as::<_, SaleItem>(&format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM sale_items
            WHERE tenant_id = $1 AND sale_id = $2
            ORDER BY created_utc
            "#
        ))
        .bind(tenant_id)
        .bind(sale_id)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| db_err("Failed to get sale items", e))
    }

    /// Get all payments for a sale.
    pub async fn get_payments(
        &self,
        tenant_id: Uuid,
        sale_id: Uuid,
    ) -> Result<Vec<Payment>, AppError> {
        sqlx::query_as::<_, Payment>(
            r#"
            SELECT payment_id, tenant_id, sale_id, shift_id, cashier_id, method, amount,
                reference, created_utc
            FROM payments
            WHERE tenant_id = $1 AND sale_id = $2
            ORDER BY created_utc
            "#,
        )
        .bind(tenant_id)
        .bind(sale_id)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| db_err("Failed to get payments", e))
    }

    /// Get all refunds for a sale.
    pub async fn get_refunds(
        &self,
        tenant_id: Uuid,
        sale_id: Uuid,
    ) -> Result<Vec<Refund>, AppError> {
        sqlx::query_as::<_, Refund>(
            r#"
            SELECT refund_id, tenant_id, sale_id, amount, method, approved_by, processed_by,
                created_utc
            FROM refunds
            WHERE tenant_id = $1 AND sale_id = $2
            ORDER BY created_utc
            "#,
        )
        .bind(tenant_id)
        .bind(sale_id)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| db_err("Failed to get refunds", e))
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    /// Lock the sale row for update.
    async fn lock_sale(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        sale_id: Uuid,
    ) -> Result<Sale, AppError> {
        sqlx::query_as::<_, Sale>(&format!(
            r#"
            SELECT {SALE_COLUMNS}
            FROM sales
            WHERE tenant_id = $1 AND sale_id = $2
            FOR UPDATE
            "#
        ))
        .bind(tenant_id)
        .bind(sale_id)
        .fetch_optional(conn)
        .await
        .map_err(|e| db_err("Failed to lock sale row", e))?
        .ok_or_else(|| {
            LedgerError::NotFound {
                entity: "sale",
                id: sale_id,
            }
            .into()
        })
    }

    async fn fetch_item(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        sale_id: Uuid,
        item_id: Uuid,
    ) -> Result<SaleItem, AppError> {
        sqlx::query_as::<_, SaleItem>(&format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM sale_items
            WHERE tenant_id = $1 AND sale_id = $2 AND item_id = $3
            "#
        ))
        .bind(tenant_id)
        .bind(sale_id)
        .bind(item_id)
        .fetch_optional(conn)
        .await
        .map_err(|e| db_err("Failed to get sale item", e))?
        .ok_or_else(|| {
            LedgerError::NotFound {
                entity: "sale item",
                id: item_id,
            }
            .into()
        })
    }

    async fn fetch_items(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        sale_id: Uuid,
    ) -> Result<Vec<SaleItem>, AppError> {
        sqlx::query_as::<_, SaleItem>(&format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM sale_items
            WHERE tenant_id = $1 AND sale_id = $2
            ORDER BY created_utc
            "#
        ))
        .bind(tenant_id)
        .bind(sale_id)
        .fetch_all(conn)
        .await
        .map_err(|e| db_err("Failed to get sale items", e))
    }

    /// Recompute totals from current items and persist them. `amount_due`
    /// is re-derived so `amount_due = total - amount_paid` holds at every
    /// commit point.
    async fn recalculate_on(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        sale: &Sale,
    ) -> Result<Sale, AppError> {
        let items = Self::fetch_items(conn, tenant_id, sale.sale_id).await?;
        let totals = SaleTotals::from_items(&items, sale.tax);

        sqlx::query_as::<_, Sale>(&format!(
            r#"
            UPDATE sales
            SET subtotal = $3,
                discount = $4,
                total = $5,
                amount_due = $5 - amount_paid
            WHERE tenant_id = $1 AND sale_id = $2
            RETURNING {SALE_COLUMNS}
            "#
        ))
        .bind(tenant_id)
        .bind(sale.sale_id)
        .bind(totals.subtotal)
        .bind(totals.discount)
        .bind(totals.total)
        .fetch_one(conn)
        .await
        .map_err(|e| db_err("Failed to update sale totals", e))
    }
}

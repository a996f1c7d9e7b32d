//! Customer credit ledger: balances derived from an append-only entry log.

use crate::error::LedgerError;
use crate::models::{CreditEntryType, CreditLedgerEntry, CustomerAccount, OpenAccount};
use crate::services::database::{db_err, Database};
use crate::services::events::{DomainEvent, EventOutbox};
use crate::services::metrics::DB_QUERY_DURATION;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::PgConnection;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Clone)]
pub struct CreditLedger {
    db: Database,
    events: EventOutbox,
}

impl CreditLedger {
    pub fn new(db: Database, events: EventOutbox) -> Self {
        Self { db, events }
    }

    /// Open a credit account for a customer (one per customer per store;
    /// the walk-in default customer is an ordinary row).
    #[instrument(skip(self, input), fields(tenant_id = %tenant_id, customer_id = %input.customer_id))]
    pub async fn open_account(
        &self,
        tenant_id: Uuid,
        input: &OpenAccount,
    ) -> Result<CustomerAccount, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["open_account"])
            .start_timer();

        let account_id = Uuid::new_v4();
        let account = sqlx::query_as::<_, CustomerAccount>(
            r#"
            INSERT INTO customer_accounts (account_id, tenant_id, store_id, customer_id, credit_limit, balance)
            VALUES ($1, $2, $3, $4, $5, 0)
            RETURNING account_id, tenant_id, store_id, customer_id, credit_limit, balance, created_utc
            "#,
        )
        .bind(account_id)
        .bind(tenant_id)
        .bind(input.store_id)
        .bind(input.customer_id)
        .bind(input.credit_limit)
        .fetch_one(self.db.pool())
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => AppError::Conflict(
                anyhow::anyhow!("Customer {} already has an account", input.customer_id),
            ),
            _ => db_err("Failed to open account", e),
        })?;

        timer.observe_duration();

        info!(account_id = %account.account_id, "Customer account opened");

        Ok(account)
    }

    /// Get an account by customer.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, customer_id = %customer_id))]
    pub async fn get_account(
        &self,
        tenant_id: Uuid,
        store_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Option<CustomerAccount>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_account"])
            .start_timer();

        let account = sqlx::query_as::<_, CustomerAccount>(
            r#"
            SELECT account_id, tenant_id, store_id, customer_id, credit_limit, balance, created_utc
            FROM customer_accounts
            WHERE tenant_id = $1 AND store_id = $2 AND customer_id = $3
            "#,
        )
        .bind(tenant_id)
        .bind(store_id)
        .bind(customer_id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(|e| db_err("Failed to get account", e))?;

        timer.observe_duration();

        Ok(account)
    }

    /// Whether `amount` of new credit fits under the customer's limit.
    /// A read-only check; extending the credit is a separate step.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, customer_id = %customer_id))]
    pub async fn check_availability(
        &self,
        tenant_id: Uuid,
        store_id: Uuid,
        customer_id: Uuid,
        amount: Decimal,
    ) -> Result<bool, AppError> {
        let account = self
            .get_account(tenant_id, store_id, customer_id)
            .await?
            .ok_or(LedgerError::NotFound {
                entity: "customer account",
                id: customer_id,
            })?;

        Ok(account.can_extend(amount))
    }

    /// Record a repayment from the customer. Fails when the repayment
    /// exceeds the outstanding balance.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, customer_id = %customer_id, amount = %amount))]
    pub async fn record_credit_payment(
        &self,
        tenant_id: Uuid,
        store_id: Uuid,
        customer_id: Uuid,
        amount: Decimal,
        reference: Option<String>,
        actor: Uuid,
    ) -> Result<CreditLedgerEntry, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["record_credit_payment"])
            .start_timer();

        if amount <= Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Repayment amount must be positive"
            )));
        }

        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(|e| db_err("Failed to begin transaction", e))?;

        let account = Self::lock_account(&mut tx, tenant_id, store_id, customer_id)
            .await?
            .ok_or(LedgerError::NotFound {
                entity: "customer account",
                id: customer_id,
            })?;

        if amount > account.balance {
            return Err(LedgerError::Overpayment {
                amount,
                outstanding: account.balance,
            }
            .into());
        }

        let balance_after = account.balance - amount;
        let entry = Self::insert_entry(
            &mut tx,
            &account,
            CreditEntryType::CreditPayment,
            -amount,
            balance_after,
            None,
            reference,
            actor,
        )
        .await?;

        EventOutbox::enqueue(
            &mut tx,
            &DomainEvent::CreditPaymentRecorded {
                tenant_id,
                account_id: account.account_id,
                amount,
                balance_after,
                period_key: DomainEvent::current_period_key(),
            },
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| db_err("Failed to commit transaction", e))?;

        self.events.publish().await;

        timer.observe_duration();

        info!(
            account_id = %account.account_id,
            amount = %amount,
            balance_after = %balance_after,
            "Credit payment recorded"
        );

        Ok(entry)
    }

    /// List ledger entries for an account, newest first.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, account_id = %account_id))]
    pub async fn list_entries(
        &self,
        tenant_id: Uuid,
        account_id: Uuid,
        limit: i64,
    ) -> Result<Vec<CreditLedgerEntry>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_entries"])
            .start_timer();

        let entries = sqlx::query_as::<_, CreditLedgerEntry>(
            r#"
            SELECT entry_id, tenant_id, account_id, entry_type, amount, balance_after,
                sale_id, reference, recorded_by, created_utc
            FROM credit_ledger_entries
            WHERE tenant_id = $1 AND account_id = $2
            ORDER BY created_utc DESC
            LIMIT $3
            "#,
        )
        .bind(tenant_id)
        .bind(account_id)
        .bind(limit.clamp(1, 500))
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| db_err("Failed to list entries", e))?;

        timer.observe_duration();

        Ok(entries)
    }

    // -------------------------------------------------------------------------
    // Transaction-composable operations (used by the sale ledger)
    // -------------------------------------------------------------------------

    /// Lock the customer's account row for update.
    pub(crate) async fn lock_account(
        conn: &mut PgConnection,
        tenant_id: Uuid,
        store_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Option<CustomerAccount>, AppError> {
        sqlx::query_as::<_, CustomerAccount>(
            r#"
            SELECT account_id, tenant_id, store_id, customer_id, credit_limit, balance, created_utc
            FROM customer_accounts
            WHERE tenant_id = $1 AND store_id = $2 AND customer_id = $3
            FOR UPDATE
            "#,
        )
        .bind(tenant_id)
        .bind(store_id)
        .bind(customer_id)
        .fetch_optional(conn)
        .await
        .map_err(|e| db_err("Failed to lock account row", e))
    }

    /// Extend credit for a sale. Does not itself enforce the limit: callers
    /// check availability first, so "can extend credit" and "extend credit"
    /// stay separate concerns.
    pub(crate) async fn record_credit_sale(
        conn: &mut PgConnection,
        account: &CustomerAccount,
        sale_id: Uuid,
        amount: Decimal,
        actor: Uuid,
    ) -> Result<CreditLedgerEntry, AppError> {
        let balance_after = account.balance + amount;
        Self::insert_entry(
            conn,
            account,
            CreditEntryType::SaleOnCredit,
            amount,
            balance_after,
            Some(sale_id),
            None,
            actor,
        )
        .await
    }

    /// Signed correction entry (refund reversals, manual corrections).
    pub(crate) async fn record_adjustment(
        conn: &mut PgConnection,
        account: &CustomerAccount,
        amount: Decimal,
        sale_id: Option<Uuid>,
        reference: Option<String>,
        actor: Uuid,
    ) -> Result<CreditLedgerEntry, AppError> {
        let balance_after = account.balance + amount;
        Self::insert_entry(
            conn,
            account,
            CreditEntryType::Adjustment,
            amount,
            balance_after,
            sale_id,
            reference,
            actor,
        )
        .await
    }

    /// Append an entry and refresh the derived balance in one step, under
    /// the account lock the caller already holds.
    #[allow(clippy::too_many_arguments)]
    async fn insert_entry(
        conn: &mut PgConnection,
        account: &CustomerAccount,
        entry_type: CreditEntryType,
        amount: Decimal,
        balance_after: Decimal,
        sale_id: Option<Uuid>,
        reference: Option<String>,
        actor: Uuid,
    ) -> Result<CreditLedgerEntry, AppError> {
        let entry = sqlx::query_as::<_, CreditLedgerEntry>(
            r#"
            INSERT INTO credit_ledger_entries (
                entry_id, tenant_id, account_id, entry_type, amount, balance_after,
                sale_id, reference, recorded_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING entry_id, tenant_id, account_id, entry_type, amount, balance_after,
                sale_id, reference, recorded_by, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(account.tenant_id)
        .bind(account.account_id)
        .bind(entry_type.as_str())
        .bind(amount)
        .bind(balance_after)
        .bind(sale_id)
        .bind(reference)
        .bind(actor)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| db_err("Failed to insert ledger entry", e))?;

        sqlx::query(
            r#"
            UPDATE customer_accounts
            SET balance = $3
            WHERE tenant_id = $1 AND account_id = $2
            "#,
        )
        .bind(account.tenant_id)
        .bind(account.account_id)
        .bind(balance_after)
        .execute(conn)
        .await
        .map_err(|e| db_err("Failed to update account balance", e))?;

        Ok(entry)
    }
}

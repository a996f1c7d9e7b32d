//! Domain events and the transactional outbox.
//!
//! Events are written to `outbox_events` inside the same transaction as the
//! operation that produced them, so an aborted operation never publishes.
//! After commit the writer nudges the dispatcher task; if the dispatcher is
//! gone the writer drains inline, bounded and best-effort, so derived state
//! does not silently go stale and the originating operation never fails on
//! account of fan-out.

use crate::services::database::{db_err, Database};
use crate::services::metrics::OUTBOX_EVENTS_TOTAL;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events exposed to asynchronous consumers (commissions, analytics,
/// alerting). The ledger does not wait on subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    SaleSubmitted {
        tenant_id: Uuid,
        store_id: Uuid,
        sale_id: Uuid,
        seller_id: Uuid,
        customer_id: Option<Uuid>,
        invoice_number: String,
        total: Decimal,
        period_key: String,
    },
    PaymentRecorded {
        tenant_id: Uuid,
        store_id: Uuid,
        sale_id: Uuid,
        shift_id: Uuid,
        cashier_id: Uuid,
        method: String,
        amount: Decimal,
        period_key: String,
    },
    SaleCancelled {
        tenant_id: Uuid,
        store_id: Uuid,
        sale_id: Uuid,
        seller_id: Uuid,
        reason: String,
        period_key: String,
    },
    RefundCreated {
        tenant_id: Uuid,
        store_id: Uuid,
        sale_id: Uuid,
        refund_id: Uuid,
        amount: Decimal,
        period_key: String,
    },
    CreditSaleRecorded {
        tenant_id: Uuid,
        account_id: Uuid,
        sale_id: Uuid,
        amount: Decimal,
        balance_after: Decimal,
        period_key: String,
    },
    CreditPaymentRecorded {
        tenant_id: Uuid,
        account_id: Uuid,
        amount: Decimal,
        balance_after: Decimal,
        period_key: String,
    },
}

impl DomainEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::SaleSubmitted { .. } => "sale_submitted",
            DomainEvent::PaymentRecorded { .. } => "payment_recorded",
            DomainEvent::SaleCancelled { .. } => "sale_cancelled",
            DomainEvent::RefundCreated { .. } => "refund_created",
            DomainEvent::CreditSaleRecorded { .. } => "credit_sale_recorded",
            DomainEvent::CreditPaymentRecorded { .. } => "credit_payment_recorded",
        }
    }

    pub fn tenant_id(&self) -> Uuid {
        match self {
            DomainEvent::SaleSubmitted { tenant_id, .. }
            | DomainEvent::PaymentRecorded { tenant_id, .. }
            | DomainEvent::SaleCancelled { tenant_id, .. }
            | DomainEvent::RefundCreated { tenant_id, .. }
            | DomainEvent::CreditSaleRecorded { tenant_id, .. }
            | DomainEvent::CreditPaymentRecorded { tenant_id, .. } => *tenant_id,
        }
    }

    /// Period key for fan-out consumers, the calendar year.
    pub fn current_period_key() -> String {
        Utc::now().format("%Y").to_string()
    }
}

#[derive(Debug, Clone, FromRow)]
struct OutboxRow {
    event_id: Uuid,
    tenant_id: Uuid,
    event_type: String,
    payload: serde_json::Value,
    created_utc: DateTime<Utc>,
}

/// Transactional outbox with an asynchronous dispatcher.
#[derive(Clone)]
pub struct EventOutbox {
    db: Database,
    notify: mpsc::Sender<()>,
}

impl EventOutbox {
    /// Create the outbox and the receiver half of the dispatcher nudge
    /// channel; the caller hands the receiver to `run_dispatcher`.
    pub fn new(db: Database) -> (Self, mpsc::Receiver<()>) {
        let (notify, rx) = mpsc::channel(16);
        (Self { db, notify }, rx)
    }

    /// Enqueue an event inside the caller's transaction.
    pub(crate) async fn enqueue(
        conn: &mut PgConnection,
        event: &DomainEvent,
    ) -> Result<(), service_core::error::AppError> {
        let payload = serde_json::to_value(event).map_err(|e| {
            service_core::error::AppError::InternalError(anyhow::anyhow!(
                "Failed to serialize event: {}",
                e
            ))
        })?;

        sqlx::query(
            r#"
            INSERT INTO outbox_events (event_id, tenant_id, event_type, payload)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(event.tenant_id())
        .bind(event.event_type())
        .bind(payload)
        .execute(conn)
        .await
        .map_err(|e| db_err("Failed to enqueue event", e))?;

        OUTBOX_EVENTS_TOTAL.with_label_values(&["enqueued"]).inc();

        Ok(())
    }

    /// Post-commit signal: wake the dispatcher. When the channel is gone
    /// (dispatcher not running), fall back to a single inline drain that
    /// logs failures instead of propagating them.
    pub async fn publish(&self) {
        match self.notify.try_send(()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(())) => {
                // Dispatcher already has a pending wake-up.
            }
            Err(mpsc::error::TrySendError::Closed(())) => {
                OUTBOX_EVENTS_TOTAL.with_label_values(&["fallback"]).inc();
                if let Err(e) = self.drain(100).await {
                    warn!(error = %e, "Inline outbox drain failed; events remain queued");
                }
            }
        }
    }

    /// Hand off up to `limit` undispatched events, oldest first. Rows are
    /// claimed with `FOR UPDATE SKIP LOCKED` so concurrent drains never
    /// double-dispatch.
    pub async fn drain(&self, limit: i64) -> Result<usize, service_core::error::AppError> {
        let rows = sqlx::query_as::<_, OutboxRow>(
            r#"
            UPDATE outbox_events
            SET dispatched_utc = NOW()
            WHERE event_id IN (
                SELECT event_id FROM outbox_events
                WHERE dispatched_utc IS NULL
                ORDER BY created_utc
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING event_id, tenant_id, event_type, payload, created_utc
            "#,
        )
        .bind(limit)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| db_err("Failed to drain outbox", e))?;

        for row in &rows {
            // The fan-out sink: consumers subscribe downstream of the log
            // stream; delivery guarantees are theirs, not the ledger's.
            info!(
                event_id = %row.event_id,
                tenant_id = %row.tenant_id,
                event_type = %row.event_type,
                payload = %row.payload,
                queued_utc = %row.created_utc,
                "Domain event dispatched"
            );
            OUTBOX_EVENTS_TOTAL.with_label_values(&["dispatched"]).inc();
        }

        Ok(rows.len())
    }

    /// Dispatcher loop: drains on nudges and on a steady interval, so
    /// events still flow if a nudge is ever lost.
    pub async fn run_dispatcher(self, mut rx: mpsc::Receiver<()>) {
        let mut tick = tokio::time::interval(Duration::from_secs(5));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                nudge = rx.recv() => {
                    if nudge.is_none() {
                        info!("Outbox nudge channel closed; dispatcher stopping");
                        return;
                    }
                }
                _ = tick.tick() => {}
            }

            loop {
                match self.drain(100).await {
                    Ok(0) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(error = %e, "Outbox drain failed; will retry");
                        break;
                    }
                }
            }
        }
    }
}

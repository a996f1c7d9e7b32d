//! Integration tests for the cash shift ledger.

mod common;

use rust_decimal::Decimal;
use service_core::error::AppError;
use uuid::Uuid;

#[tokio::test]
async fn open_and_close_computes_variance() {
    let ctx = require_db!();
    let cashier = Uuid::new_v4();

    // Opening float 100,000, no payments, counted 95,000 at close.
    let shift = ctx
        .shifts
        .open_shift(ctx.tenant_id, ctx.store_id, cashier, Decimal::from(100_000))
        .await
        .unwrap();

    assert_eq!(shift.expected_cash, Decimal::from(100_000));
    assert!(shift.is_open());

    let closed = ctx
        .shifts
        .close_shift(ctx.tenant_id, shift.shift_id, Decimal::from(95_000))
        .await
        .unwrap();

    assert_eq!(closed.status, "closed");
    assert_eq!(closed.closing_cash, Some(Decimal::from(95_000)));
    assert_eq!(closed.variance, Some(Decimal::from(-5_000)));
    assert!(closed.closed_utc.is_some());
}

#[tokio::test]
async fn second_open_shift_for_same_cashier_is_rejected() {
    let ctx = require_db!();
    let cashier = Uuid::new_v4();

    ctx.shifts
        .open_shift(ctx.tenant_id, ctx.store_id, cashier, Decimal::from(10_000))
        .await
        .unwrap();

    let err = ctx
        .shifts
        .open_shift(ctx.tenant_id, ctx.store_id, cashier, Decimal::from(10_000))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
    assert!(err.to_string().contains("already has an open shift"));
}

#[tokio::test]
async fn cashier_can_reopen_after_closing() {
    let ctx = require_db!();
    let cashier = Uuid::new_v4();

    let shift = ctx
        .shifts
        .open_shift(ctx.tenant_id, ctx.store_id, cashier, Decimal::from(5_000))
        .await
        .unwrap();
    ctx.shifts
        .close_shift(ctx.tenant_id, shift.shift_id, Decimal::from(5_000))
        .await
        .unwrap();

    let reopened = ctx
        .shifts
        .open_shift(ctx.tenant_id, ctx.store_id, cashier, Decimal::from(7_500))
        .await
        .unwrap();
    assert!(reopened.is_open());
}

#[tokio::test]
async fn closing_twice_is_rejected() {
    let ctx = require_db!();
    let cashier = Uuid::new_v4();

    let shift = ctx
        .shifts
        .open_shift(ctx.tenant_id, ctx.store_id, cashier, Decimal::from(1_000))
        .await
        .unwrap();
    ctx.shifts
        .close_shift(ctx.tenant_id, shift.shift_id, Decimal::from(1_000))
        .await
        .unwrap();

    let err = ctx
        .shifts
        .close_shift(ctx.tenant_id, shift.shift_id, Decimal::from(1_000))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
    assert!(err.to_string().contains("cannot close"));
}

#[tokio::test]
async fn same_cashier_may_hold_shifts_in_different_stores() {
    let ctx = require_db!();
    let cashier = Uuid::new_v4();
    let other_store = Uuid::new_v4();

    ctx.shifts
        .open_shift(ctx.tenant_id, ctx.store_id, cashier, Decimal::from(1_000))
        .await
        .unwrap();

    let second = ctx
        .shifts
        .open_shift(ctx.tenant_id, other_store, cashier, Decimal::from(2_000))
        .await
        .unwrap();

    assert!(second.is_open());
}

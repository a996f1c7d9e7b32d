//! Integration tests for the sale state machine and stock reservations.

mod common;

use commerce_service::models::{AddItem, SaleStatus};
use rust_decimal::Decimal;
use service_core::error::AppError;
use uuid::Uuid;

#[tokio::test]
async fn draft_accumulates_items_and_totals() {
    let ctx = require_db!();
    let seller = Uuid::new_v4();

    let product = ctx.create_product(2_500).await;
    ctx.stock_up(&product, 10).await;

    let sale = ctx.draft_sale(seller, None).await;
    ctx.add_product_item(&sale, &product, 3).await;

    let sale = ctx
        .sales
        .get_sale(ctx.tenant_id, sale.sale_id)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(sale.parsed_status(), SaleStatus::Draft);
    assert_eq!(sale.subtotal, Decimal::from(7_500));
    assert_eq!(sale.total, Decimal::from(7_500));
    assert_eq!(sale.amount_due, Decimal::from(7_500));

    // The add reserved 3 units.
    assert_eq!(ctx.available(&product).await, 7);
}

#[tokio::test]
async fn add_item_fails_when_stock_is_short() {
    let ctx = require_db!();
    let seller = Uuid::new_v4();

    let product = ctx.create_product(1_000).await;
    ctx.stock_up(&product, 2).await;

    let sale = ctx.draft_sale(seller, None).await;
    let input = AddItem {
        product_id: Some(product.product_id),
        description: None,
        quantity: 3,
        unit_price_override: None,
        price_override_authorized: false,
        discount: Decimal::ZERO,
    };

    let err = ctx
        .sales
        .add_item(ctx.tenant_id, sale.sale_id, seller, &input)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
    assert!(err.to_string().contains("Insufficient stock"));

    // The failed add left no partial reservation behind.
    assert_eq!(ctx.available(&product).await, 2);
}

#[tokio::test]
async fn untracked_products_never_touch_stock() {
    let ctx = require_db!();
    let seller = Uuid::new_v4();

    let service = ctx.create_product_with(5_000, false).await;
    let sale = ctx.draft_sale(seller, None).await;
    ctx.add_product_item(&sale, &service, 2).await;

    let row = ctx
        .stock
        .get_stock(ctx.tenant_id, ctx.store_id, service.product_id)
        .await
        .unwrap();
    assert!(row.is_none(), "no stock row may exist for a service product");
}

#[tokio::test]
async fn price_override_requires_authorization() {
    let ctx = require_db!();
    let seller = Uuid::new_v4();

    let product = ctx.create_product(4_000).await;
    ctx.stock_up(&product, 5).await;
    let sale = ctx.draft_sale(seller, None).await;

    let mut input = AddItem {
        product_id: Some(product.product_id),
        description: None,
        quantity: 1,
        unit_price_override: Some(Decimal::from(3_000)),
        price_override_authorized: false,
        discount: Decimal::ZERO,
    };

    let err = ctx
        .sales
        .add_item(ctx.tenant_id, sale.sale_id, seller, &input)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not authorized"));

    input.price_override_authorized = true;
    let item = ctx
        .sales
        .add_item(ctx.tenant_id, sale.sale_id, seller, &input)
        .await
        .unwrap();
    assert_eq!(item.unit_price, Decimal::from(3_000));
}

#[tokio::test]
async fn update_quantity_adjusts_reservation_by_delta() {
    let ctx = require_db!();
    let seller = Uuid::new_v4();

    let product = ctx.create_product(1_000).await;
    ctx.stock_up(&product, 10).await;

    let sale = ctx.draft_sale(seller, None).await;
    ctx.add_product_item(&sale, &product, 4).await;
    assert_eq!(ctx.available(&product).await, 6);

    let items = ctx.sales.get_items(ctx.tenant_id, sale.sale_id).await.unwrap();
    let item = &items[0];

    ctx.sales
        .update_quantity(ctx.tenant_id, sale.sale_id, item.item_id, seller, 6)
        .await
        .unwrap();
    assert_eq!(ctx.available(&product).await, 4);

    ctx.sales
        .update_quantity(ctx.tenant_id, sale.sale_id, item.item_id, seller, 1)
        .await
        .unwrap();
    assert_eq!(ctx.available(&product).await, 9);

    let sale = ctx
        .sales
        .get_sale(ctx.tenant_id, sale.sale_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sale.total, Decimal::from(1_000));
}

#[tokio::test]
async fn remove_item_releases_its_reservation() {
    let ctx = require_db!();
    let seller = Uuid::new_v4();

    let product = ctx.create_product(1_000).await;
    ctx.stock_up(&product, 5).await;

    let sale = ctx.draft_sale(seller, None).await;
    ctx.add_product_item(&sale, &product, 5).await;
    assert_eq!(ctx.available(&product).await, 0);

    let items = ctx.sales.get_items(ctx.tenant_id, sale.sale_id).await.unwrap();
    ctx.sales
        .remove_item(ctx.tenant_id, sale.sale_id, items[0].item_id, seller)
        .await
        .unwrap();

    assert_eq!(ctx.available(&product).await, 5);

    let sale = ctx
        .sales
        .get_sale(ctx.tenant_id, sale.sale_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sale.total, Decimal::ZERO);
}

#[tokio::test]
async fn recalculate_is_idempotent() {
    let ctx = require_db!();
    let seller = Uuid::new_v4();

    let product = ctx.create_product(1_999).await;
    ctx.stock_up(&product, 10).await;

    let sale = ctx.draft_sale(seller, None).await;
    ctx.add_product_item(&sale, &product, 3).await;

    let first = ctx.sales.recalculate(ctx.tenant_id, sale.sale_id).await.unwrap();
    let second = ctx.sales.recalculate(ctx.tenant_id, sale.sale_id).await.unwrap();

    assert_eq!(first.subtotal, second.subtotal);
    assert_eq!(first.discount, second.discount);
    assert_eq!(first.total, second.total);
    assert_eq!(first.total, Decimal::from(5_997));
}

#[tokio::test]
async fn submit_assigns_invoice_number_once() {
    let ctx = require_db!();
    let seller = Uuid::new_v4();

    let product = ctx.create_product(2_000).await;
    ctx.stock_up(&product, 5).await;

    let sale = ctx.draft_sale(seller, None).await;
    ctx.add_product_item(&sale, &product, 1).await;

    let submitted = ctx
        .sales
        .submit(ctx.tenant_id, sale.sale_id, seller)
        .await
        .unwrap();

    assert_eq!(submitted.parsed_status(), SaleStatus::PendingPayment);
    let invoice = submitted.invoice_number.expect("invoice number assigned");
    assert!(invoice.starts_with("FA-TESTSTORE-"));
    assert!(invoice.ends_with("-000001"));
    assert!(submitted.submitted_utc.is_some());

    // Submitting again is not a valid transition.
    let err = ctx
        .sales
        .submit(ctx.tenant_id, sale.sale_id, seller)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn submitting_an_empty_sale_is_rejected() {
    let ctx = require_db!();
    let seller = Uuid::new_v4();

    let sale = ctx.draft_sale(seller, None).await;
    let err = ctx
        .sales
        .submit(ctx.tenant_id, sale.sale_id, seller)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::BadRequest(_)));
    assert!(err.to_string().contains("no items"));
}

/// Scenario: submit, then try to keep editing, then cancel. The submitted
/// sale is immutable to the seller and cancellation gives the reserved
/// stock back.
#[tokio::test]
async fn submitted_sale_is_immutable_and_cancel_releases_stock() {
    let ctx = require_db!();
    let seller = Uuid::new_v4();

    let product = ctx.create_product(3_000).await;
    ctx.stock_up(&product, 8).await;

    let sale = ctx.draft_sale(seller, None).await;
    ctx.add_product_item(&sale, &product, 2).await;
    ctx.sales
        .submit(ctx.tenant_id, sale.sale_id, seller)
        .await
        .unwrap();
    assert_eq!(ctx.available(&product).await, 6);

    let input = AddItem {
        product_id: Some(product.product_id),
        description: None,
        quantity: 1,
        unit_price_override: None,
        price_override_authorized: false,
        discount: Decimal::ZERO,
    };
    let err = ctx
        .sales
        .add_item(ctx.tenant_id, sale.sale_id, seller, &input)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert!(err.to_string().contains("cannot add item"));

    let cancelled = ctx
        .sales
        .cancel(ctx.tenant_id, sale.sale_id, seller, "customer walked away".to_string())
        .await
        .unwrap();

    assert_eq!(cancelled.parsed_status(), SaleStatus::Cancelled);
    assert_eq!(cancelled.cancel_reason.as_deref(), Some("customer walked away"));
    assert_eq!(ctx.available(&product).await, 8);
}

#[tokio::test]
async fn ad_hoc_lines_need_description_and_price() {
    let ctx = require_db!();
    let seller = Uuid::new_v4();

    let sale = ctx.draft_sale(seller, None).await;

    let missing_price = AddItem {
        product_id: None,
        description: Some("Delivery fee".to_string()),
        quantity: 1,
        unit_price_override: None,
        price_override_authorized: false,
        discount: Decimal::ZERO,
    };
    let err = ctx
        .sales
        .add_item(ctx.tenant_id, sale.sale_id, seller, &missing_price)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let ok = AddItem {
        unit_price_override: Some(Decimal::from(1_500)),
        ..missing_price
    };
    let item = ctx
        .sales
        .add_item(ctx.tenant_id, sale.sale_id, seller, &ok)
        .await
        .unwrap();
    assert_eq!(item.name_snapshot, "Delivery fee");
    assert_eq!(item.line_total, Decimal::from(1_500));
}

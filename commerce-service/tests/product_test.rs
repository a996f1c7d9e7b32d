//! Integration tests for the guarded product deletion.

mod common;

use rust_decimal::Decimal;
use service_core::error::AppError;
use uuid::Uuid;

#[tokio::test]
async fn product_with_only_a_stock_row_deletes_and_cascades() {
    let ctx = require_db!();

    let product = ctx.create_product(1_000).await;
    ctx.stock_up(&product, 3).await;

    // Free the units again so only an idle stock row remains.
    ctx.stock
        .adjust(
            ctx.tenant_id,
            &commerce_service::models::StockAdjustment {
                store_id: ctx.store_id,
                product_id: product.product_id,
                delta: -3,
                reason: "write-off".to_string(),
                min_qty: None,
            },
        )
        .await
        .unwrap();

    ctx.db
        .delete_product(ctx.tenant_id, product.product_id)
        .await
        .unwrap();

    assert!(ctx
        .db
        .get_product(ctx.tenant_id, product.product_id)
        .await
        .unwrap()
        .is_none());
    assert!(ctx
        .stock
        .get_stock(ctx.tenant_id, ctx.store_id, product.product_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn product_referenced_by_a_sale_cannot_be_deleted() {
    let ctx = require_db!();
    let seller = Uuid::new_v4();

    let product = ctx.create_product(2_000).await;
    ctx.stock_up(&product, 5).await;

    let sale = ctx.draft_sale(seller, None).await;
    ctx.add_product_item(&sale, &product, 1).await;

    let err = ctx
        .db
        .delete_product(ctx.tenant_id, product.product_id)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
    assert!(err.to_string().contains("referenced by a sale"));
}

#[tokio::test]
async fn cancelled_sales_do_not_block_deletion() {
    let ctx = require_db!();
    let seller = Uuid::new_v4();

    let product = ctx.create_product(2_000).await;
    ctx.stock_up(&product, 5).await;

    let sale = ctx.draft_sale(seller, None).await;
    ctx.add_product_item(&sale, &product, 1).await;
    ctx.sales
        .cancel(ctx.tenant_id, sale.sale_id, seller, "abandoned".to_string())
        .await
        .unwrap();

    ctx.db
        .delete_product(ctx.tenant_id, product.product_id)
        .await
        .unwrap();
}

#[tokio::test]
async fn deleting_a_missing_product_is_not_found() {
    let ctx = require_db!();

    let err = ctx
        .db
        .delete_product(ctx.tenant_id, Uuid::new_v4())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn duplicate_sku_is_a_conflict() {
    let ctx = require_db!();

    let input = commerce_service::models::CreateProduct {
        sku: format!("DUP-{}", ctx.tenant_id),
        name: "First".to_string(),
        unit_price: Decimal::from(100),
        cost_price: None,
        track_stock: true,
    };
    ctx.db.create_product(ctx.tenant_id, &input).await.unwrap();

    let err = ctx.db.create_product(ctx.tenant_id, &input).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

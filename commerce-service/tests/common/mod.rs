//! Common test utilities for commerce-service integration tests.
//!
//! Tests need a PostgreSQL instance reachable via `TEST_DATABASE_URL`; when
//! the variable is unset every integration test skips cleanly. Each test
//! isolates itself with a fresh tenant id, so tests can run in parallel
//! against one database.
#![allow(dead_code)]

use commerce_service::models::{AddItem, CreateProduct, CreateSale, Product, Sale, StockAdjustment};
use commerce_service::services::{
    CashShiftLedger, CreditLedger, Database, EventOutbox, SaleLedger, StockAlerts, StockLedger,
};
use rust_decimal::Decimal;
use std::sync::Once;
use uuid::Uuid;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,commerce_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// The wired-up ledger components plus a fresh tenant/store scope.
pub struct TestContext {
    pub tenant_id: Uuid,
    pub store_id: Uuid,
    pub db: Database,
    pub sales: SaleLedger,
    pub shifts: CashShiftLedger,
    pub credit: CreditLedger,
    pub stock: StockLedger,
    pub alerts: StockAlerts,
    pub outbox: EventOutbox,
}

/// Build the ledger against the test database, or `None` when
/// `TEST_DATABASE_URL` is unset. The dispatcher task is not started: the
/// outbox nudge channel is closed, which exercises the inline fallback
/// drain on every publish.
pub async fn spawn_ledger() -> Option<TestContext> {
    init_tracing();

    let database_url = std::env::var("TEST_DATABASE_URL").ok()?;

    let db = Database::new(&database_url, 5, 1)
        .await
        .expect("Failed to connect to test database");
    db.run_migrations().await.expect("Failed to run migrations");

    let (outbox, _rx) = EventOutbox::new(db.clone());

    Some(TestContext {
        tenant_id: Uuid::new_v4(),
        store_id: Uuid::new_v4(),
        db: db.clone(),
        sales: SaleLedger::new(db.clone(), outbox.clone()),
        shifts: CashShiftLedger::new(db.clone()),
        credit: CreditLedger::new(db.clone(), outbox.clone()),
        stock: StockLedger::new(db.clone()),
        alerts: StockAlerts::new(db),
        outbox,
    })
}

impl TestContext {
    /// Register a tracked product at the given price.
    pub async fn create_product(&self, price: i64) -> Product {
        self.create_product_with(price, true).await
    }

    pub async fn create_product_with(&self, price: i64, track_stock: bool) -> Product {
        let input = CreateProduct {
            sku: format!("SKU-{}", Uuid::new_v4()),
            name: "Test product".to_string(),
            unit_price: Decimal::from(price),
            cost_price: Some(Decimal::from(price / 2)),
            track_stock,
        };
        self.db
            .create_product(self.tenant_id, &input)
            .await
            .expect("Failed to create product")
    }

    /// Receive `qty` units of a product into this store.
    pub async fn stock_up(&self, product: &Product, qty: i64) {
        self.stock_up_with_min(product, qty, 0).await;
    }

    pub async fn stock_up_with_min(&self, product: &Product, qty: i64, min_qty: i64) {
        let input = StockAdjustment {
            store_id: self.store_id,
            product_id: product.product_id,
            delta: qty,
            reason: "test receiving".to_string(),
            min_qty: Some(min_qty),
        };
        self.stock
            .adjust(self.tenant_id, &input)
            .await
            .expect("Failed to stock up");
    }

    /// Create a draft sale in this store. `reserve_stock` on, no tax.
    pub async fn draft_sale(&self, seller: Uuid, customer: Option<Uuid>) -> Sale {
        let input = CreateSale {
            store_id: self.store_id,
            store_code: "TESTSTORE".to_string(),
            customer_id: customer,
            is_credit_sale: false,
            reserve_stock: true,
            tax: Decimal::ZERO,
        };
        self.sales
            .create_sale(self.tenant_id, seller, &input)
            .await
            .expect("Failed to create sale")
    }

    pub async fn draft_sale_with(&self, seller: Uuid, input: &CreateSale) -> Sale {
        self.sales
            .create_sale(self.tenant_id, seller, input)
            .await
            .expect("Failed to create sale")
    }

    /// Add `qty` of a product to a draft sale at catalog price, acting as
    /// the sale's seller.
    pub async fn add_product_item(&self, sale: &Sale, product: &Product, qty: i64) {
        let input = AddItem {
            product_id: Some(product.product_id),
            description: None,
            quantity: qty,
            unit_price_override: None,
            price_override_authorized: false,
            discount: Decimal::ZERO,
        };
        self.sales
            .add_item(self.tenant_id, sale.sale_id, sale.seller_id, &input)
            .await
            .expect("Failed to add item");
    }

    /// Current available quantity for a product in this store.
    pub async fn available(&self, product: &Product) -> i64 {
        self.stock
            .get_stock(self.tenant_id, self.store_id, product.product_id)
            .await
            .expect("Failed to get stock")
            .map(|s| s.available())
            .unwrap_or(0)
    }
}

/// Skip boilerplate: returns the context or ends the test early.
#[macro_export]
macro_rules! require_db {
    () => {
        match common::spawn_ledger().await {
            Some(ctx) => ctx,
            None => {
                eprintln!("TEST_DATABASE_URL not set; skipping integration test");
                return;
            }
        }
    };
}

//! Application startup and lifecycle management.

use crate::config::CommerceConfig;
use crate::handlers;
use crate::services::{
    get_metrics, init_metrics, CashShiftLedger, CreditLedger, Database, EventOutbox, SaleLedger,
    StockAlerts, StockLedger,
};
use crate::AppState;
use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use secrecy::ExposeSecret;
use serde_json::json;
use service_core::error::AppError;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

/// Health check endpoint for liveness probes.
async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "commerce-service",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// Readiness check endpoint.
async fn readiness_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ready" })))
}

/// Prometheus metrics endpoint.
async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
    dispatcher_rx: mpsc::Receiver<()>,
}

impl Application {
    /// Build the application with the given configuration: connect the
    /// pool, run migrations, wire the ledgers and bind the listener.
    pub async fn build(config: CommerceConfig) -> Result<Self, AppError> {
        init_metrics();

        let db = Database::new(
            config.database.url.expose_secret(),
            config.database.max_connections,
            config.database.min_connections,
        )
        .await?;

        db.run_migrations().await?;

        let (outbox, dispatcher_rx) = EventOutbox::new(db.clone());

        let state = AppState {
            config: config.clone(),
            db: db.clone(),
            sales: SaleLedger::new(db.clone(), outbox.clone()),
            shifts: CashShiftLedger::new(db.clone()),
            credit: CreditLedger::new(db.clone(), outbox.clone()),
            stock: StockLedger::new(db.clone()),
            alerts: StockAlerts::new(db),
            outbox,
        };

        // Port 0 asks the OS for a free port (used by the test harness).
        let listener = TcpListener::bind(config.common.bind_addr()?)
            .await
            .map_err(|e| {
                tracing::error!("Failed to bind HTTP listener: {}", e);
                AppError::from(e)
            })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Commerce service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            state,
            dispatcher_rx,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get the application state.
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Run the application until stopped. Starts the outbox dispatcher
    /// alongside the HTTP server.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let dispatcher = self.state.outbox.clone();
        tokio::spawn(dispatcher.run_dispatcher(self.dispatcher_rx));

        let router = Router::new()
            .route("/health", get(health_check))
            .route("/ready", get(readiness_check))
            .route("/metrics", get(metrics_endpoint))
            .merge(handlers::api_router())
            .layer(axum::middleware::from_fn(crate::middleware::track_metrics))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state);

        axum::serve(self.listener, router).await
    }
}

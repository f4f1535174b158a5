//! Application startup and lifecycle management.

use crate::config::InvoicingConfig;
use crate::handlers::{articles, health, invoices, parties, payments};
use crate::middleware::{idempotency_guard, tenant_resolver};
use crate::services::{init_metrics, record_error, Database, TokenVerifier};
use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::tracing::request_id_middleware;
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<InvoicingConfig>,
    pub db: Arc<Database>,
    pub verifier: Arc<TokenVerifier>,
}

impl AppState {
    pub fn new(config: InvoicingConfig, db: Database) -> Self {
        Self {
            verifier: Arc::new(TokenVerifier::new(&config.auth.jwt_secret)),
            config: Arc::new(config),
            db: Arc::new(db),
        }
    }
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "Handler panicked");
    record_error("panic");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error", "code": "internal_error" })),
    )
        .into_response()
}

/// Build the HTTP router.
///
/// Tenant routes run: tenant resolver, then idempotency guard, then panic
/// capture, then the handler with its [`crate::services::TenantTx`].
pub fn router(state: AppState) -> Router {
    let timeout = state.config.common.request_timeout();

    let tenant_routes = Router::new()
        .route("/invoice", post(invoices::create_invoice))
        .route("/invoices", get(invoices::list_invoices))
        .route(
            "/invoices/:id",
            get(invoices::get_invoice).put(invoices::update_invoice),
        )
        .route("/invoices/:id/convert", put(invoices::convert_invoice))
        .route("/invoices/:id/publish", put(invoices::publish_invoice))
        .route("/invoices/:id/versions", get(invoices::list_versions))
        .route(
            "/invoices/:id/payments",
            get(payments::list_payments).post(payments::create_payment),
        )
        .route("/articles", post(articles::create_articles))
        .route(
            "/articles/:id",
            get(articles::get_article).put(articles::update_article),
        )
        .route("/customer", post(parties::create_customer))
        .route(
            "/customer/:id",
            get(parties::get_customer).put(parties::update_customer),
        )
        .route("/supplier", post(parties::create_supplier))
        .route(
            "/supplier/:id",
            get(parties::get_supplier).put(parties::update_supplier),
        )
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            idempotency_guard,
        ))
        .layer(middleware::from_fn_with_state(state.clone(), tenant_resolver));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics_handler))
        .merge(tenant_routes)
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: InvoicingConfig) -> Result<Self, AppError> {
        Self::build_internal(config, true).await
    }

    /// Build the application without running migrations.
    /// Use this in tests when migrations are already applied by the test harness.
    pub async fn build_without_migrations(config: InvoicingConfig) -> Result<Self, AppError> {
        Self::build_internal(config, false).await
    }

    async fn build_internal(config: InvoicingConfig, run_migrations: bool) -> Result<Self, AppError> {
        init_metrics();

        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
            Duration::from_secs(config.database.acquire_timeout_secs),
        )
        .await?;

        if run_migrations {
            db.run_migrations().await?;
        }

        let addr: SocketAddr = format!("{}:{}", config.common.host, config.common.port)
            .parse()
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid listen address: {}", e)))?;
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Invoicing service listener bound");

        Ok(Self {
            port,
            listener,
            state: AppState::new(config, db),
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get a reference to the database.
    pub fn db(&self) -> &Database {
        &self.state.db
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let app = router(self.state);

        tracing::info!(
            service = "invoicing-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, app).await.map_err(|e| {
            tracing::error!(error = %e, "HTTP server error");
            std::io::Error::other(format!("HTTP server error: {}", e))
        })
    }
}

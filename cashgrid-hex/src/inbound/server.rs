//! HTTP Server configuration and startup.

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{delete, get, patch, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use cashgrid_types::PaymentRepository;

use super::context::correlation_middleware;
use super::handlers::{self, AppState};
use crate::PaymentEngine;

/// HTTP Server for the payment authorization API.
pub struct HttpServer<R: PaymentRepository> {
    state: Arc<AppState<R>>,
}

impl<R: PaymentRepository> HttpServer<R> {
    /// Creates a new HTTP server with the given engine.
    pub fn new(engine: PaymentEngine<R>) -> Self {
        Self {
            state: Arc::new(AppState { engine }),
        }
    }

    /// Builds the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(handlers::health))
            .route("/api/payments", post(handlers::create_payment::<R>))
            .route("/api/payments", get(handlers::list_payments::<R>))
            .route(
                "/api/payments/pending",
                get(handlers::pending_payments::<R>),
            )
            .route("/api/payments/{id}", get(handlers::get_payment::<R>))
            .route(
                "/api/payments/{id}/approve",
                post(handlers::approve_payment::<R>),
            )
            .route(
                "/api/payments/{id}/reject",
                post(handlers::reject_payment::<R>),
            )
            .route("/api/accounts", post(handlers::create_account::<R>))
            .route("/api/accounts", get(handlers::list_accounts::<R>))
            .route("/api/accounts/{id}", get(handlers::get_account::<R>))
            .route(
                "/api/accounts/{id}",
                delete(handlers::deactivate_account::<R>),
            )
            .route("/api/limits", post(handlers::create_limit::<R>))
            .route("/api/limits", get(handlers::list_limits::<R>))
            .route("/api/limits/{id}", patch(handlers::update_limit::<R>))
            .route("/api/audit-logs", get(handlers::search_audit_logs::<R>))
            .layer(middleware::from_fn(correlation_middleware))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Runs the server on the given address with graceful shutdown.
    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Server listening on {}", listener.local_addr()?);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}

//! HTTP server setup and lifecycle.
//!
//! Configures the axum router with:
//! - The add and health handlers
//! - The request interceptor (span + metrics) around every route
//! - A per-request deadline
//! - Graceful shutdown support

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::timeout::TimeoutLayer;

use crate::config::Config;
use crate::observability::metrics::RequestMetrics;
use crate::observability::middleware::{record_request_metrics, request_trace_layer};
use crate::service::add::add;
use crate::service::health::{health_handler, ready_handler};

/// Error type for server lifecycle failures.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid listen address {0:?}")]
    InvalidAddress(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Build the application router.
///
/// Takes the instruments by value: the interceptor cannot exist without them.
pub fn build_router(metrics: RequestMetrics, request_timeout: Duration) -> Router {
    let routes = Router::new()
        .route("/add", post(add))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler));
    with_request_layers(routes, metrics, request_timeout)
}

/// Wrap every route of `router` in the request interceptor and deadline.
///
/// Layers run outermost first: span, metrics, timeout, handler. A request
/// past `request_timeout` answers 408 and is still counted.
pub fn with_request_layers(
    router: Router,
    metrics: RequestMetrics,
    request_timeout: Duration,
) -> Router {
    router
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(axum::middleware::from_fn_with_state(
            metrics,
            record_request_metrics,
        ))
        .layer(request_trace_layer())
}

/// Serve `router` on an already bound listener until `shutdown_rx` fires.
///
/// In-flight requests are drained before this returns.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), ServerError> {
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            // Wait for shutdown signal
            let _ = shutdown_rx.changed().await;
            tracing::info!("Shutdown signal received, stopping server");
        })
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Run the Adder HTTP server.
///
/// # Arguments
///
/// * `config` - Server configuration
/// * `metrics` - Request instruments used by the interceptor
/// * `shutdown_rx` - Receiver for shutdown signal
///
/// # Returns
///
/// Returns when the server has shut down.
pub async fn run_server(
    config: &Config,
    metrics: RequestMetrics,
    shutdown_rx: watch::Receiver<bool>,
) -> Result<(), ServerError> {
    let raw_addr = format!("{}:{}", config.host, config.port);
    let addr: SocketAddr = raw_addr
        .parse()
        .map_err(|_| ServerError::InvalidAddress(raw_addr.clone()))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;

    tracing::info!(address = %addr, "Starting Adder HTTP server");

    let router = build_router(metrics, config.request_timeout());
    serve(listener, router, shutdown_rx).await
}

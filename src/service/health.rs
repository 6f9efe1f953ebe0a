//! Liveness and readiness probes.

use axum::http::StatusCode;
use axum::response::IntoResponse;

/// Handle GET /health - Basic health check.
pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Handle GET /ready - Readiness check.
///
/// The server only accepts connections once telemetry and instruments
/// exist, so reaching this handler means the service is ready.
pub async fn ready_handler() -> impl IntoResponse {
    (StatusCode::OK, "READY")
}

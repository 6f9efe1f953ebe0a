//! OpenTelemetry observability infrastructure.
//!
//! Provides:
//! - OTLP exporter setup and bounded shutdown ([`telemetry`])
//! - Request counter and latency histogram ([`metrics`])
//! - Structured logging with an OpenTelemetry bridge ([`tracing`])
//! - The request interceptor wrapping every route ([`middleware`])

pub mod metrics;
pub mod middleware;
pub mod telemetry;
pub mod tracing;

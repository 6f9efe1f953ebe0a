//! Adder: an HTTP service that adds two numbers, instrumented with
//! OpenTelemetry tracing and request metrics.
//!
//! # Architecture
//!
//! - **Single endpoint**: `POST /add` sums two numeric-as-string operands
//! - **Request interceptor**: every route is wrapped with a server span and
//!   request counter / latency histogram recording
//! - **OTLP export**: spans and metrics go to a collector over gRPC, with TLS
//!   inferred from the endpoint scheme
//! - **Graceful shutdown**: in-flight requests drain, then telemetry is flushed
//!   within a bounded timeout
//!
//! # Modules
//!
//! - [`config`]: CLI and environment configuration
//! - [`observability`]: Exporter setup, instruments, logging and middleware
//! - [`server`]: Router assembly and server lifecycle
//! - [`service`]: HTTP handlers (add, health)

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions, // observability::metrics::RequestMetrics is fine
    clippy::must_use_candidate,      // Not all functions need #[must_use]
    clippy::missing_errors_doc,      // Error docs can be verbose
    clippy::missing_panics_doc       // Panic docs can be verbose
)]

pub mod config;
pub mod observability;
pub mod server;
pub mod service;

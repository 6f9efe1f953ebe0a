//! Structured logging setup.
//!
//! Configures:
//! - Console logging with target, thread, file and line
//! - Environment-based filter (via RUST_LOG)
//! - An OpenTelemetry layer that turns `tracing` spans into exported spans

use opentelemetry_sdk::trace::Tracer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Transport crates whose own spans would otherwise feed back into the exporter.
const QUIET_TRANSPORT: &str = "h2=warn,hyper=warn,hyper_util=warn,tonic=warn,tower=warn";

/// Initialize logging and, when a tracer is given, span export.
///
/// `log_level` takes any `RUST_LOG` style filter (clap reads it from
/// `RUST_LOG`).
///
/// # Panics
///
/// Panics if a global subscriber has already been installed.
pub fn init_tracing(log_level: &str, tracer: Option<Tracer>) {
    let filter = build_filter(log_level);

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let exporting = tracer.is_some();
    let otel_layer = tracer.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(otel_layer)
        .init();

    tracing::info!(log_level, span_export = exporting, "Tracing initialized");
}

/// Filter for `log_level` with the transport crates always held at `warn`.
///
/// An unparsable `log_level` falls back to `info`.
pub fn build_filter(log_level: &str) -> EnvFilter {
    let base = if EnvFilter::try_new(log_level).is_ok() {
        log_level
    } else {
        "info"
    };
    EnvFilter::builder().parse_lossy(format!("{base},{QUIET_TRANSPORT}"))
}

/// Initialize tracing for tests (only logs errors).
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("error")
        .with_test_writer()
        .try_init();
}

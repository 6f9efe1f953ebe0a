//! Adder: an HTTP service that adds two numbers.
//!
//! # Usage
//!
//! ```bash
//! adder --port 6000 --otel-endpoint http://localhost:4317
//! ```
//!
//! Environment variables can also be used:
//! - `PORT`: Port to listen on
//! - `OTEL_SERVICE_NAME`: Service name reported with every span and metric
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: Collector URL (`https://` enables TLS)
//! - `OTEL_EXPORTER_OTLP_HEADERS`: Collector auth header as `key=value`
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

use adder::config::Config;
use adder::observability::metrics::RequestMetrics;
use adder::observability::telemetry::init_telemetry;
use adder::observability::tracing::init_tracing;
use adder::server::run_server;
use anyhow::Context;
use tokio::sync::watch;

/// Print startup banner with version and configuration.
fn print_banner(config: &Config, exporting: bool) {
    let version = env!("CARGO_PKG_VERSION");
    let collector = match (&config.otel_endpoint, exporting) {
        (Some(endpoint), true) => endpoint.as_str(),
        _ => "(local only)",
    };
    eprintln!(
        r#"
     _       _     _
    / \   __| | __| | ___ _ __
   / _ \ / _` |/ _` |/ _ \ '__|
  / ___ \ (_| | (_| |  __/ |
 /_/   \_\__,_|\__,_|\___|_|

  Adder v{} - instrumented addition service

  Configuration:
    Address:    {}:{}
    Service:    {}
    Collector:  {}
    Log Level:  {}

  Press Ctrl+C to shutdown gracefully.
"#,
        version,
        config.host,
        config.port,
        config.service_name,
        collector,
        config.log_level
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration from CLI arguments and environment
    let config = Config::parse_args();

    // Malformed telemetry settings stop the process before it serves traffic
    let telemetry_config = config
        .telemetry()
        .context("invalid telemetry configuration")?;
    let telemetry =
        init_telemetry(&telemetry_config).context("failed to initialize OpenTelemetry")?;

    // Initialize tracing/logging, bridged to the span exporter when configured
    init_tracing(&config.log_level, telemetry.tracer());
    telemetry.log_configuration();

    // Instruments exist before the router (and its interceptor) is built
    let metrics = RequestMetrics::new(&telemetry.meter());

    // Print startup banner
    print_banner(&config, telemetry.exports_spans());

    // Create shutdown signal channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Spawn signal handler task
    tokio::spawn(async move {
        // Wait for SIGTERM or SIGINT (Ctrl+C)
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm =
                signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

            tokio::select! {
                _ = ctrl_c => {
                    tracing::info!("Received SIGINT (Ctrl+C), initiating shutdown...");
                }
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, initiating shutdown...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            ctrl_c.await.expect("failed to listen for ctrl+c");
            tracing::info!("Received Ctrl+C, initiating shutdown...");
        }

        // Signal shutdown
        let _ = shutdown_tx.send(true);
    });

    // Run the server
    let served = run_server(&config, metrics, shutdown_rx).await;

    // Flush telemetry whether or not the server exited cleanly
    telemetry.shutdown(config.shutdown_timeout()).await;

    served.context("server failed")?;
    tracing::info!("Adder shutdown complete");
    Ok(())
}

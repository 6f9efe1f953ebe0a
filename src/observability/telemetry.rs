//! OTLP exporter configuration and lifecycle.
//!
//! Builds the process-wide tracer and meter providers from a validated
//! [`TelemetryConfig`]:
//! - Spans: OTLP/gRPC exporter behind a batch span processor, always sampled
//! - Metrics: OTLP/gRPC exporter behind a periodic reader, or a local
//!   manual reader when no collector is configured
//! - W3C Trace Context propagation for incoming requests

use std::time::{Duration, Instant};

use opentelemetry::global;
use opentelemetry::metrics::{Meter, MeterProvider as _};
use opentelemetry::trace::{TraceError, TracerProvider as _};
use opentelemetry::KeyValue;
use opentelemetry_otlp::{TonicExporterBuilder, WithExportConfig};
use opentelemetry_sdk::metrics::{ManualReader, SdkMeterProvider};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{Sampler, Tracer, TracerProvider};
use opentelemetry_sdk::{runtime, Resource};
use thiserror::Error;
use tonic::metadata::MetadataMap;
use tonic::transport::ClientTlsConfig;

use crate::config::{ExporterConfig, TelemetryConfig, Transport};

/// Error type for telemetry initialization.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to build OTLP span exporter: {0}")]
    SpanExporter(#[from] TraceError),
}

/// Where recorded metrics end up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricsExport {
    /// Periodic export to the collector.
    Otlp,
    /// No collector configured; metrics stay in the process.
    Local,
    /// The OTLP metrics exporter could not be built; metrics stay local.
    Degraded(String),
}

/// Installed telemetry providers.
///
/// Dropping this without calling [`Telemetry::shutdown`] loses any spans
/// still queued in the batch processor.
pub struct Telemetry {
    service_name: &'static str,
    exporter: Option<ExporterConfig>,
    metrics_export: MetricsExport,
    tracer_provider: Option<TracerProvider>,
    meter_provider: SdkMeterProvider,
}

/// Resource attributes attached to every span and metric.
pub fn service_resource(service_name: &str) -> Resource {
    Resource::default().merge(&Resource::new([
        KeyValue::new("service.name", service_name.to_string()),
        KeyValue::new("service.language", "rust"),
    ]))
}

/// Configure exporters and install them as the global providers.
///
/// Runs before the subscriber exists (the logging layer needs the tracer),
/// so nothing is logged here. Call [`Telemetry::log_configuration`] once
/// logging is up.
///
/// Must be called from within a Tokio runtime: the batch span processor and
/// periodic metric reader run as Tokio tasks.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<Telemetry, TelemetryError> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    let resource = service_resource(config.service_name);

    let (tracer_provider, meter_provider, metrics_export) = match &config.exporter {
        Some(exporter) => {
            let tracer_provider = otlp_tracer_provider(exporter, config, resource.clone())?;
            global::set_tracer_provider(tracer_provider.clone());

            let (meter_provider, metrics_export) =
                match otlp_meter_provider(exporter, config, resource.clone()) {
                    Ok(provider) => (provider, MetricsExport::Otlp),
                    Err(e) => (
                        local_meter_provider(resource),
                        MetricsExport::Degraded(e.to_string()),
                    ),
                };
            (Some(tracer_provider), meter_provider, metrics_export)
        }
        None => (None, local_meter_provider(resource), MetricsExport::Local),
    };

    global::set_meter_provider(meter_provider.clone());

    Ok(Telemetry {
        service_name: config.service_name,
        exporter: config.exporter.clone(),
        metrics_export,
        tracer_provider,
        meter_provider,
    })
}

fn otlp_exporter(exporter: &ExporterConfig, timeout: Duration) -> TonicExporterBuilder {
    let mut metadata = MetadataMap::new();
    if let Some(header) = &exporter.header {
        metadata.insert(header.key.clone(), header.value.clone());
    }

    let builder = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(exporter.endpoint.clone())
        .with_timeout(timeout)
        .with_metadata(metadata);

    match exporter.transport {
        Transport::Tls => builder.with_tls_config(ClientTlsConfig::new().with_native_roots()),
        Transport::Insecure => builder,
    }
}

fn otlp_tracer_provider(
    exporter: &ExporterConfig,
    config: &TelemetryConfig,
    resource: Resource,
) -> Result<TracerProvider, TraceError> {
    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(otlp_exporter(exporter, config.export_timeout))
        .with_trace_config(
            opentelemetry_sdk::trace::Config::default()
                .with_sampler(Sampler::AlwaysOn)
                .with_resource(resource),
        )
        .install_batch(runtime::Tokio)
}

fn otlp_meter_provider(
    exporter: &ExporterConfig,
    config: &TelemetryConfig,
    resource: Resource,
) -> opentelemetry::metrics::Result<SdkMeterProvider> {
    opentelemetry_otlp::new_pipeline()
        .metrics(runtime::Tokio)
        .with_exporter(otlp_exporter(exporter, config.export_timeout))
        .with_resource(resource)
        .with_period(config.metric_interval)
        .build()
}

/// Metrics are recorded but never exported.
fn local_meter_provider(resource: Resource) -> SdkMeterProvider {
    let reader = ManualReader::builder().build();
    SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(resource)
        .build()
}

impl Telemetry {
    /// Tracer for the OpenTelemetry logging layer, if spans are exported.
    pub fn tracer(&self) -> Option<Tracer> {
        self.tracer_provider
            .as_ref()
            .map(|provider| provider.tracer(self.service_name))
    }

    /// Meter named after the service.
    pub fn meter(&self) -> Meter {
        self.meter_provider.meter(self.service_name)
    }

    /// Whether spans leave the process.
    pub fn exports_spans(&self) -> bool {
        self.tracer_provider.is_some()
    }

    pub fn metrics_export(&self) -> &MetricsExport {
        &self.metrics_export
    }

    /// Log how telemetry was set up, including a degraded metrics exporter.
    pub fn log_configuration(&self) {
        match &self.exporter {
            Some(exporter) => tracing::info!(
                service = self.service_name,
                endpoint = %exporter.endpoint,
                tls = exporter.transport == Transport::Tls,
                auth_header = exporter.header.is_some(),
                "OTLP exporter configured"
            ),
            None => tracing::info!(
                service = self.service_name,
                "No OTLP endpoint configured, telemetry stays local"
            ),
        }

        if let MetricsExport::Degraded(error) = &self.metrics_export {
            tracing::warn!(
                error = %error,
                "Failed to create OTLP metrics exporter, metrics stay local"
            );
        }
    }

    /// Flush pending telemetry and close the exporters.
    ///
    /// Consumes the handle so it runs at most once. Waits at most `timeout`;
    /// errors and timeouts are logged and never returned.
    pub async fn shutdown(self, timeout: Duration) {
        let Self {
            tracer_provider,
            meter_provider,
            ..
        } = self;
        let start = Instant::now();

        // Provider shutdown blocks on the exporter tasks. A detached OS thread
        // keeps a stuck flush from holding the runtime open past `timeout`.
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        let spawned = std::thread::Builder::new()
            .name("telemetry-shutdown".into())
            .spawn(move || {
                if let Some(provider) = tracer_provider {
                    if let Err(e) = provider.shutdown() {
                        tracing::warn!(error = %e, "Failed to shut down tracer provider");
                    }
                }
                if let Err(e) = meter_provider.shutdown() {
                    tracing::warn!(error = %e, "Failed to shut down meter provider");
                }
                let _ = done_tx.send(());
            });
        if let Err(e) = spawned {
            tracing::warn!(error = %e, "Failed to spawn telemetry shutdown thread");
            return;
        }

        match tokio::time::timeout(timeout, done_rx).await {
            Ok(Ok(())) => {
                tracing::info!(
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Telemetry flushed"
                );
            }
            Ok(Err(_)) => {
                tracing::warn!("Telemetry shutdown thread exited without finishing");
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Telemetry shutdown timed out, pending data dropped"
                );
            }
        }
    }
}

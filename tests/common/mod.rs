//! Test utilities for Adder integration tests.
//!
//! Provides:
//! - A meter provider backed by an in-memory exporter
//! - Readers for the request counter and response time histogram
//! - Request builders for the add endpoint

#![allow(dead_code)]

use adder::observability::metrics::{RequestMetrics, REQUEST_TOTAL, RESPONSE_TIME_MS};
use adder::server::{build_router, with_request_layers};
use axum::body::Body;
use axum::http::Request;
use axum::Router;
use opentelemetry::metrics::MeterProvider as _;
use opentelemetry_sdk::metrics::data::{Histogram, ResourceMetrics, Sum};
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::runtime;
use opentelemetry_sdk::testing::metrics::InMemoryMetricsExporter;
use std::time::Duration;

/// Meter provider whose exported data can be inspected.
pub struct MetricsFixture {
    provider: SdkMeterProvider,
    exporter: InMemoryMetricsExporter,
}

impl MetricsFixture {
    /// Create a fixture with its own provider (no global state).
    pub fn new() -> Self {
        adder::observability::tracing::init_test_tracing();
        let exporter = InMemoryMetricsExporter::default();
        let reader = PeriodicReader::builder(exporter.clone(), runtime::TokioCurrentThread).build();
        let provider = SdkMeterProvider::builder().with_reader(reader).build();
        Self { provider, exporter }
    }

    /// Instruments registered on this fixture's meter.
    pub fn metrics(&self) -> RequestMetrics {
        RequestMetrics::new(&self.provider.meter("adder-test"))
    }

    /// Router wired to this fixture's instruments.
    pub fn router(&self) -> Router {
        build_router(self.metrics(), Duration::from_secs(5))
    }

    /// Extra routes behind the same layers as the real router.
    pub fn router_with(&self, routes: Router, request_timeout: Duration) -> Router {
        with_request_layers(routes, self.metrics(), request_timeout)
    }

    /// Cumulative value of `request_total`, summed over all attribute sets.
    pub fn request_total(&self) -> u64 {
        self.with_latest(|metrics| {
            find_metric(metrics, REQUEST_TOTAL)
                .and_then(|data| data.downcast_ref::<Sum<u64>>())
                .map(|sum| sum.data_points.iter().map(|p| p.value).sum())
                .unwrap_or(0)
        })
    }

    /// Number of observations in `response_time_ms`, summed over all attribute sets.
    pub fn response_time_count(&self) -> u64 {
        self.with_latest(|metrics| {
            find_metric(metrics, RESPONSE_TIME_MS)
                .and_then(|data| data.downcast_ref::<Histogram<u64>>())
                .map(|hist| hist.data_points.iter().map(|p| p.count).sum())
                .unwrap_or(0)
        })
    }

    /// Sum of all `response_time_ms` observations, in milliseconds.
    pub fn response_time_sum(&self) -> u64 {
        self.with_latest(|metrics| {
            find_metric(metrics, RESPONSE_TIME_MS)
                .and_then(|data| data.downcast_ref::<Histogram<u64>>())
                .map(|hist| hist.data_points.iter().map(|p| p.sum).sum())
                .unwrap_or(0)
        })
    }

    /// Attribute sets recorded on `request_total`, as `key=value` strings.
    pub fn request_attributes(&self) -> Vec<Vec<String>> {
        self.with_latest(|metrics| {
            find_metric(metrics, REQUEST_TOTAL)
                .and_then(|data| data.downcast_ref::<Sum<u64>>())
                .map(|sum| {
                    sum.data_points
                        .iter()
                        .map(|p| {
                            let mut attrs: Vec<String> = p
                                .attributes
                                .iter()
                                .map(|kv| format!("{}={}", kv.key, kv.value))
                                .collect();
                            attrs.sort();
                            attrs
                        })
                        .collect()
                })
                .unwrap_or_default()
        })
    }

    fn with_latest<T>(&self, read: impl FnOnce(&ResourceMetrics) -> T) -> T
    where
        T: Default,
    {
        self.provider.force_flush().expect("force flush failed");
        let exported = self
            .exporter
            .get_finished_metrics()
            .expect("in-memory exporter failed");
        exported.last().map(read).unwrap_or_default()
    }
}

impl Default for MetricsFixture {
    fn default() -> Self {
        Self::new()
    }
}

fn find_metric<'a>(
    metrics: &'a ResourceMetrics,
    name: &str,
) -> Option<&'a dyn std::any::Any> {
    metrics
        .scope_metrics
        .iter()
        .flat_map(|scope| scope.metrics.iter())
        .find(|metric| metric.name == name)
        .map(|metric| metric.data.as_any())
}

/// Build a `POST /add` request with the given JSON body.
pub fn add_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/add")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("valid request")
}

/// Build a `POST /add` request from two operand strings.
pub fn operands(one: &str, two: &str) -> Request<Body> {
    add_request(&format!(r#"{{"operandOne":"{one}","operandTwo":"{two}"}}"#))
}

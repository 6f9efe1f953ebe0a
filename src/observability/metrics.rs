//! Request metrics registrar.
//!
//! Key metrics:
//! - request_total: Counter of every request the server answered
//! - response_time_ms: Histogram of handler latency in whole milliseconds

use opentelemetry::metrics::noop::NoopMeterProvider;
use opentelemetry::metrics::{Counter, Histogram, Meter, MeterProvider as _};
use opentelemetry::KeyValue;
use std::time::Duration;

/// Name of the request counter instrument.
pub const REQUEST_TOTAL: &str = "request_total";

/// Name of the response time histogram instrument.
pub const RESPONSE_TIME_MS: &str = "response_time_ms";

/// Instrument set shared by every request.
///
/// Cloning is cheap; the SDK instruments are safe to record from many
/// tasks at once.
#[derive(Debug, Clone)]
pub struct RequestMetrics {
    /// Total number of requests served.
    pub request_total: Counter<u64>,
    /// Distribution of response times in milliseconds.
    pub response_time_ms: Histogram<u64>,
}

impl RequestMetrics {
    /// Register both instruments against `meter`.
    ///
    /// An instrument the SDK refuses to create is replaced by a no-op one
    /// after logging a warning, so requests are never affected.
    pub fn new(meter: &Meter) -> Self {
        let request_total = meter
            .u64_counter(REQUEST_TOTAL)
            .with_description("All requests received by the server")
            .with_unit("1")
            .try_init()
            .unwrap_or_else(|e| {
                tracing::warn!(
                    instrument = REQUEST_TOTAL,
                    error = %e,
                    "Failed to create instrument, using no-op"
                );
                noop_meter().u64_counter(REQUEST_TOTAL).init()
            });

        let response_time_ms = meter
            .u64_histogram(RESPONSE_TIME_MS)
            .with_description("The distribution of response times")
            .with_unit("ms")
            .try_init()
            .unwrap_or_else(|e| {
                tracing::warn!(
                    instrument = RESPONSE_TIME_MS,
                    error = %e,
                    "Failed to create instrument, using no-op"
                );
                noop_meter().u64_histogram(RESPONSE_TIME_MS).init()
            });

        Self {
            request_total,
            response_time_ms,
        }
    }

    /// Record one finished request.
    pub fn record(&self, elapsed: Duration, attributes: &[KeyValue]) {
        self.request_total.add(1, attributes);
        self.response_time_ms.record(whole_millis(elapsed), attributes);
    }
}

fn noop_meter() -> Meter {
    NoopMeterProvider::new().meter("noop")
}

/// Elapsed time truncated to whole milliseconds, saturating at `u64::MAX`.
pub fn whole_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

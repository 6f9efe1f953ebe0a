//! Configuration parsing for the Adder service.
//!
//! Supports:
//! - CLI arguments via clap
//! - Environment variable overrides (including the standard `OTEL_*` names)
//! - Validation of the telemetry settings into a typed [`TelemetryConfig`]

use axum::http::Uri;
use clap::Parser;
use std::time::Duration;
use thiserror::Error;
use tonic::metadata::{AsciiMetadataKey, AsciiMetadataValue};

/// Error type for configuration validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid OTLP endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("unsupported OTLP endpoint scheme {0:?} (expected http or https)")]
    UnsupportedScheme(String),

    #[error("OTLP header {0:?} must have the form key=value")]
    MissingHeaderSeparator(String),

    #[error("OTLP header {0:?} has an empty key")]
    EmptyHeaderKey(String),

    #[error("OTLP header key {0:?} is not valid gRPC metadata")]
    InvalidHeaderKey(String),

    #[error("OTLP header value for {0:?} is not valid gRPC metadata")]
    InvalidHeaderValue(String),
}

/// Adder: an HTTP service that adds two numbers.
#[derive(Parser, Debug, Clone)]
#[command(name = "adder")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Host address to bind to
    #[arg(long, env = "ADDER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 6000)]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Service name reported on every span and used as the meter name
    #[arg(long, env = "OTEL_SERVICE_NAME", default_value = "adder")]
    pub service_name: String,

    /// OpenTelemetry collector endpoint (http:// for plaintext, https:// for TLS)
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otel_endpoint: Option<String>,

    /// Single collector auth header as key=value
    #[arg(long, env = "OTEL_EXPORTER_OTLP_HEADERS")]
    pub otel_headers: Option<String>,

    /// Export timeout in milliseconds
    #[arg(long, env = "OTEL_EXPORTER_OTLP_TIMEOUT", default_value_t = 10_000)]
    pub otel_timeout_ms: u64,

    /// Interval between metric exports in milliseconds
    #[arg(
        long,
        env = "OTEL_METRIC_EXPORT_INTERVAL",
        default_value_t = 10_000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub metric_interval_ms: u64,

    /// Per-request deadline in seconds
    #[arg(
        long,
        env = "ADDER_REQUEST_TIMEOUT_SECS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub request_timeout_secs: u64,

    /// Upper bound for flushing telemetry at shutdown, in seconds
    #[arg(long, env = "ADDER_SHUTDOWN_TIMEOUT_SECS", default_value_t = 5)]
    pub shutdown_timeout_secs: u64,
}

/// Transport security for the OTLP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Plaintext gRPC (`http://`).
    Insecure,
    /// gRPC over TLS with native root certificates (`https://`).
    Tls,
}

/// A single validated collector header.
#[derive(Debug, Clone)]
pub struct OtlpHeader {
    pub key: AsciiMetadataKey,
    pub value: AsciiMetadataValue,
}

/// Where and how to export telemetry.
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    /// Full endpoint URL, scheme included.
    pub endpoint: String,
    pub transport: Transport,
    pub header: Option<OtlpHeader>,
}

/// Validated telemetry settings, immutable for the process lifetime.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: &'static str,
    /// `None` keeps telemetry local: no span export, metrics recorded only.
    pub exporter: Option<ExporterConfig>,
    pub export_timeout: Duration,
    pub metric_interval: Duration,
}

impl Config {
    /// Parse configuration from CLI arguments and environment.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the telemetry settings.
    ///
    /// A malformed endpoint or header is an error, never a silently
    /// half-configured exporter.
    pub fn telemetry(&self) -> Result<TelemetryConfig, ConfigError> {
        // Checked even when no endpoint is set
        let header = match non_empty(self.otel_headers.as_deref()) {
            Some(raw) => Some(parse_header(raw)?),
            None => None,
        };

        let exporter = match non_empty(self.otel_endpoint.as_deref()) {
            Some(raw) => {
                let (endpoint, transport) = parse_endpoint(raw)?;
                Some(ExporterConfig {
                    endpoint,
                    transport,
                    header,
                })
            }
            None => None,
        };

        Ok(TelemetryConfig {
            // Meters and tracers are named with a `&'static str`; the name is
            // fixed for the process lifetime, so it is leaked once here.
            service_name: Box::leak(self.service_name.clone().into_boxed_str()),
            exporter,
            export_timeout: Duration::from_millis(self.otel_timeout_ms),
            metric_interval: Duration::from_millis(self.metric_interval_ms),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Create a default configuration for testing.
    #[cfg(test)]
    pub fn test_config() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0, // Random port
            log_level: "debug".into(),
            ..Self::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 6000,
            log_level: "info".into(),
            service_name: "adder".into(),
            otel_endpoint: None,
            otel_headers: None,
            otel_timeout_ms: 10_000,
            metric_interval_ms: 10_000,
            request_timeout_secs: 30,
            shutdown_timeout_secs: 5,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Parse a collector endpoint, inferring transport security from its scheme.
pub fn parse_endpoint(raw: &str) -> Result<(String, Transport), ConfigError> {
    let uri: Uri = raw.parse().map_err(|e: axum::http::uri::InvalidUri| {
        ConfigError::InvalidEndpoint {
            endpoint: raw.to_string(),
            reason: e.to_string(),
        }
    })?;

    let transport = match uri.scheme_str() {
        Some("http") => Transport::Insecure,
        Some("https") => Transport::Tls,
        Some(other) => return Err(ConfigError::UnsupportedScheme(other.to_string())),
        None => {
            return Err(ConfigError::InvalidEndpoint {
                endpoint: raw.to_string(),
                reason: "missing http:// or https:// scheme".into(),
            })
        }
    };

    if uri.authority().is_none() {
        return Err(ConfigError::InvalidEndpoint {
            endpoint: raw.to_string(),
            reason: "missing host".into(),
        });
    }

    Ok((raw.to_string(), transport))
}

/// Parse a single `key=value` collector header.
///
/// Splits at the first `=`, so the value may itself contain `=`.
pub fn parse_header(raw: &str) -> Result<OtlpHeader, ConfigError> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| ConfigError::MissingHeaderSeparator(raw.to_string()))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(ConfigError::EmptyHeaderKey(raw.to_string()));
    }

    let parsed_key = AsciiMetadataKey::from_bytes(key.as_bytes())
        .map_err(|_| ConfigError::InvalidHeaderKey(key.to_string()))?;
    let parsed_value = AsciiMetadataValue::try_from(value.trim())
        .map_err(|_| ConfigError::InvalidHeaderValue(key.to_string()))?;

    Ok(OtlpHeader {
        key: parsed_key,
        value: parsed_value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["adder"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).expect("config should parse")
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 6000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.service_name, "adder");
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_config_uses_random_port() {
        let config = Config::test_config();
        assert_eq!(config.port, 0);
        assert_eq!(config.host, "127.0.0.1");
    }

    #[test]
    fn test_http_endpoint_is_insecure() {
        let (endpoint, transport) = parse_endpoint("http://collector:4317").unwrap();
        assert_eq!(endpoint, "http://collector:4317");
        assert_eq!(transport, Transport::Insecure);
    }

    #[test]
    fn test_https_endpoint_uses_tls() {
        let (_, transport) = parse_endpoint("https://otlp.example.com:443").unwrap();
        assert_eq!(transport, Transport::Tls);
    }

    #[test]
    fn test_endpoint_without_scheme_is_rejected() {
        let err = parse_endpoint("collector:4317").unwrap_err();
        assert!(
            matches!(
                err,
                ConfigError::InvalidEndpoint { .. } | ConfigError::UnsupportedScheme(_)
            ),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn test_endpoint_with_unknown_scheme_is_rejected() {
        let err = parse_endpoint("ftp://collector:4317").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedScheme(ref s) if s == "ftp"));
    }

    #[test]
    fn test_endpoint_garbage_is_rejected() {
        assert!(parse_endpoint("http://exa mple.com").is_err());
    }

    #[test]
    fn test_header_is_split_at_first_separator() {
        let header = parse_header("authorization=Basic dXNlcjpwYXNz=").unwrap();
        assert_eq!(header.key.as_str(), "authorization");
        assert_eq!(header.value.to_str().unwrap(), "Basic dXNlcjpwYXNz=");
    }

    #[test]
    fn test_header_without_separator_is_fatal() {
        let err = parse_header("authorization").unwrap_err();
        assert!(matches!(err, ConfigError::MissingHeaderSeparator(_)));
    }

    #[test]
    fn test_header_with_empty_key_is_rejected() {
        let err = parse_header("=token").unwrap_err();
        assert!(matches!(err, ConfigError::EmptyHeaderKey(_)));
    }

    #[test]
    fn test_telemetry_without_endpoint_stays_local() {
        let telemetry = parse(&["--otel-headers", "api-key=secret"])
            .telemetry()
            .unwrap();
        assert!(telemetry.exporter.is_none());
        assert_eq!(telemetry.service_name, "adder");
    }

    #[test]
    fn test_malformed_header_fails_without_endpoint() {
        let result = parse(&["--otel-headers", "x-api-key"]).telemetry();
        assert!(matches!(result, Err(ConfigError::MissingHeaderSeparator(_))));
    }

    #[test]
    fn test_telemetry_with_endpoint_and_header() {
        let telemetry = parse(&[
            "--service-name",
            "addapp",
            "--otel-endpoint",
            "https://collector:4317",
            "--otel-headers",
            "api-key=secret",
            "--otel-timeout-ms",
            "2500",
        ])
        .telemetry()
        .unwrap();

        assert_eq!(telemetry.service_name, "addapp");
        assert_eq!(telemetry.export_timeout, Duration::from_millis(2500));
        let exporter = telemetry.exporter.expect("exporter configured");
        assert_eq!(exporter.transport, Transport::Tls);
        let header = exporter.header.expect("header configured");
        assert_eq!(header.key.as_str(), "api-key");
    }

    #[test]
    fn test_telemetry_with_malformed_header_fails() {
        let result = parse(&[
            "--otel-endpoint",
            "http://collector:4317",
            "--otel-headers",
            "api-key",
        ])
        .telemetry();
        assert!(matches!(result, Err(ConfigError::MissingHeaderSeparator(_))));
    }

    #[test]
    fn test_zero_metric_interval_is_rejected() {
        let result = Config::try_parse_from(["adder", "--metric-interval-ms", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_blank_header_means_no_header() {
        let telemetry = parse(&["--otel-endpoint", "http://collector:4317", "--otel-headers", " "])
            .telemetry()
            .unwrap();
        assert!(telemetry.exporter.unwrap().header.is_none());
    }
}

//! Bootstrap utilities for cdcflow binaries.
//!
//! Shared initialization code for the Lambda entry points.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable for the log filter.
pub const LOG_ENV_VAR: &str = "CDCFLOW_LOG";
/// Environment variable selecting the log format (`json` or `text`).
pub const LOG_FORMAT_ENV_VAR: &str = "CDCFLOW_LOG_FORMAT";

/// Initialize tracing with the CDCFLOW_LOG environment variable.
///
/// Defaults to "info" level if CDCFLOW_LOG is not set. Timestamps are left
/// out; CloudWatch stamps every line on ingestion.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let json = std::env::var(LOG_FORMAT_ENV_VAR)
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .without_time(),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .without_time(),
            )
            .init();
    }
}

/// Install an OTLP metrics pipeline as the global meter provider.
///
/// The exporter reads the standard `OTEL_EXPORTER_OTLP_*` variables. Lambda
/// freezes the process between invocations, so callers flush the returned
/// provider at the end of every invocation.
#[cfg(feature = "otel")]
pub fn init_metrics(
) -> Result<opentelemetry_sdk::metrics::SdkMeterProvider, Box<dyn std::error::Error + Send + Sync>>
{
    use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};

    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .build()?;
    let reader = PeriodicReader::builder(exporter, opentelemetry_sdk::runtime::Tokio).build();
    let provider = SdkMeterProvider::builder().with_reader(reader).build();
    opentelemetry::global::set_meter_provider(provider.clone());
    Ok(provider)
}

/// Flush buffered metrics, logging instead of failing the invocation.
#[cfg(feature = "otel")]
pub fn flush_metrics(provider: &opentelemetry_sdk::metrics::SdkMeterProvider) {
    if let Err(e) = provider.force_flush() {
        tracing::warn!(error = %e, "Failed to flush metrics");
    }
}

/// Metrics pipeline for one Lambda process.
///
/// Without the `otel` feature, or when the exporter can not be built, every
/// method is a no-op; metrics never fail an invocation.
#[derive(Default)]
pub struct InvocationMetrics {
    #[cfg(feature = "otel")]
    provider: Option<opentelemetry_sdk::metrics::SdkMeterProvider>,
}

impl InvocationMetrics {
    /// Install the metrics pipeline if available.
    pub fn init() -> Self {
        #[cfg(feature = "otel")]
        {
            match init_metrics() {
                Ok(provider) => Self {
                    provider: Some(provider),
                },
                Err(e) => {
                    tracing::warn!(error = %e, "Metrics export disabled");
                    Self::default()
                }
            }
        }
        #[cfg(not(feature = "otel"))]
        {
            Self::default()
        }
    }

    /// Push buffered metrics before the runtime freezes the process.
    pub fn flush(&self) {
        #[cfg(feature = "otel")]
        if let Some(provider) = &self.provider {
            flush_metrics(provider);
        }
    }
}

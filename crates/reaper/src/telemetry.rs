//! Logging setup for fleetsweep processes
//!
//! Console output is always on. Spans are additionally exported over OTLP
//! when an endpoint is configured; an exporter that cannot be built is
//! reported once and skipped, so sweeps keep running without it.

use std::time::Duration;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Filter used when none is configured or the configured one is invalid
pub const DEFAULT_LOG_FILTER: &str = "info";

const EXPORT_TIMEOUT: Duration = Duration::from_secs(10);

/// Where logs and spans go for one process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Reported as `service.name` on exported spans
    pub service_name: String,
    /// OTLP gRPC endpoint; no export when unset
    pub otlp_endpoint: Option<String>,
    /// `EnvFilter` directives for console output
    pub log_filter: String,
}

impl TelemetryConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            otlp_endpoint: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }

    pub fn with_otlp_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = Some(endpoint.into());
        self
    }

    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Configuration for `service_name`, overridable from the environment
    ///
    /// - `OTEL_SERVICE_NAME` replaces `service_name`
    /// - `OTEL_EXPORTER_OTLP_ENDPOINT` enables span export
    /// - `RUST_LOG`, then `LOG_LEVEL`, sets the console filter
    pub fn from_env(service_name: &str) -> Self {
        Self::from_lookup(service_name, |key| std::env::var(key).ok())
    }

    fn from_lookup(service_name: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let set = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut config =
            Self::new(set("OTEL_SERVICE_NAME").unwrap_or_else(|| service_name.to_string()));
        if let Some(endpoint) = set("OTEL_EXPORTER_OTLP_ENDPOINT") {
            config = config.with_otlp_endpoint(endpoint);
        }
        if let Some(filter) = set("RUST_LOG").or_else(|| set("LOG_LEVEL")) {
            config = config.with_log_filter(filter);
        }
        config
    }
}

/// Flushes exported spans when dropped; hold it for the life of `main`
pub struct TelemetryGuard {
    provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            // The subscriber may already be gone at this point
            if let Err(e) = provider.shutdown() {
                eprintln!("Failed to flush span exporter: {e:?}");
            }
        }
    }
}

/// Install the global subscriber
///
/// Panics if a global subscriber is already set.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryGuard {
    let console = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_filter(build_filter(&config.log_filter));

    let (provider, export_error) = match config.otlp_endpoint.as_deref() {
        Some(endpoint) => match build_tracer_provider(endpoint, &config.service_name) {
            Ok(provider) => (Some(provider), None),
            Err(e) => (None, Some(e)),
        },
        None => (None, None),
    };

    let spans = provider.as_ref().map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer("fleetsweep"))
    });

    tracing_subscriber::registry()
        .with(console)
        .with(spans)
        .init();

    match (&config.otlp_endpoint, export_error) {
        (Some(endpoint), Some(e)) => {
            tracing::warn!(
                endpoint = %endpoint,
                error = %e,
                "Span export disabled, exporter failed to start"
            );
        }
        (Some(endpoint), None) => {
            tracing::info!(
                endpoint = %endpoint,
                service = %config.service_name,
                "Exporting spans over OTLP"
            );
        }
        (None, _) => {}
    }

    TelemetryGuard { provider }
}

/// Parse filter directives, falling back to [`DEFAULT_LOG_FILTER`]
fn build_filter(directives: &str) -> EnvFilter {
    EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn build_tracer_provider(
    endpoint: &str,
    service_name: &str,
) -> Result<SdkTracerProvider, Box<dyn std::error::Error + Send + Sync>> {
    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .with_timeout(EXPORT_TIMEOUT)
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_sampler(Sampler::AlwaysOn)
        .with_resource(
            Resource::builder()
                .with_service_name(service_name.to_string())
                .build(),
        )
        .build())
}

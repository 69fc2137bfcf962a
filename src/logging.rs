//! Tracing subscriber setup.
//!
//! Console output is `pretty` or `json`, filtered by `RUST_LOG` when set and by
//! the configured level otherwise; `-v` adds debug output for airaware to either. When `telemetry.otlp_endpoint` is set, spans
//! are additionally exported over OTLP/HTTP.

use crate::config::AirAwareConfig;
use crate::{AirAwareError, Result, VERSION};
use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_semantic_conventions::resource::SERVICE_VERSION;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

const SERVICE_NAME: &str = "airaware";

/// Flushes exported spans when dropped. Keep it alive for the whole run.
pub struct TelemetryGuard {
    provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            if let Err(err) = provider.shutdown() {
                eprintln!("failed to flush traces: {err}");
            }
        }
    }
}

/// Resolve the effective filter directive.
///
/// `RUST_LOG` replaces the configured level when set. `verbose` bumps our own
/// crate to debug on top of either, without making dependencies chatty.
#[must_use]
pub fn filter_directive(env: Option<&str>, level: &str, verbose: bool) -> String {
    let base = match env.map(str::trim).filter(|e| !e.is_empty()) {
        Some(env) => env.to_string(),
        None => format!("{level},hyper=warn,reqwest=warn"),
    };
    if verbose {
        format!("{base},airaware=debug")
    } else {
        base
    }
}

pub fn init(config: &AirAwareConfig, verbose: bool) -> Result<TelemetryGuard> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = EnvFilter::try_new(filter_directive(env.as_deref(), &config.logging.level, verbose))
        .map_err(|e| AirAwareError::config(format!("Invalid log filter: {e}")))?;

    let provider = match &config.telemetry.otlp_endpoint {
        Some(endpoint) => Some(build_tracer_provider(endpoint)?),
        None => None,
    };
    let otel_layer = provider.as_ref().map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer(SERVICE_NAME))
    });

    let json = config.logging.format == "json";
    let json_layer = json.then(|| fmt::layer().json().with_writer(std::io::stderr));
    let pretty_layer = (!json).then(|| fmt::layer().with_target(false).with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(otel_layer)
        .with(json_layer)
        .with(pretty_layer)
        .try_init()
        .map_err(|e| AirAwareError::config(format!("Failed to install tracing subscriber: {e}")))?;

    Ok(TelemetryGuard { provider })
}

fn build_tracer_provider(endpoint: &str) -> Result<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| AirAwareError::config(format!("Invalid OTLP exporter setup: {e}")))?;

    let resource = Resource::builder()
        .with_service_name(SERVICE_NAME)
        .with_attribute(KeyValue::new(SERVICE_VERSION, VERSION))
        .build();

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive() {
        assert_eq!(
            filter_directive(None, "info", true),
            "info,hyper=warn,reqwest=warn,airaware=debug"
        );
        assert_eq!(filter_directive(None, "warn", false), "warn,hyper=warn,reqwest=warn");
        assert!(EnvFilter::try_new(filter_directive(None, "debug", false)).is_ok());
    }

    #[test]
    fn test_verbose_applies_on_top_of_rust_log() {
        assert_eq!(filter_directive(Some("error"), "info", false), "error");
        assert_eq!(
            filter_directive(Some("error"), "info", true),
            "error,airaware=debug"
        );
        assert_eq!(filter_directive(Some("  "), "info", false), "info,hyper=warn,reqwest=warn");
    }
}

//! Logging and trace export for planner binaries.
//!
//! Call [`init_tracing`] once at startup.  Planning runs emit structured
//! `tracing` events (graph sizes, per-metric timings, failures); this module
//! decides where they go.
//!
//! # Environment variables
//!
//! | Variable | Effect |
//! |---|---|
//! | `RUST_LOG` | Log filter (default `"info"`). |
//! | `ESPELEO_LOG_FORMAT=json` | Emit newline-delimited JSON logs. |
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | OTLP collector base URL.  When set, spans are exported over OTLP/HTTP. |
//!
//! # Example
//!
//! ```rust,no_run
//! let _guard = espeleo_planner::telemetry::init_tracing("espeleo-plan");
//! ```

use espeleo_types::GraphMetricType;
use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber.  Hold the returned guard until exit so
/// pending spans are flushed.
pub fn init_tracing(service_name: &str) -> TracerProviderGuard {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let provider = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .ok()
        .and_then(|endpoint| otlp_provider(&endpoint, planner_resource(service_name)));
    let otel_layer = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer("espeleo.planner")));

    let registry = tracing_subscriber::registry().with(env_filter).with(otel_layer);
    match std::env::var("ESPELEO_LOG_FORMAT").as_deref() {
        Ok("json") => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        _ => registry.with(tracing_subscriber::fmt::layer().compact()).init(),
    }

    TracerProviderGuard(provider)
}

/// Shuts the OTel provider down on drop.
pub struct TracerProviderGuard(Option<SdkTracerProvider>);

impl Drop for TracerProviderGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.0.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("[espeleo] span flush failed: {e}");
        }
    }
}

/// Service identity plus the planner build that produced the spans.
fn planner_resource(service_name: &str) -> Resource {
    Resource::builder()
        .with_service_name(service_name.to_string())
        .with_attributes([
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
            KeyValue::new("espeleo.metric_count", GraphMetricType::ALL.len() as i64),
        ])
        .build()
}

/// Simple (synchronous) OTLP/HTTP export; the CLI initialises tracing
/// before any Tokio runtime exists.  `None` if the exporter fails to build.
fn otlp_provider(endpoint: &str, resource: Resource) -> Option<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| eprintln!("[espeleo] OTLP exporter init failed: {e}"))
        .ok()?;
    Some(
        SdkTracerProvider::builder()
            .with_resource(resource)
            .with_simple_exporter(exporter)
            .build(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::Key;

    #[test]
    fn resource_carries_planner_identity() {
        let resource = planner_resource("espeleo-test");
        let get = |k: &'static str| resource.get(&Key::new(k)).map(|v| v.to_string());
        assert_eq!(get("service.name").as_deref(), Some("espeleo-test"));
        assert_eq!(get("service.version").as_deref(), Some(env!("CARGO_PKG_VERSION")));
        assert_eq!(get("espeleo.metric_count").as_deref(), Some("7"));
    }

    #[test]
    fn empty_guard_drops_cleanly() {
        drop(TracerProviderGuard(None));
    }
}

use std::collections::HashMap;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::{WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::trace::TracerProvider;
use opentelemetry_sdk::Resource;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Where spans go besides stdout.
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    pub service_name: String,
    /// OTLP/HTTP base URL; `/v1/traces` is appended by the exporter.
    pub otlp_endpoint: Option<String>,
    pub otlp_token: Option<String>,
}

/// Keeps the span exporter alive. Call [`TelemetryGuard::shutdown`] before exit
/// so buffered spans are flushed.
pub struct TelemetryGuard {
    provider: Option<TracerProvider>,
}

impl TelemetryGuard {
    pub fn shutdown(self) {
        if let Some(provider) = self.provider {
            if let Err(e) = provider.shutdown() {
                tracing::warn!(error=%e, "failed to flush span exporter");
            }
        }
    }
}

fn build_provider(cfg: &TelemetryConfig, endpoint: &str) -> anyhow::Result<TracerProvider> {
    let mut headers = HashMap::new();
    if let Some(token) = cfg.otlp_token.as_deref().filter(|t| !t.is_empty()) {
        headers.insert("Authorization".to_string(), format!("Bearer {token}"));
    }

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .with_headers(headers)
        .build()?;

    Ok(TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .with_resource(Resource::new([KeyValue::new(
            "service.name",
            cfg.service_name.clone(),
        )]))
        .build())
}

/// Install the global subscriber: env-filtered fmt output, plus OTLP export when
/// an endpoint is configured. A broken exporter degrades to stdout only.
pub fn init_tracing(cfg: &TelemetryConfig) -> TelemetryGuard {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (provider, exporter_err) = match cfg.otlp_endpoint.as_deref() {
        Some(endpoint) => match build_provider(cfg, endpoint) {
            Ok(p) => (Some(p), None),
            Err(e) => (None, Some(e)),
        },
        None => (None, None),
    };

    let otel_layer = provider.as_ref().map(|p| {
        tracing_opentelemetry::layer().with_tracer(p.tracer(cfg.service_name.clone()))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(otel_layer)
        .init();

    if let Some(e) = exporter_err {
        tracing::warn!(error=%e, "failed to create OTLP exporter, logging to stdout only");
    } else if let Some(endpoint) = cfg.otlp_endpoint.as_deref() {
        tracing::info!(endpoint, service = %cfg.service_name, "OTLP tracing enabled");
    }

    TelemetryGuard { provider }
}

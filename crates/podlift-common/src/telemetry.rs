use opentelemetry::trace::TracerProvider as TracerProviderTrait;
use opentelemetry::KeyValue;
use opentelemetry_otlp::{WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::trace::TracerProvider;
use opentelemetry_sdk::Resource;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Tracing setup for a process.
#[derive(Debug, Clone)]
pub struct TelemetryConfig<'a> {
    /// Identifies this component, e.g. "podlift".
    pub service_name: &'a str,
    /// Filter used when `RUST_LOG` is unset.
    pub default_filter: &'a str,
    pub format: LogFormat,
    /// If set, spans are also exported via OTLP/HTTP to this base URL.
    /// The exporter appends `/v1/traces`.
    pub otlp_endpoint: Option<&'a str>,
    /// Bearer token sent to the OTLP collector.
    pub otlp_token: Option<&'a str>,
}

/// Initialize tracing. Log lines go to stderr so stdout stays free for
/// human-facing output.
///
/// Returns a `TracerProvider` when OTLP export is enabled; the caller keeps it
/// alive and calls `shutdown()` before exit.
pub fn init_tracing(config: TelemetryConfig<'_>) -> Option<TracerProvider> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_filter));

    let json = config.format == LogFormat::Json;
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });

    let Some(endpoint) = config.otlp_endpoint else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(text_layer)
            .with(json_layer)
            .init();
        return None;
    };

    let mut headers = std::collections::HashMap::new();
    if let Some(token) = config.otlp_token {
        if !token.is_empty() {
            headers.insert("Authorization".to_string(), format!("Bearer {token}"));
        }
    }

    let exporter = match opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .with_headers(headers)
        .build()
    {
        Ok(e) => e,
        Err(err) => {
            eprintln!("failed to create OTLP exporter: {err}, logging locally only");
            tracing_subscriber::registry()
                .with(env_filter)
                .with(text_layer)
                .with(json_layer)
                .init();
            return None;
        }
    };

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .with_resource(Resource::new([KeyValue::new(
            "service.name",
            config.service_name.to_string(),
        )]))
        .build();

    let otel_layer =
        tracing_opentelemetry::layer().with_tracer(provider.tracer(config.service_name.to_string()));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(text_layer)
        .with(json_layer)
        .with(otel_layer)
        .init();

    tracing::info!(endpoint, service_name = config.service_name, "OTLP tracing enabled");
    Some(provider)
}

use anyhow::{anyhow, Result};
use opentelemetry::trace::TracerProvider;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{trace as sdktrace, Resource};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt as tfmt;
use tracing_subscriber::{prelude::*, Registry};

/// How log lines are rendered on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "compact" => Ok(Self::Text),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format `{other}` (expected text, pretty or json)")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Pretty => "pretty",
            Self::Json => "json",
        })
    }
}

/// Flushes and shuts down the span exporter when dropped.
#[must_use = "spans are only exported while the guard is alive"]
pub struct TracingGuard {
    provider: Option<sdktrace::SdkTracerProvider>,
}

impl Drop for TracingGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            // the global subscriber may already be torn down here, so report on stderr directly
            if let Err(e) = provider.shutdown() {
                eprintln!("failed to shut down tracer provider: {e}");
            }
        }
    }
}

/// Level filter: `RUST_LOG` when set, else `level`, else `info`.
pub fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn tracer_provider(service_name: &str, endpoint: &str) -> Result<sdktrace::SdkTracerProvider> {
    let resource = Resource::builder()
        .with_service_name(Cow::Owned(service_name.to_string()))
        .with_attributes(vec![KeyValue::new("service.version", env!("CARGO_PKG_VERSION"))])
        .build();

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    Ok(sdktrace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build())
}

/// Initialize logging, plus OTLP span export when `otlp_endpoint` is given.
pub fn init(
    service_name: &str,
    otlp_endpoint: Option<&str>,
    level: &str,
    format: LogFormat,
) -> Result<TracingGuard> {
    let provider = match otlp_endpoint.filter(|e| !e.is_empty()) {
        Some(endpoint) => Some(tracer_provider(service_name, endpoint)?),
        None => None,
    };

    // boxed so every format yields the same layer type
    let fmt_layer: Box<dyn tracing_subscriber::Layer<Registry> + Send + Sync> = match format {
        LogFormat::Json => Box::new(
            tfmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_thread_ids(true)
                .with_current_span(true),
        ),
        LogFormat::Pretty => Box::new(tfmt::layer().pretty().with_writer(std::io::stderr)),
        LogFormat::Text => Box::new(tfmt::layer().with_writer(std::io::stderr).with_target(false)),
    };

    let otel_layer = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer(service_name.to_string())));

    let subscriber = Registry::default()
        .with(fmt_layer)
        .with(otel_layer)
        .with(filter(level));

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow!("tracing already initialized: {e}"))?;

    Ok(TracingGuard { provider })
}

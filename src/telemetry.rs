use std::time::Instant;

use anyhow::Context;
use opentelemetry::{KeyValue, trace::TracerProvider as _};
use opentelemetry_otlp::{Protocol, WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::{
    Resource,
    trace::{RandomIdGenerator, Sampler, SdkTracerProvider},
};
use opentelemetry_semantic_conventions::{
    SCHEMA_URL,
    attribute::{SERVICE_NAME, SERVICE_VERSION},
    resource::DEPLOYMENT_ENVIRONMENT_NAME,
};
use rocket::{
    Data, Request, Response,
    fairing::{Fairing, Info, Kind},
};
use tonic::metadata::{Ascii, MetadataKey, MetadataMap, MetadataValue};
use tracing::{Span, info_span};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;

pub struct TelemetryFairing;

struct RequestTiming {
    span: Span,
    started: Instant,
}

#[rocket::async_trait]
impl Fairing for TelemetryFairing {
    fn info(&self) -> Info {
        Info {
            name: "Request tracing",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _: &mut Data<'_>) {
        let method = request.method().to_string();
        let uri = request.uri().path().to_string();

        let span = info_span!(
            "http_request",
            otel.name = format!("{} {}", method, uri),
            http.method = method,
            http.uri = uri,
            http.status_code = tracing::field::Empty,
            http.duration_ms = tracing::field::Empty,
        );

        request.local_cache(|| RequestTiming {
            span,
            started: Instant::now(),
        });
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let timing = request.local_cache(|| RequestTiming {
            span: info_span!("http_request"),
            started: Instant::now(),
        });

        let duration = timing.started.elapsed();
        let status = response.status().code;

        timing.span.record("http.status_code", status);
        timing
            .span
            .record("http.duration_ms", duration.as_millis() as i64);

        let _entered = timing.span.enter();
        tracing::info!(
            "Completed request in {}ms with status {}",
            duration.as_millis(),
            status
        );
    }
}

fn resource(config: &AppConfig) -> Resource {
    Resource::builder()
        .with_schema_url(
            [
                KeyValue::new(SERVICE_NAME, env!("CARGO_PKG_NAME")),
                KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
                KeyValue::new(DEPLOYMENT_ENVIRONMENT_NAME, config.environment.clone()),
            ],
            SCHEMA_URL,
        )
        .build()
}

/// Parses `key=value,key=value` into gRPC metadata for the exporter.
fn exporter_metadata(raw: Option<&str>) -> anyhow::Result<MetadataMap> {
    let mut metadata = MetadataMap::new();

    for pair in raw
        .unwrap_or_default()
        .split(',')
        .filter(|pair| !pair.trim().is_empty())
    {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("OTLP header '{}' is not key=value", pair))?;

        let key = MetadataKey::<Ascii>::from_bytes(key.trim().as_bytes())
            .with_context(|| format!("Invalid OTLP header name '{}'", key))?;
        let value = value
            .trim()
            .parse::<MetadataValue<Ascii>>()
            .with_context(|| format!("Invalid OTLP header value for '{}'", key.as_str()))?;

        metadata.insert(key, value);
    }

    Ok(metadata)
}

fn init_tracer_provider(endpoint: &str, config: &AppConfig) -> anyhow::Result<SdkTracerProvider> {
    let mut builder = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .with_protocol(Protocol::Grpc)
        .with_metadata(exporter_metadata(config.otlp_headers.as_deref())?);

    if endpoint.starts_with("https://") {
        builder =
            builder.with_tls_config(tonic::transport::ClientTlsConfig::new().with_native_roots());
    }

    let exporter = builder.build().context("Failed to build OTLP span exporter")?;

    Ok(SdkTracerProvider::builder()
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource(config))
        .with_batch_exporter(exporter)
        .build())
}

/// Shuts down span export when dropped.
pub struct TelemetryGuard {
    tracer_provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer_provider.take() {
            if let Err(err) = provider.shutdown() {
                eprintln!("Failed to shut down tracer provider: {:?}", err);
            }
        }
    }
}

/// Installs the global subscriber: an env filter (`RUST_LOG`, default `info`), a fmt
/// layer, and an OpenTelemetry layer when an OTLP endpoint is configured.
pub fn init_tracing(config: &AppConfig) -> anyhow::Result<TelemetryGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let tracer_provider = match config.otlp_endpoint.as_deref() {
        Some(endpoint) => Some(init_tracer_provider(endpoint, config)?),
        None => None,
    };

    let otel_layer = tracer_provider
        .as_ref()
        .map(|provider| OpenTelemetryLayer::new(provider.tracer(env!("CARGO_PKG_NAME"))));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(otel_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(TelemetryGuard { tracer_provider })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exporter_metadata_parses_pairs() {
        let metadata = exporter_metadata(Some("x-honeycomb-team=abc, x-dataset = practice"))
            .expect("headers should parse");

        assert_eq!(
            metadata.get("x-honeycomb-team").unwrap().to_str().unwrap(),
            "abc"
        );
        assert_eq!(
            metadata.get("x-dataset").unwrap().to_str().unwrap(),
            "practice"
        );
    }

    #[test]
    fn test_exporter_metadata_empty() {
        assert!(exporter_metadata(None).unwrap().is_empty());
        assert!(exporter_metadata(Some(" , ")).unwrap().is_empty());
    }

    #[test]
    fn test_exporter_metadata_rejects_malformed_pair() {
        assert!(exporter_metadata(Some("no-equals-sign")).is_err());
    }
}

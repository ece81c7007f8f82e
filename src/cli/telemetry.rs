//! Logging and optional OpenTelemetry export.
//!
//! Spans are exported over OTLP/gRPC only when `OTEL_EXPORTER_OTLP_ENDPOINT` is set;
//! otherwise events go to the pretty formatter alone.

use crate::GIT_COMMIT_HASH;
use anyhow::{Context, Result, anyhow};
use base64::{Engine, engine::general_purpose};
use once_cell::sync::OnceCell;
use opentelemetry::propagation::TextMapCompositePropagator;
use opentelemetry::{KeyValue, global, trace::TracerProvider as _};
use opentelemetry_otlp::{Compression, WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::{
    Resource,
    propagation::{BaggagePropagator, TraceContextPropagator},
    trace::{SdkTracerProvider, Tracer},
};
use std::{env::var, time::Duration};
use tonic::metadata::{Ascii, Binary, MetadataKey, MetadataMap, MetadataValue};
use tracing::{Level, debug};
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt};
use ulid::Ulid;

const ENV_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
const ENV_HEADERS: &str = "OTEL_EXPORTER_OTLP_HEADERS";
const ENV_PROTOCOL: &str = "OTEL_EXPORTER_OTLP_PROTOCOL";
const ENV_INSTANCE_ID: &str = "OTEL_SERVICE_INSTANCE_ID";

const EXPORT_TIMEOUT: Duration = Duration::from_secs(3);

static TRACER_PROVIDER: OnceCell<SdkTracerProvider> = OnceCell::new();

/// Exporter settings read from the standard `OTEL_*` variables.
#[derive(Debug)]
struct OtlpSettings {
    endpoint: String,
    metadata: MetadataMap,
    instance_id: String,
}

impl OtlpSettings {
    /// `None` when no endpoint is configured.
    fn from_env() -> Result<Option<Self>> {
        let Ok(endpoint) = var(ENV_ENDPOINT) else {
            return Ok(None);
        };

        if let Ok(proto) = var(ENV_PROTOCOL)
            && proto != "grpc"
        {
            debug!("{ENV_PROTOCOL}='{proto}' ignored: only 'grpc' is supported");
        }

        let metadata = match var(ENV_HEADERS) {
            Ok(raw) => metadata_from_headers(&raw).context("Invalid OTLP headers")?,
            Err(_) => MetadataMap::new(),
        };

        Ok(Some(Self {
            endpoint: normalize_endpoint(&endpoint),
            metadata,
            instance_id: var(ENV_INSTANCE_ID).unwrap_or_else(|_| Ulid::new().to_string()),
        }))
    }

    fn resource(&self) -> Resource {
        Resource::builder_empty()
            .with_attributes([
                KeyValue::new("service.name", env!("CARGO_PKG_NAME")),
                KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                KeyValue::new("service.instance.id", self.instance_id.clone()),
                KeyValue::new("vcs.revision", GIT_COMMIT_HASH),
            ])
            .build()
    }
}

/// Parse `key=value,key=value` into gRPC metadata.
///
/// Pairs without `=` are skipped. Keys ending in `-bin` carry base64 values.
fn metadata_from_headers(raw: &str) -> Result<MetadataMap> {
    let mut metadata = MetadataMap::new();

    for (key, value) in raw.split(',').filter_map(|pair| pair.split_once('=')) {
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();

        if key.ends_with("-bin") {
            let bytes = general_purpose::STANDARD
                .decode(value)
                .map_err(|e| anyhow!("failed to base64-decode value for key {key}: {e}"))?;
            let key = MetadataKey::<Binary>::from_bytes(key.as_bytes())
                .map_err(|e| anyhow!("invalid binary metadata key {key}: {e}"))?;
            metadata.insert_bin(key, MetadataValue::from_bytes(&bytes));
        } else {
            let value: MetadataValue<Ascii> = value
                .parse()
                .map_err(|e| anyhow!("invalid ASCII metadata value for key {key}: {e}"))?;
            let key = MetadataKey::<Ascii>::from_bytes(key.as_bytes())
                .map_err(|e| anyhow!("invalid ASCII metadata key {key}: {e}"))?;
            metadata.insert(key, value);
        }
    }

    Ok(metadata)
}

// Plaintext gRPC unless a scheme says otherwise.
fn normalize_endpoint(endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint.trim_end_matches('/'))
    }
}

fn init_tracer(settings: OtlpSettings) -> Result<Tracer> {
    let resource = settings.resource();

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&settings.endpoint)
        .with_compression(Compression::Gzip)
        .with_timeout(EXPORT_TIMEOUT)
        .with_metadata(settings.metadata)
        .build()?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build();

    let _ = TRACER_PROVIDER.set(provider.clone());

    global::set_tracer_provider(provider.clone());
    global::set_text_map_propagator(TextMapCompositePropagator::new(vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(BaggagePropagator::new()),
    ]));

    Ok(provider.tracer(env!("CARGO_PKG_NAME")))
}

fn env_filter(verbosity_level: Level) -> Result<EnvFilter> {
    Ok(EnvFilter::builder()
        .with_default_directive(verbosity_level.into())
        .from_env_lossy()
        .add_directive("hyper=error".parse()?)
        .add_directive("tokio=error".parse()?)
        .add_directive("sqlx=warn".parse()?)
        .add_directive("opentelemetry_sdk=warn".parse()?))
}

/// Initialize logging and, when configured, the OTLP span exporter.
///
/// # Errors
///
/// Returns an error if the OTLP settings are invalid or subscriber initialization fails
pub fn init(verbosity_level: Option<Level>) -> Result<()> {
    let fmt_layer = fmt::layer()
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_target(false)
        .pretty();

    let filter = env_filter(verbosity_level.unwrap_or(Level::ERROR))?;

    if let Some(settings) = OtlpSettings::from_env()? {
        let otel_layer = tracing_opentelemetry::layer().with_tracer(init_tracer(settings)?);
        let subscriber = Registry::default()
            .with(fmt_layer)
            .with(otel_layer)
            .with(filter);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(fmt_layer).with(filter);
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}

/// Flush and shut down the tracer provider (noop if never initialized).
pub fn shutdown_tracer() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        debug!("shutting down tracer provider");
        if let Err(err) = provider.shutdown() {
            debug!("tracer provider shutdown failed: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_skip_malformed_pairs_and_keep_equals_in_values() -> Result<()> {
        let metadata =
            metadata_from_headers("Authorization=Basic YWJjOmRlZg==,malformed, x-tenant = ops")?;
        assert_eq!(metadata.len(), 2);
        assert_eq!(
            metadata.get("authorization").and_then(|v| v.to_str().ok()),
            Some("Basic YWJjOmRlZg==")
        );
        assert_eq!(
            metadata.get("x-tenant").and_then(|v| v.to_str().ok()),
            Some("ops")
        );
        assert!(metadata_from_headers("")?.is_empty());
        Ok(())
    }

    #[test]
    fn binary_headers_are_base64_decoded() -> Result<()> {
        let metadata = metadata_from_headers("trace-bin=YmluYXJ5IGRhdGE=")?;
        let value = metadata.get_bin("trace-bin").and_then(|v| v.to_bytes().ok());
        assert_eq!(value.as_deref(), Some(&b"binary data"[..]));

        let err = metadata_from_headers("trace-bin=not-valid-base64!!!").err();
        assert!(err.is_some_and(|err| err.to_string().contains("failed to base64-decode")));
        Ok(())
    }

    #[test]
    fn endpoint_defaults_to_plaintext_scheme() {
        assert_eq!(normalize_endpoint("localhost:4317/"), "http://localhost:4317");
        assert_eq!(
            normalize_endpoint("https://otel.example.com:4317"),
            "https://otel.example.com:4317"
        );
    }

    #[test]
    fn settings_absent_without_endpoint() {
        temp_env::with_vars_unset([ENV_ENDPOINT, ENV_HEADERS], || {
            assert!(matches!(OtlpSettings::from_env(), Ok(None)));
        });
    }

    #[test]
    fn settings_read_from_env() {
        temp_env::with_vars(
            [
                (ENV_ENDPOINT, Some("collector:4317")),
                (ENV_HEADERS, Some("x-team=auth")),
                (ENV_INSTANCE_ID, Some("chiave-1")),
            ],
            || {
                let settings = OtlpSettings::from_env().ok().flatten();
                assert_eq!(
                    settings.as_ref().map(|s| s.endpoint.as_str()),
                    Some("http://collector:4317")
                );
                assert_eq!(
                    settings.as_ref().map(|s| s.instance_id.as_str()),
                    Some("chiave-1")
                );
                assert_eq!(settings.map(|s| s.metadata.len()), Some(1));
            },
        );
    }

    #[test]
    fn invalid_headers_fail_settings() {
        temp_env::with_vars(
            [
                (ENV_ENDPOINT, Some("collector:4317")),
                (ENV_HEADERS, Some("trace-bin=%%%")),
            ],
            || {
                assert!(OtlpSettings::from_env().is_err());
            },
        );
    }

    #[test]
    fn shutdown_without_provider_is_noop() {
        shutdown_tracer();
    }
}

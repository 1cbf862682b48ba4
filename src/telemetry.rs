//! Tracer construction and the process-wide setup gate.
//!
//! Two entry points:
//!
//! - [`configure_tracing`] is the environment-driven path: it checks the
//!   `TRACING_ENABLED` switch, reads the rest of the configuration from the
//!   environment, and guarantees initialization happens at most once per
//!   process. Repeated calls hand back clones of the same [`Telemetry`]
//!   handle.
//! - [`init_telemetry`] takes an explicit [`TelemetryConfig`] and always
//!   builds a fresh tracer pipeline. Use it when configuration comes from
//!   somewhere other than the environment.
//!
//! The returned [`Telemetry`] handle is what gets threaded into the
//! framework adapters:
//!
//! ```no_run
//! use axum::{routing::get, Router};
//! use web_otel_lite::{configure_tracing, HttpTracingLayer};
//!
//! # fn main() -> Result<(), web_otel_lite::TelemetryError> {
//! let mut app: Router = Router::new().route("/", get(|| async { "ok" }));
//! if let Some(telemetry) = configure_tracing()? {
//!     app = app.route_layer(HttpTracingLayer::new(telemetry));
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, OnceLock};

use opentelemetry::trace::{SpanKind, TracerProvider as _};
use opentelemetry::{global, Context, InstrumentationScope};
use opentelemetry_otlp::{Protocol, WithExportConfig};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

use crate::attributes::BodyCapture;
use crate::config::{self, TelemetryConfig};
use crate::constants::env_vars;
use crate::error::TelemetryError;
use crate::propagation;

static CONFIGURED: OnceLock<Telemetry> = OnceLock::new();

/// Cheaply cloneable handle to the configured tracer pipeline.
///
/// Wraps the provider, a named tracer, and the body-capture policy the
/// middleware consults per request. Clones share the underlying provider.
#[derive(Clone, Debug)]
pub struct Telemetry {
    provider: Arc<SdkTracerProvider>,
    tracer: opentelemetry_sdk::trace::Tracer,
    capture: BodyCapture,
}

impl Telemetry {
    /// Wraps an already-built provider.
    ///
    /// [`init_telemetry`] calls this internally; it is public so tests and
    /// applications with custom pipelines can construct a handle around
    /// their own provider.
    pub fn new(provider: SdkTracerProvider, capture: BodyCapture) -> Self {
        let scope = InstrumentationScope::builder(env!("CARGO_PKG_NAME"))
            .with_version(env!("CARGO_PKG_VERSION"))
            .build();
        let tracer = provider.tracer_with_scope(scope);
        Self {
            provider: Arc::new(provider),
            tracer,
            capture,
        }
    }

    /// The tracer this handle spans with.
    pub fn tracer(&self) -> &opentelemetry_sdk::trace::Tracer {
        &self.tracer
    }

    /// The body-capture policy derived from configuration.
    pub fn body_capture(&self) -> BodyCapture {
        self.capture.clone()
    }

    /// Starts a span of the given kind under `parent`.
    pub fn start_span(
        &self,
        name: String,
        kind: SpanKind,
        parent: &Context,
    ) -> opentelemetry_sdk::trace::Span {
        use opentelemetry::trace::Tracer as _;
        self.tracer
            .span_builder(name)
            .with_kind(kind)
            .start_with_context(&self.tracer, parent)
    }

    /// Extracts a parent context from incoming request headers.
    pub fn extract(&self, headers: &http::HeaderMap) -> Context {
        propagation::extract_context(headers)
    }

    /// Injects trace context into outgoing request headers.
    pub fn inject(&self, cx: &Context, headers: &mut http::HeaderMap) {
        propagation::inject_context(cx, headers);
    }

    /// Flushes any batched spans to the exporter.
    pub fn force_flush(&self) {
        if let Err(error) = self.provider.force_flush() {
            tracing::warn!(?error, "failed to flush spans");
        }
    }

    /// Flushes and shuts the provider down. Call once at process exit.
    pub fn shutdown(&self) {
        if let Err(error) = self.provider.shutdown() {
            tracing::warn!(?error, "failed to shut down tracer provider");
        }
    }

    #[cfg(test)]
    pub(crate) fn shares_provider_with(&self, other: &Telemetry) -> bool {
        Arc::ptr_eq(&self.provider, &other.provider)
    }
}

/// Environment-driven, at-most-once telemetry setup.
///
/// Returns `Ok(None)` unless `TRACING_ENABLED` holds a truthy value. When
/// enabled, the first call builds the pipeline from the environment and every
/// later call returns a clone of the same handle without re-running any
/// initialization. A missing `TRACING_SERVICE_NAME` is a hard error.
pub fn configure_tracing() -> Result<Option<Telemetry>, TelemetryError> {
    if !config::is_enabled(env_vars::ENABLED) {
        return Ok(None);
    }
    if let Some(telemetry) = CONFIGURED.get() {
        return Ok(Some(telemetry.clone()));
    }
    let telemetry = init_telemetry(TelemetryConfig::from_env()?)?;
    // A concurrent first call may have won the race; keep whichever handle
    // landed in the cell so every caller shares one provider.
    Ok(Some(CONFIGURED.get_or_init(|| telemetry).clone()))
}

/// Builds the full tracer pipeline from an explicit configuration.
///
/// Registers the W3C trace context propagator and the global tracer
/// provider, builds an OTLP/HTTP exporter with a batch processor, and
/// installs a `tracing` subscriber bridging spans and events into
/// OpenTelemetry. With `config.logging` set, a console fmt layer is added.
pub fn init_telemetry(config: TelemetryConfig) -> Result<Telemetry, TelemetryError> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    let exporter = build_exporter(&config)?;

    let resource = Resource::builder()
        .with_service_name(config.service_name.clone())
        .build();

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build();
    global::set_tracer_provider(provider.clone());

    let capture = BodyCapture {
        enabled: config.store_http_body,
        size_limit: config.http_body_size_limit,
    };
    let telemetry = Telemetry::new(provider, capture);

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    let otel_layer = tracing_opentelemetry::OpenTelemetryLayer::new(telemetry.tracer().clone());
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(otel_layer);

    if config.logging {
        tracing::subscriber::set_global_default(
            registry.with(tracing_subscriber::fmt::layer().with_target(false)),
        )?;
    } else {
        tracing::subscriber::set_global_default(registry)?;
    }

    Ok(telemetry)
}

fn build_exporter(config: &TelemetryConfig) -> Result<opentelemetry_otlp::SpanExporter, TelemetryError> {
    let endpoint = format!(
        "http://{}:{}/v1/traces",
        config.agent_host, config.agent_port
    );
    opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_protocol(Protocol::HttpBinary)
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| TelemetryError::ExporterBuild(e.to_string()))
}

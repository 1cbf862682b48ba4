//! Error types for telemetry initialization.

use thiserror::Error;

/// Errors that can occur while reading configuration or building the tracer.
///
/// All variants are startup failures. Nothing in the per-request path returns
/// these; once a [`Telemetry`](crate::Telemetry) handle exists, span
/// processing errors are handled inside the OpenTelemetry SDK.
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// Tracing is enabled but the service name variable is unset.
    #[error("tracing is enabled but TRACING_SERVICE_NAME is not set")]
    MissingServiceName,

    /// The agent port variable holds something other than a port number.
    #[error("invalid agent port: {0}")]
    InvalidPort(String),

    /// The body size limit variable holds something other than an integer.
    #[error("invalid body size limit: {0}")]
    InvalidBodyLimit(String),

    /// The OTLP span exporter could not be constructed.
    #[error("failed to build OTLP span exporter: {0}")]
    ExporterBuild(String),

    /// A global `tracing` subscriber was already installed.
    #[error("failed to install tracing subscriber: {0}")]
    SubscriberInit(#[from] tracing::subscriber::SetGlobalDefaultError),
}

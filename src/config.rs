//! Configuration for telemetry initialization.
//!
//! Configuration can be assembled programmatically with the builder or read
//! from the environment with [`TelemetryConfig::from_env`]. The builder takes
//! precedence in applications that want to bypass environment variables
//! entirely; [`configure_tracing`](crate::configure_tracing) always goes
//! through the environment.
//!
//! # Example
//!
//! ```no_run
//! use web_otel_lite::TelemetryConfig;
//!
//! let config = TelemetryConfig::builder()
//!     .service_name("payments".to_string())
//!     .agent_host("collector.internal".to_string())
//!     .store_http_body(true)
//!     .build();
//! ```

use std::env;

use bon::Builder;

use crate::constants::{defaults, env_vars};
use crate::error::TelemetryError;

/// Returns true when the given environment variable holds a truthy value.
///
/// Truthy spellings are `true`, `on`, `ok`, `y`, `yes` and `1`, compared
/// case-insensitively. Everything else, including an unset variable, is
/// false.
pub fn is_enabled(key: &str) -> bool {
    matches!(
        env::var(key).unwrap_or_default().to_lowercase().as_str(),
        "true" | "on" | "ok" | "y" | "yes" | "1"
    )
}

/// Settings controlling tracer construction and body capture.
#[derive(Builder, Debug, Clone)]
pub struct TelemetryConfig {
    /// Logical service name, reported as the `service.name` resource
    /// attribute on every exported span.
    #[builder(into)]
    pub service_name: String,

    /// Hostname of the OTLP/HTTP collector.
    #[builder(into, default = defaults::AGENT_HOST.to_string())]
    pub agent_host: String,

    /// Port of the OTLP/HTTP collector.
    #[builder(default = defaults::AGENT_PORT)]
    pub agent_port: u16,

    /// Emit formatted log output to the console in addition to span export.
    #[builder(default = false)]
    pub logging: bool,

    /// Record HTTP request and response bodies as span attributes.
    #[builder(default = false)]
    pub store_http_body: bool,

    /// Maximum body size in bytes to record. `None` means unlimited.
    pub http_body_size_limit: Option<usize>,
}

impl TelemetryConfig {
    /// Reads configuration from the environment.
    ///
    /// The service name is required; host and port fall back to
    /// [`defaults`]. Callers are expected to check
    /// [`is_enabled`]`(`[`env_vars::ENABLED`]`)` first — this function does
    /// not consult the enable switch.
    pub fn from_env() -> Result<Self, TelemetryError> {
        let service_name =
            env::var(env_vars::SERVICE_NAME).map_err(|_| TelemetryError::MissingServiceName)?;

        let agent_host =
            env::var(env_vars::AGENT_HOST).unwrap_or_else(|_| defaults::AGENT_HOST.to_string());

        let agent_port = match env::var(env_vars::AGENT_PORT) {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| TelemetryError::InvalidPort(raw))?,
            Err(_) => defaults::AGENT_PORT,
        };

        let http_body_size_limit = match env::var(env_vars::HTTP_BODY_SIZE_LIMIT) {
            Ok(raw) => Some(
                raw.parse::<usize>()
                    .map_err(|_| TelemetryError::InvalidBodyLimit(raw))?,
            ),
            Err(_) => None,
        };

        Ok(Self {
            service_name,
            agent_host,
            agent_port,
            logging: is_enabled(env_vars::LOGGING),
            store_http_body: is_enabled(env_vars::STORE_HTTP_BODY),
            http_body_size_limit,
        })
    }
}

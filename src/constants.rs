//! Constants used throughout the crate.
//!
//! This module centralizes environment variable names, default values, and the
//! component registry so other modules and applications reference a single
//! source of truth.

/// Environment variable names for runtime configuration.
pub mod env_vars {
    /// Master switch for the whole instrumentation stack.
    ///
    /// Accepts `true`, `on`, `ok`, `y`, `yes` or `1` (case-insensitive).
    /// Any other value, or an unset variable, leaves tracing disabled.
    pub const ENABLED: &str = "TRACING_ENABLED";

    /// Logical service name reported as the `service.name` resource attribute.
    ///
    /// Required whenever tracing is enabled.
    pub const SERVICE_NAME: &str = "TRACING_SERVICE_NAME";

    /// Hostname of the OTLP/HTTP collector endpoint.
    pub const AGENT_HOST: &str = "TRACING_AGENT_HOST";

    /// Port of the OTLP/HTTP collector endpoint.
    pub const AGENT_PORT: &str = "TRACING_AGENT_PORT";

    /// Enables console log output alongside span export.
    pub const LOGGING: &str = "TRACING_LOGGING";

    /// Enables capture of HTTP request and response bodies as span attributes.
    pub const STORE_HTTP_BODY: &str = "TRACING_STORE_HTTP_BODY";

    /// Upper bound in bytes for captured bodies. Unset means unlimited.
    pub const HTTP_BODY_SIZE_LIMIT: &str = "TRACING_HTTP_BODY_SIZE_LIMIT";
}

/// Default values used when the corresponding environment variable is unset.
pub mod defaults {
    /// Default collector host.
    pub const AGENT_HOST: &str = "127.0.0.1";

    /// Default collector port (OTLP/HTTP).
    pub const AGENT_PORT: u16 = 4318;
}

/// Values for the `component` span attribute, one per framework adapter.
pub mod components {
    pub const AXUM: &str = "axum";
    pub const ACTIX_WEB: &str = "actix-web";
}

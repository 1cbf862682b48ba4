//! Lightweight OpenTelemetry instrumentation for Rust web services.
//!
//! This crate wires [axum] and [actix-web] applications into an
//! OTLP-exporting tracer with a few lines of setup. It provides:
//!
//! - **Environment-driven configuration** with an at-most-once setup gate
//!   ([`configure_tracing`]), or explicit configuration via
//!   [`TelemetryConfig`] and [`init_telemetry`].
//! - **Server middleware** for axum ([`HttpTracingLayer`]) and actix-web
//!   ([`RequestTracing`]) that opens one `server` span per request and
//!   records a fixed, ordered set of HTTP attributes: method, URL, user
//!   agent, content types, optionally bodies, status code, and an `error`
//!   flag for non-2xx responses.
//! - **Client middleware** for `reqwest` ([`client::traced_client`]) that
//!   propagates W3C trace context downstream and flags failed calls.
//!
//! # Quick start
//!
//! ```no_run
//! use axum::{routing::get, Router};
//! use web_otel_lite::{configure_tracing, HttpTracingLayer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut app: Router = Router::new().route("/", get(|| async { "ok" }));
//!     if let Some(telemetry) = configure_tracing()? {
//!         app = app.route_layer(HttpTracingLayer::new(telemetry));
//!     }
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! Tracing stays off until `TRACING_ENABLED` holds a truthy value (`true`,
//! `on`, `ok`, `y`, `yes`, `1`); once enabled, `TRACING_SERVICE_NAME` is
//! required. See [`constants::env_vars`] for the full list of variables.
//!
//! [axum]: https://docs.rs/axum
//! [actix-web]: https://docs.rs/actix-web

pub mod attributes;
pub mod config;
pub mod constants;
pub mod error;
pub mod propagation;
pub mod telemetry;

#[cfg(feature = "actix-web")]
pub mod actix;
#[cfg(feature = "client")]
pub mod client;
#[cfg(feature = "axum")]
pub mod layer;

pub use attributes::{request_attributes, response_attributes, BodyCapture, RequestMeta, ResponseMeta};
pub use config::TelemetryConfig;
pub use error::TelemetryError;
pub use telemetry::{configure_tracing, init_telemetry, Telemetry};

#[cfg(feature = "actix-web")]
pub use actix::RequestTracing;
#[cfg(feature = "axum")]
pub use layer::{HttpTracingLayer, HttpTracingService};

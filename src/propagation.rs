//! W3C trace context propagation helpers.
//!
//! Thin wrappers over the globally registered text map propagator, using the
//! `http` crate's `HeaderMap` as the carrier. [`init_telemetry`] registers a
//! [`TraceContextPropagator`] so the headers involved are `traceparent` and
//! `tracestate`.
//!
//! [`init_telemetry`]: crate::telemetry::init_telemetry
//! [`TraceContextPropagator`]: opentelemetry_sdk::propagation::TraceContextPropagator

use opentelemetry::global;
use opentelemetry::Context;
use opentelemetry_http::{HeaderExtractor, HeaderInjector};

/// Extracts a parent context from incoming request headers.
///
/// Returns a root context when the headers carry no (or invalid) trace
/// context, which is exactly what a span builder wants as a parent in that
/// case.
pub fn extract_context(headers: &http::HeaderMap) -> Context {
    global::get_text_map_propagator(|propagator| propagator.extract(&HeaderExtractor(headers)))
}

/// Injects the context's trace information into outgoing request headers.
///
/// A context without a valid span produces no headers; the map is left
/// untouched.
pub fn inject_context(cx: &Context, headers: &mut http::HeaderMap) {
    global::get_text_map_propagator(|propagator| {
        propagator.inject_context(cx, &mut HeaderInjector(headers));
    });
}

//! Outbound request instrumentation for `reqwest`.
//!
//! [`TracingMiddleware`] propagates the current trace context on outgoing
//! requests and flags failed responses on the active span. Instrumentation
//! is attached per client at construction time; nothing process-wide is
//! touched, so wrapping the same client twice is harmless and wrapping two
//! clients keeps them independent.
//!
//! ```no_run
//! use web_otel_lite::client::traced_client;
//!
//! # async fn call() -> Result<(), Box<dyn std::error::Error>> {
//! let client = traced_client(reqwest::Client::new());
//! let response = client.get("http://downstream/api").send().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use http::Extensions;
use opentelemetry::trace::TraceContextExt;
use opentelemetry::{Context, KeyValue};
use reqwest::{Request, Response};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, Middleware, Next, Result};

use crate::attributes::keys;
use crate::propagation;

/// Middleware injecting W3C trace headers and recording failures.
pub struct TracingMiddleware;

#[async_trait]
impl Middleware for TracingMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        let cx = Context::current();
        // With no active span there is nothing to propagate; the request
        // goes out with its headers untouched.
        if cx.span().span_context().is_valid() {
            propagation::inject_context(&cx, req.headers_mut());
        }

        let result = next.run(req, extensions).await;

        if let Ok(response) = &result {
            if !response.status().is_success() {
                let span = cx.span();
                if span.span_context().is_valid() {
                    span.set_attribute(KeyValue::new(keys::ERROR, true));
                }
            }
        }
        result
    }
}

/// Wraps a `reqwest` client with [`TracingMiddleware`].
pub fn traced_client(client: reqwest::Client) -> ClientWithMiddleware {
    ClientBuilder::new(client).with(TracingMiddleware).build()
}

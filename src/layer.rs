//! Tower middleware for axum.
//!
//! [`HttpTracingLayer`] wraps each matched route in a server span. Register
//! it with [`Router::route_layer`] so requests that match no route bypass
//! the middleware entirely and produce no spans:
//!
//! ```no_run
//! use axum::{routing::get, Router};
//! use web_otel_lite::{HttpTracingLayer, Telemetry};
//!
//! fn router(telemetry: Telemetry) -> Router {
//!     Router::new()
//!         .route("/", get(|| async { "ok" }))
//!         .route_layer(HttpTracingLayer::new(telemetry))
//! }
//! ```
//!
//! The span carries the ordered attribute set from [`crate::attributes`].
//! Request and response bodies are buffered for capture only when the
//! policy allows it and the body advertises an exact size within the limit;
//! streaming bodies pass through untouched and are simply not recorded.
//!
//! [`Router::route_layer`]: axum::Router::route_layer

use std::task::{Context as TaskContext, Poll};

use axum::body::{Body, HttpBody};
use axum::http::{header, HeaderMap, Request, Response};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use opentelemetry::trace::{FutureExt, SpanKind, Status, TraceContextExt};
use tower::{Layer, Service};

use crate::attributes::{self, BodyCapture, RequestMeta, ResponseMeta};
use crate::constants::components;
use crate::telemetry::Telemetry;

/// Tower layer that applies [`HttpTracingService`] to the inner service.
#[derive(Clone)]
pub struct HttpTracingLayer {
    telemetry: Telemetry,
}

impl HttpTracingLayer {
    pub fn new(telemetry: Telemetry) -> Self {
        Self { telemetry }
    }
}

impl<S> Layer<S> for HttpTracingLayer {
    type Service = HttpTracingService<S>;

    fn layer(&self, service: S) -> Self::Service {
        HttpTracingService {
            inner: service,
            telemetry: self.telemetry.clone(),
        }
    }
}

/// Tower service that opens a server span around the inner service call.
#[derive(Clone)]
pub struct HttpTracingService<S> {
    inner: S,
    telemetry: Telemetry,
}

impl<S> Service<Request<Body>> for HttpTracingService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        // Take the ready inner service; the stored clone handles later calls.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let telemetry = self.telemetry.clone();

        Box::pin(async move {
            let parent_cx = telemetry.extract(req.headers());
            let capture = telemetry.body_capture();

            let method = req.method().to_string();
            let path = req.uri().path().to_string();
            let url = request_url(&req);
            let user_agent = header_value(req.headers(), &header::USER_AGENT);
            let content_type = header_value(req.headers(), &header::CONTENT_TYPE);

            let (req, request_body) = if capture.enabled {
                buffer_body(req, &capture).await
            } else {
                (req, None)
            };

            let meta = RequestMeta {
                method: method.clone(),
                url,
                user_agent,
                content_type,
                body: request_body,
            };

            let mut span = telemetry.start_span(
                format!("{method} {path}"),
                SpanKind::Server,
                &parent_cx,
            );
            use opentelemetry::trace::Span as _;
            for attribute in attributes::request_attributes(components::AXUM, &meta, &capture) {
                span.set_attribute(attribute);
            }

            // The context is attached around each poll of the inner future
            // and detached afterwards, so the scope is released on error and
            // cancellation paths too. If the inner service errors, the span
            // ends when the context is dropped.
            let cx = parent_cx.with_span(span);
            let response = inner.call(req).with_context(cx.clone()).await?;

            let status = response.status().as_u16();
            let content_type = header_value(response.headers(), &header::CONTENT_TYPE);
            let (response, response_body) = if capture.enabled {
                let (parts, body) = response.into_parts();
                let (body, bytes) = buffer_response_body(body, &capture).await;
                (Response::from_parts(parts, body), bytes)
            } else {
                (response, None)
            };

            let meta = ResponseMeta {
                status,
                content_type,
                body: response_body,
            };
            {
                let span = cx.span();
                for attribute in attributes::response_attributes(&meta, &capture) {
                    span.set_attribute(attribute);
                }
                if status >= 500 {
                    span.set_status(Status::error(format!("HTTP {status}")));
                }
                span.end();
            }

            Ok(response)
        })
    }
}

/// Reconstructs an absolute URL for the `http.url` attribute.
fn request_url(req: &Request<Body>) -> String {
    let uri = req.uri();
    if uri.authority().is_some() {
        return uri.to_string();
    }
    let host = req
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{host}{uri}")
}

fn header_value(headers: &HeaderMap, name: &header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Buffers a request body when its exact size is known and within the limit.
///
/// Streaming bodies (no exact size hint) and oversized bodies are returned
/// unread so the handler still sees the original stream.
async fn buffer_body(req: Request<Body>, capture: &BodyCapture) -> (Request<Body>, Option<Bytes>) {
    let (parts, body) = req.into_parts();
    match body.size_hint().exact() {
        Some(len) if len > 0 && capture.within_limit(len as usize) => {
            match axum::body::to_bytes(body, len as usize).await {
                Ok(bytes) => (
                    Request::from_parts(parts, Body::from(bytes.clone())),
                    Some(bytes),
                ),
                // A body that fails to read here would fail in the handler
                // as well; pass the failure through as an empty body.
                Err(_) => (Request::from_parts(parts, Body::empty()), None),
            }
        }
        _ => (Request::from_parts(parts, body), None),
    }
}

async fn buffer_response_body(body: Body, capture: &BodyCapture) -> (Body, Option<Bytes>) {
    match body.size_hint().exact() {
        Some(len) if len > 0 && capture.within_limit(len as usize) => {
            match axum::body::to_bytes(body, len as usize).await {
                Ok(bytes) => (Body::from(bytes.clone()), Some(bytes)),
                Err(_) => (Body::empty(), None),
            }
        }
        _ => (body, None),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::Router;
    use opentelemetry::global;
    use opentelemetry_sdk::propagation::TraceContextPropagator;
    use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider};
    use tower::util::ServiceExt;

    use super::*;
    use crate::attributes::keys;

    // Tests hold the returned handle until their assertions run: dropping
    // the last handle drops the provider, which shuts the exporter down and
    // clears its recorded spans.
    fn test_telemetry(capture: BodyCapture) -> (Telemetry, InMemorySpanExporter) {
        global::set_text_map_propagator(TraceContextPropagator::new());
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        (Telemetry::new(provider, capture), exporter)
    }

    fn attribute_keys(span: &opentelemetry_sdk::trace::SpanData) -> Vec<&str> {
        span.attributes.iter().map(|kv| kv.key.as_str()).collect()
    }

    async fn json_handler() -> impl IntoResponse {
        (
            [(header::CONTENT_TYPE, "application/json")],
            "{\"foo\":\"bar\"}",
        )
    }

    #[tokio::test]
    async fn test_round_trip_attribute_sequence() {
        let (telemetry, exporter) = test_telemetry(BodyCapture {
            enabled: true,
            size_limit: None,
        });
        let app = Router::new()
            .route("/", post(json_handler))
            .route_layer(HttpTracingLayer::new(telemetry.clone()));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header(header::HOST, "host")
                    .header(header::USER_AGENT, "test-agent")
                    .header(header::CONTENT_TYPE, "text/plain")
                    .body(Body::from("hello"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"{\"foo\":\"bar\"}");

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        let span = &spans[0];
        assert_eq!(span.name, "POST /");
        assert_eq!(span.span_kind, opentelemetry::trace::SpanKind::Server);
        assert_eq!(
            attribute_keys(span),
            vec![
                keys::SPAN_KIND,
                keys::COMPONENT,
                keys::HTTP_METHOD,
                keys::HTTP_URL,
                keys::HTTP_USER_AGENT,
                keys::HTTP_REQUEST_CONTENT_TYPE,
                keys::HTTP_REQUEST_BODY,
                keys::HTTP_RESPONSE_CONTENT_TYPE,
                keys::HTTP_RESPONSE_BODY,
                keys::HTTP_STATUS_CODE,
            ]
        );
        assert_eq!(span.attributes[1].value.as_str(), "axum");
        assert_eq!(span.attributes[3].value.as_str(), "http://host/");
        assert_eq!(span.attributes[6].value.as_str(), "hello");
        assert_eq!(span.attributes[8].value.as_str(), "{\"foo\":\"bar\"}");
    }

    #[tokio::test]
    async fn test_unmatched_route_records_no_spans() {
        let (telemetry, exporter) = test_telemetry(BodyCapture::default());
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .route_layer(HttpTracingLayer::new(telemetry.clone()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/missing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(exporter.get_finished_spans().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_error_tag_on_404_response() {
        let (telemetry, exporter) = test_telemetry(BodyCapture::default());
        let app = Router::new()
            .route("/gone", get(|| async { StatusCode::NOT_FOUND }))
            .route_layer(HttpTracingLayer::new(telemetry.clone()));

        app.oneshot(Request::builder().uri("/gone").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        let attributes = &spans[0].attributes;
        let names = attribute_keys(&spans[0]);
        assert_eq!(names.last(), Some(&keys::ERROR));
        assert_eq!(names[names.len() - 2], keys::HTTP_STATUS_CODE);
        assert_eq!(
            attributes[attributes.len() - 2].value,
            opentelemetry::Value::I64(404)
        );
        assert_eq!(
            attributes[attributes.len() - 1].value,
            opentelemetry::Value::Bool(true)
        );
    }

    #[tokio::test]
    async fn test_body_capture_respects_limit() {
        let (telemetry, exporter) = test_telemetry(BodyCapture {
            enabled: true,
            size_limit: Some(4),
        });
        let app = Router::new()
            .route("/", post(|| async { "ok" }))
            .route_layer(HttpTracingLayer::new(telemetry.clone()));

        app.oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .body(Body::from("hello"))
                .unwrap(),
        )
        .await
        .unwrap();

        let spans = exporter.get_finished_spans().unwrap();
        assert!(!attribute_keys(&spans[0]).contains(&keys::HTTP_REQUEST_BODY));
    }

    #[tokio::test]
    async fn test_parent_context_is_extracted() {
        let (telemetry, exporter) = test_telemetry(BodyCapture::default());
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .route_layer(HttpTracingLayer::new(telemetry.clone()));

        app.oneshot(
            Request::builder()
                .uri("/")
                .header(
                    "traceparent",
                    "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(
            spans[0].span_context.trace_id(),
            opentelemetry::trace::TraceId::from_hex("4bf92f3577b34da6a3ce929d0e0e4736").unwrap()
        );
    }
}

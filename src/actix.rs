//! Middleware for actix-web.
//!
//! [`RequestTracing`] mirrors the axum layer: one server span per request,
//! same ordered attribute set. The actix request payload is a stream, so
//! request bodies are never captured here; response bodies are captured when
//! the policy allows it and the body is complete (non-streaming).
//!
//! ```no_run
//! use actix_web::{web, App, HttpServer};
//! use web_otel_lite::{configure_tracing, RequestTracing};
//!
//! #[actix_web::main]
//! async fn main() -> std::io::Result<()> {
//!     let telemetry = configure_tracing()
//!         .expect("telemetry setup failed")
//!         .expect("tracing disabled");
//!     HttpServer::new(move || {
//!         App::new()
//!             .wrap(RequestTracing::new(telemetry.clone()))
//!             .route("/", web::get().to(|| async { "ok" }))
//!     })
//!     .bind(("127.0.0.1", 8080))?
//!     .run()
//!     .await
//! }
//! ```

use std::rc::Rc;

use actix_web::body::{BodySize, BoxBody, MessageBody};
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header;
use actix_web::Error;
use bytes::Bytes;
use futures_util::future::{ready, LocalBoxFuture, Ready};
use opentelemetry::propagation::Extractor;
use opentelemetry::global;
use opentelemetry::trace::{FutureExt, SpanKind, Status, TraceContextExt};

use crate::attributes::{self, RequestMeta, ResponseMeta};
use crate::constants::components;
use crate::telemetry::Telemetry;

/// Middleware factory; wrap an `App` or `Scope` with it.
#[derive(Clone)]
pub struct RequestTracing {
    telemetry: Telemetry,
}

impl RequestTracing {
    pub fn new(telemetry: Telemetry) -> Self {
        Self { telemetry }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequestTracing
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = RequestTracingMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestTracingMiddleware {
            service: Rc::new(service),
            telemetry: self.telemetry.clone(),
        }))
    }
}

pub struct RequestTracingMiddleware<S> {
    service: Rc<S>,
    telemetry: Telemetry,
}

impl<S, B> Service<ServiceRequest> for RequestTracingMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let telemetry = self.telemetry.clone();

        Box::pin(async move {
            let parent_cx = global::get_text_map_propagator(|propagator| {
                propagator.extract(&HeaderCarrier(req.headers()))
            });
            let capture = telemetry.body_capture();

            let method = req.method().to_string();
            let path = req.uri().path().to_string();
            let connection = req.connection_info().clone();
            let meta = RequestMeta {
                method: method.clone(),
                url: format!(
                    "{}://{}{}",
                    connection.scheme(),
                    connection.host(),
                    req.uri()
                ),
                user_agent: header_value(req.headers(), &header::USER_AGENT),
                content_type: header_value(req.headers(), &header::CONTENT_TYPE),
                // The actix payload is a stream; never buffered.
                body: None,
            };

            let mut span = telemetry.start_span(
                format!("{method} {path}"),
                SpanKind::Server,
                &parent_cx,
            );
            use opentelemetry::trace::Span as _;
            for attribute in attributes::request_attributes(components::ACTIX_WEB, &meta, &capture)
            {
                span.set_attribute(attribute);
            }

            let cx = parent_cx.with_span(span);
            let res = service.call(req).with_context(cx.clone()).await?;

            // Routing happens inside the wrapped service, so the matched
            // pattern is only known once the call returns.
            if let Some(pattern) = res.request().match_pattern() {
                cx.span().update_name(format!("{method} {pattern}"));
            }

            let status = res.status().as_u16();
            let content_type = header_value(res.headers(), &header::CONTENT_TYPE);

            let mut captured: Option<Bytes> = None;
            let res = if capture.enabled {
                res.map_body(|_, body| match body.size() {
                    BodySize::Sized(len) if len > 0 && capture.within_limit(len as usize) => {
                        match body.try_into_bytes() {
                            Ok(bytes) => {
                                captured = Some(bytes.clone());
                                BoxBody::new(bytes)
                            }
                            Err(body) => body.boxed(),
                        }
                    }
                    _ => body.boxed(),
                })
            } else {
                res.map_body(|_, body| body.boxed())
            };

            let span = cx.span();
            if span.span_context().is_valid() {
                let meta = ResponseMeta {
                    status,
                    content_type,
                    body: captured,
                };
                for attribute in attributes::response_attributes(&meta, &capture) {
                    span.set_attribute(attribute);
                }
                if status >= 500 {
                    span.set_status(Status::error(format!("HTTP {status}")));
                }
                span.end();
            }

            Ok(res)
        })
    }
}

// actix-web has its own header types, so the `http`-crate carrier helpers
// used elsewhere do not apply here.
struct HeaderCarrier<'a>(&'a header::HeaderMap);

impl Extractor for HeaderCarrier<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|name| name.as_str()).collect()
    }
}

fn header_value(headers: &header::HeaderMap, name: &header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

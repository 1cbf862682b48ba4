//! Span attribute construction for HTTP requests and responses.
//!
//! Both framework adapters funnel through the two helpers here so the
//! attribute set, and crucially its order, is identical regardless of which
//! framework served the request. Attributes are returned as a `Vec` and
//! applied to the span in vector order:
//!
//! 1. `span.kind`, `component`, `http.method`, `http.url` — always present
//! 2. `http.user_agent`, `http.request.content_type`, `http.request.body` —
//!    only when non-empty (body also subject to the capture policy)
//! 3. `http.response.content_type`, `http.response.body` — same rule
//! 4. `http.status_code` — always present
//! 5. `error` — only for non-2xx responses

use opentelemetry::{KeyValue, Value};

/// Attribute keys. Kept as the classic OpenTracing-style names so existing
/// dashboards keyed on them keep working.
pub mod keys {
    pub const SPAN_KIND: &str = "span.kind";
    pub const COMPONENT: &str = "component";
    pub const HTTP_METHOD: &str = "http.method";
    pub const HTTP_URL: &str = "http.url";
    pub const HTTP_USER_AGENT: &str = "http.user_agent";
    pub const HTTP_REQUEST_CONTENT_TYPE: &str = "http.request.content_type";
    pub const HTTP_REQUEST_BODY: &str = "http.request.body";
    pub const HTTP_RESPONSE_CONTENT_TYPE: &str = "http.response.content_type";
    pub const HTTP_RESPONSE_BODY: &str = "http.response.body";
    pub const HTTP_STATUS_CODE: &str = "http.status_code";
    pub const ERROR: &str = "error";
}

/// Body capture policy derived from configuration.
#[derive(Debug, Clone, Default)]
pub struct BodyCapture {
    /// Whether bodies are recorded at all.
    pub enabled: bool,
    /// Maximum body size in bytes to record. `None` means unlimited.
    pub size_limit: Option<usize>,
}

impl BodyCapture {
    /// Returns true when a body of `len` bytes fits under the limit.
    ///
    /// The boundary is inclusive: `len == limit` is still captured.
    pub fn within_limit(&self, len: usize) -> bool {
        self.size_limit.map_or(true, |limit| len <= limit)
    }

    fn should_record(&self, body: &[u8]) -> bool {
        self.enabled && !body.is_empty() && self.within_limit(body.len())
    }
}

/// Request-side metadata collected by a framework adapter.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub method: String,
    pub url: String,
    pub user_agent: Option<String>,
    pub content_type: Option<String>,
    /// Buffered request body, when the adapter was able to read it whole.
    /// `None` for streaming bodies or when capture is disabled.
    pub body: Option<bytes::Bytes>,
}

/// Response-side metadata collected by a framework adapter.
#[derive(Debug, Clone, Default)]
pub struct ResponseMeta {
    pub status: u16,
    pub content_type: Option<String>,
    /// Buffered response body, under the same rules as the request body.
    pub body: Option<bytes::Bytes>,
}

/// Builds the ordered request-side attributes for a server span.
pub fn request_attributes(
    component: &'static str,
    meta: &RequestMeta,
    capture: &BodyCapture,
) -> Vec<KeyValue> {
    let mut attributes = vec![
        KeyValue::new(keys::SPAN_KIND, "server"),
        KeyValue::new(keys::COMPONENT, component),
        KeyValue::new(keys::HTTP_METHOD, meta.method.clone()),
        KeyValue::new(keys::HTTP_URL, meta.url.clone()),
    ];
    push_if_present(&mut attributes, keys::HTTP_USER_AGENT, &meta.user_agent);
    push_if_present(
        &mut attributes,
        keys::HTTP_REQUEST_CONTENT_TYPE,
        &meta.content_type,
    );
    push_body(&mut attributes, keys::HTTP_REQUEST_BODY, &meta.body, capture);
    attributes
}

/// Builds the ordered response-side attributes for a server span.
pub fn response_attributes(meta: &ResponseMeta, capture: &BodyCapture) -> Vec<KeyValue> {
    let mut attributes = Vec::new();
    push_if_present(
        &mut attributes,
        keys::HTTP_RESPONSE_CONTENT_TYPE,
        &meta.content_type,
    );
    push_body(
        &mut attributes,
        keys::HTTP_RESPONSE_BODY,
        &meta.body,
        capture,
    );
    attributes.push(KeyValue::new(keys::HTTP_STATUS_CODE, i64::from(meta.status)));
    if !(200..300).contains(&meta.status) {
        attributes.push(KeyValue::new(keys::ERROR, true));
    }
    attributes
}

fn push_if_present(attributes: &mut Vec<KeyValue>, key: &'static str, value: &Option<String>) {
    if let Some(value) = value {
        if !value.is_empty() {
            attributes.push(KeyValue::new(key, value.clone()));
        }
    }
}

fn push_body(
    attributes: &mut Vec<KeyValue>,
    key: &'static str,
    body: &Option<bytes::Bytes>,
    capture: &BodyCapture,
) {
    if let Some(body) = body {
        if capture.should_record(body) {
            // Non-UTF-8 bodies are recorded lossily rather than skipped.
            attributes.push(KeyValue::new(
                key,
                Value::from(String::from_utf8_lossy(body).into_owned()),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn capture_with_limit(limit: usize) -> BodyCapture {
        BodyCapture {
            enabled: true,
            size_limit: Some(limit),
        }
    }

    fn keys_of(attributes: &[KeyValue]) -> Vec<&str> {
        attributes.iter().map(|kv| kv.key.as_str()).collect()
    }

    #[test]
    fn test_request_attribute_order() {
        let meta = RequestMeta {
            method: "POST".to_string(),
            url: "http://host/".to_string(),
            user_agent: Some("test-agent".to_string()),
            content_type: Some("text/plain".to_string()),
            body: Some(Bytes::from_static(b"hello")),
        };
        let capture = BodyCapture {
            enabled: true,
            size_limit: None,
        };
        let attributes = request_attributes("axum", &meta, &capture);
        assert_eq!(
            keys_of(&attributes),
            vec![
                keys::SPAN_KIND,
                keys::COMPONENT,
                keys::HTTP_METHOD,
                keys::HTTP_URL,
                keys::HTTP_USER_AGENT,
                keys::HTTP_REQUEST_CONTENT_TYPE,
                keys::HTTP_REQUEST_BODY,
            ]
        );
        assert_eq!(attributes[0].value.as_str(), "server");
        assert_eq!(attributes[1].value.as_str(), "axum");
        assert_eq!(attributes[6].value.as_str(), "hello");
    }

    #[test]
    fn test_absent_optionals_append_no_tags() {
        let meta = RequestMeta {
            method: "GET".to_string(),
            url: "http://host/".to_string(),
            user_agent: None,
            content_type: Some(String::new()),
            body: None,
        };
        let capture = BodyCapture::default();
        let attributes = request_attributes("axum", &meta, &capture);
        assert_eq!(
            keys_of(&attributes),
            vec![
                keys::SPAN_KIND,
                keys::COMPONENT,
                keys::HTTP_METHOD,
                keys::HTTP_URL,
            ]
        );
    }

    #[test]
    fn test_body_at_limit_is_recorded() {
        let body = Bytes::from(vec![b'x'; 50]);
        let meta = ResponseMeta {
            status: 200,
            content_type: Some("text/plain".to_string()),
            body: Some(body),
        };
        let attributes = response_attributes(&meta, &capture_with_limit(50));
        assert!(keys_of(&attributes).contains(&keys::HTTP_RESPONSE_BODY));
    }

    #[test]
    fn test_body_over_limit_is_silently_omitted() {
        let body = Bytes::from(vec![b'x'; 51]);
        let meta = ResponseMeta {
            status: 200,
            content_type: Some("text/plain".to_string()),
            body: Some(body),
        };
        let attributes = response_attributes(&meta, &capture_with_limit(50));
        assert_eq!(
            keys_of(&attributes),
            vec![keys::HTTP_RESPONSE_CONTENT_TYPE, keys::HTTP_STATUS_CODE]
        );
    }

    #[test]
    fn test_body_skipped_when_capture_disabled() {
        let meta = ResponseMeta {
            status: 200,
            content_type: None,
            body: Some(Bytes::from_static(b"hello")),
        };
        let attributes = response_attributes(&meta, &BodyCapture::default());
        assert_eq!(keys_of(&attributes), vec![keys::HTTP_STATUS_CODE]);
    }

    #[test]
    fn test_empty_body_appends_no_tag() {
        let meta = ResponseMeta {
            status: 200,
            content_type: None,
            body: Some(Bytes::new()),
        };
        let capture = BodyCapture {
            enabled: true,
            size_limit: None,
        };
        let attributes = response_attributes(&meta, &capture);
        assert_eq!(keys_of(&attributes), vec![keys::HTTP_STATUS_CODE]);
    }

    #[test]
    fn test_error_tag_follows_status_for_non_2xx() {
        let meta = ResponseMeta {
            status: 404,
            content_type: None,
            body: None,
        };
        let attributes = response_attributes(&meta, &BodyCapture::default());
        assert_eq!(
            keys_of(&attributes),
            vec![keys::HTTP_STATUS_CODE, keys::ERROR]
        );
        assert_eq!(attributes[0].value, Value::I64(404));
        assert_eq!(attributes[1].value, Value::Bool(true));
    }

    #[test]
    fn test_2xx_has_no_error_tag() {
        for status in [200, 201, 204, 299] {
            let meta = ResponseMeta {
                status,
                content_type: None,
                body: None,
            };
            let attributes = response_attributes(&meta, &BodyCapture::default());
            assert!(!keys_of(&attributes).contains(&keys::ERROR), "{status}");
        }
    }

    #[test]
    fn test_300_is_an_error() {
        let meta = ResponseMeta {
            status: 300,
            content_type: None,
            body: None,
        };
        let attributes = response_attributes(&meta, &BodyCapture::default());
        assert!(keys_of(&attributes).contains(&keys::ERROR));
    }
}

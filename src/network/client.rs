//! HTTP client for forwarding intercepted requests upstream

use std::time::Duration;

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Bytes;
use hyper::{Method, Request, Uri};
use hyper_util::client::legacy::connect::{HttpConnector, HttpInfo};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::{debug, warn};

use crate::proxy::Upstream;
use crate::recording::{Payload, RequestDescriptor, ResponseDescriptor};
use crate::url::{has_scheme, normalize_url};
use crate::{HartraceError, Result};

use super::{is_hop_by_hop, UPSTREAM_TIMEOUT_MS};

/// HTTP client that forwards requests to their absolute target, or to the
/// configured upstream base for relative targets
pub struct HttpClient {
    client: Client<HttpConnector, Full<Bytes>>,
    base: Option<String>,
    max_body_size: usize,
}

impl HttpClient {
    /// Create a new HTTP client
    #[must_use]
    pub fn new(base: Option<String>, max_body_size: usize) -> Self {
        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build_http();

        Self {
            client,
            base,
            max_body_size,
        }
    }

    /// Resolve the URL a request is sent to
    ///
    /// # Errors
    ///
    /// Returns error if the request URL is relative and no upstream base is
    /// configured, or if the result is not a valid URI
    pub fn resolve(&self, url: &str) -> Result<Uri> {
        let target = if has_scheme(url) {
            url.to_string()
        } else {
            let base = self.base.as_deref().ok_or_else(|| {
                HartraceError::Upstream(format!("No upstream configured for relative URL '{url}'"))
            })?;
            normalize_url(url, base)
        };

        target
            .parse::<Uri>()
            .map_err(|e| HartraceError::Upstream(format!("Invalid URI '{target}': {e}")))
    }

    /// Forward a request and collect the full response
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be built, the connection fails,
    /// or the response body exceeds the size limit
    pub async fn forward(&self, request: &RequestDescriptor) -> Result<ResponseDescriptor> {
        let uri = self.resolve(&request.url)?;

        debug!("Forwarding {} to {}", request.method, uri);

        let method = request.method.parse::<Method>().map_err(|e| {
            HartraceError::Upstream(format!("Invalid HTTP method '{}': {e}", request.method))
        })?;

        let mut request_builder = Request::builder().method(method).uri(uri);
        for (name, value) in &request.headers {
            if is_hop_by_hop(name) || name.eq_ignore_ascii_case("host") {
                continue;
            }
            request_builder = request_builder.header(name, value);
        }

        let body = match &request.body {
            Some(payload) => payload_bytes(payload)?,
            None => Bytes::new(),
        };
        let http_request = request_builder
            .body(Full::new(body))
            .map_err(|e| HartraceError::Upstream(format!("Failed to build request: {e}")))?;

        let response = tokio::time::timeout(
            Duration::from_millis(UPSTREAM_TIMEOUT_MS),
            self.client.request(http_request),
        )
        .await
        .map_err(|_| HartraceError::Upstream(format!("Timed out after {UPSTREAM_TIMEOUT_MS}ms")))?
        .map_err(|e| {
            warn!("Request failed: {e}");
            HartraceError::Upstream(format!("Request failed: {e}"))
        })?;

        let status = response.status();
        let server_ip = response
            .extensions()
            .get::<HttpInfo>()
            .map(|info| info.remote_addr().ip().to_string());
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let body_bytes = Limited::new(response.into_body(), self.max_body_size)
            .collect()
            .await
            .map_err(|e| {
                if e.is::<LengthLimitError>() {
                    HartraceError::DataTooLarge {
                        limit: self.max_body_size,
                    }
                } else {
                    HartraceError::Upstream(format!("Failed to read response body: {e}"))
                }
            })?
            .to_bytes();

        let mut forwarded = ResponseDescriptor::new(request.url.clone(), status.as_u16())
            .with_status_text(status.canonical_reason().unwrap_or_default());
        forwarded.headers = headers;
        forwarded.server_ip = server_ip;
        if !body_bytes.is_empty() {
            forwarded.body = Some(Payload::Binary(body_bytes));
        }

        Ok(forwarded)
    }
}

impl Upstream for HttpClient {
    async fn send(&self, request: &RequestDescriptor) -> Result<ResponseDescriptor> {
        self.forward(request).await
    }
}

/// Wire bytes of a payload
///
/// # Errors
///
/// Returns error if a JSON value cannot be serialized
pub fn payload_bytes(payload: &Payload) -> Result<Bytes> {
    Ok(match payload {
        Payload::Json(value) => Bytes::from(serde_json::to_vec(value)?),
        Payload::Text(text) => Bytes::from(text.clone()),
        Payload::Binary(bytes) => bytes.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_absolute() {
        let client = HttpClient::new(None, 1024);
        let uri = client.resolve("http://example.com:8081/api/test?x=1").unwrap();
        assert_eq!(uri.to_string(), "http://example.com:8081/api/test?x=1");
    }

    #[test]
    fn test_resolve_relative_with_base() {
        let client = HttpClient::new(Some("http://127.0.0.1:9000".to_string()), 1024);
        let uri = client.resolve("/api/test").unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:9000/api/test");
    }

    #[test]
    fn test_resolve_relative_without_base() {
        let client = HttpClient::new(None, 1024);
        assert!(matches!(
            client.resolve("/api/test"),
            Err(HartraceError::Upstream(_))
        ));
    }

    #[test]
    fn test_payload_bytes() {
        assert_eq!(
            payload_bytes(&Payload::Json(json!({"a": 1}))).unwrap(),
            Bytes::from_static(b"{\"a\":1}")
        );
        assert_eq!(
            payload_bytes(&Payload::Text("hi".to_string())).unwrap(),
            Bytes::from_static(b"hi")
        );
    }

    #[tokio::test]
    async fn test_forward_connection_refused() {
        // Port 9 (discard) is not expected to accept HTTP on loopback
        let client = HttpClient::new(None, 1024);
        let result = client
            .forward(&RequestDescriptor::new("GET", "http://127.0.0.1:9/"))
            .await;
        assert!(result.is_err());
    }
}

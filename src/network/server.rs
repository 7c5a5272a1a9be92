//! Recording proxy server

use std::convert::Infallible;
use std::sync::Arc;

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderName, HeaderValue, CONTENT_DISPOSITION, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::config::LimitsConfig;
use crate::proxy::{HttpProxy, Upstream};
use crate::recording::{Payload, RequestDescriptor, ResponseDescriptor};
use crate::url::query_pairs;
use crate::{HartraceError, Result};

use super::client::payload_bytes;
use super::connection_pool::ConnectionPool;
use super::{is_hop_by_hop, CONTROL_PREFIX, EXPORT_PATH, NAVIGATE_PATH};

/// Accepts client connections and routes them through the recording proxy
pub struct ProxyServer<U> {
    proxy: Arc<HttpProxy<U>>,
    connection_pool: ConnectionPool,
    max_body_size: usize,
    shutdown_tx: broadcast::Sender<()>,
}

impl<U: Upstream + 'static> ProxyServer<U> {
    /// Create a server around a proxy
    #[must_use]
    pub fn new(proxy: HttpProxy<U>, limits: &LimitsConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            proxy: Arc::new(proxy),
            connection_pool: ConnectionPool::new(limits.max_connections),
            max_body_size: limits.max_body_size,
            shutdown_tx,
        }
    }

    /// The proxy requests are routed through
    #[must_use]
    pub fn proxy(&self) -> &Arc<HttpProxy<U>> {
        &self.proxy
    }

    /// Sender that stops the accept loop when signalled
    #[must_use]
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Serve connections from `listener` until shutdown is signalled
    ///
    /// # Errors
    ///
    /// Returns error if the listener address cannot be read
    pub async fn run(&self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        info!("Recording proxy listening on {}", addr);

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let Some(permit) = self.connection_pool.try_acquire() else {
                                warn!("Connection limit reached, rejecting {}", peer_addr);
                                drop(stream);
                                continue;
                            };

                            let proxy = Arc::clone(&self.proxy);
                            let max_body_size = self.max_body_size;

                            tokio::spawn(async move {
                                let _permit = permit;

                                if let Err(e) = serve_connection(stream, proxy, max_body_size).await {
                                    debug!("Connection from {} ended: {}", peer_addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Proxy on {} shutting down", addr);
                    break;
                }
            }
        }

        Ok(())
    }
}

async fn serve_connection<U: Upstream + 'static>(
    stream: TcpStream,
    proxy: Arc<HttpProxy<U>>,
    max_body_size: usize,
) -> Result<()> {
    let io = TokioIo::new(stream);
    let service = service_fn(move |request| {
        let proxy = Arc::clone(&proxy);
        async move { Ok::<_, Infallible>(route(&proxy, request, max_body_size).await) }
    });

    http1::Builder::new()
        .serve_connection(io, service)
        .await
        .map_err(|e| HartraceError::Other(format!("HTTP connection error: {e}")))
}

/// Dispatch a request to the control endpoints or the proxy
async fn route<U: Upstream>(
    proxy: &HttpProxy<U>,
    request: Request<Incoming>,
    max_body_size: usize,
) -> Response<Full<Bytes>> {
    let is_control =
        request.uri().authority().is_none() && request.uri().path().starts_with(CONTROL_PREFIX);

    let result = if is_control {
        let (parts, _body) = request.into_parts();
        control(proxy, parts.method, parts.uri).await
    } else {
        intercept(proxy, request, max_body_size).await
    };

    result.unwrap_or_else(|e| error_response(&e))
}

/// Navigation and export endpoints
async fn control<U: Upstream>(
    proxy: &HttpProxy<U>,
    method: Method,
    uri: Uri,
) -> Result<Response<Full<Bytes>>> {
    match (method, uri.path()) {
        (Method::POST, NAVIGATE_PATH) => {
            let target = query_pairs(&uri.to_string())
                .into_iter()
                .find_map(|(name, value)| (name == "url").then_some(value));

            let Some(target) = target else {
                return Ok(text_response(
                    StatusCode::BAD_REQUEST,
                    "missing url parameter",
                ));
            };

            proxy.navigate(&target).await;
            Ok(text_response(StatusCode::NO_CONTENT, ""))
        }
        (Method::GET, EXPORT_PATH) => {
            let export = proxy.export().await?;

            let mut response = Response::new(Full::new(export.body().clone()));
            let headers = response.headers_mut();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(export.mime_type()));
            if let Ok(disposition) =
                HeaderValue::from_str(&format!("attachment; filename=\"{}\"", export.file_name()))
            {
                headers.insert(CONTENT_DISPOSITION, disposition);
            }
            Ok(response)
        }
        _ => Ok(text_response(StatusCode::NOT_FOUND, "unknown control endpoint")),
    }
}

/// Read an intercepted request, hand it to the proxy, and write the result
async fn intercept<U: Upstream>(
    proxy: &HttpProxy<U>,
    request: Request<Incoming>,
    max_body_size: usize,
) -> Result<Response<Full<Bytes>>> {
    let (parts, body) = request.into_parts();

    let body = Limited::new(body, max_body_size)
        .collect()
        .await
        .map_err(|e| {
            if e.is::<LengthLimitError>() {
                HartraceError::DataTooLarge {
                    limit: max_body_size,
                }
            } else {
                HartraceError::Other(format!("Failed to read request body: {e}"))
            }
        })?
        .to_bytes();

    let url = parts.uri.to_string();
    let descriptor = RequestDescriptor {
        method: parts.method.to_string(),
        query: query_pairs(&url),
        headers: parts
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect(),
        url,
        body: (!body.is_empty()).then_some(Payload::Binary(body)),
    };

    let response = proxy.handle_request(descriptor).await?;
    to_http_response(&response)
}

/// Build the client-facing response from a recorded descriptor
fn to_http_response(descriptor: &ResponseDescriptor) -> Result<Response<Full<Bytes>>> {
    let body = match &descriptor.body {
        Some(payload) => payload_bytes(payload)?,
        None => Bytes::new(),
    };

    let mut response = Response::new(Full::new(body));
    *response.status_mut() =
        StatusCode::from_u16(descriptor.status).unwrap_or(StatusCode::BAD_GATEWAY);

    for (name, value) in &descriptor.headers {
        if is_hop_by_hop(name) || name.eq_ignore_ascii_case("content-length") {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_bytes(value.as_bytes()),
        ) {
            response.headers_mut().append(name, value);
        }
    }

    Ok(response)
}

fn text_response(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
}

fn error_response(error: &HartraceError) -> Response<Full<Bytes>> {
    let status = match error {
        HartraceError::Upstream(_) => StatusCode::BAD_GATEWAY,
        HartraceError::DataTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    text_response(status, &format!("Error: {error}"))
}

//! Middleware system
//!
//! A middleware wraps the [`Transport`] capability with another transport of
//! the same shape. The chain is folded once, when the client is built:
//! middlewares wrap in registration order, so the last one registered is the
//! outermost and sees the request first.

use crate::error::{redact_credentials, HttpError, HttpResult};
use crate::request::basic_auth_header;
use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use http::header::AUTHORIZATION;
use http::HeaderValue;
use reqwest::ResponseBuilderExt;
use std::sync::Arc;

/// Sends one request and returns the raw response
#[async_trait]
pub trait Transport: Send + Sync {
    async fn round_trip(&self, request: reqwest::Request) -> HttpResult<reqwest::Response>;
}

/// Wraps a transport with cross-cutting behavior
pub trait Middleware: Send + Sync {
    fn wrap(&self, next: Arc<dyn Transport>) -> Arc<dyn Transport>;
}

/// The innermost transport: the pooled reqwest client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn round_trip(&self, request: reqwest::Request) -> HttpResult<reqwest::Response> {
        self.client
            .execute(request)
            .await
            .map_err(HttpError::from_transport)
    }
}

/// Ordered list of middlewares
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    /// Create a new middleware chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a middleware to the chain
    pub fn add(&mut self, middleware: Arc<dyn Middleware>) {
        self.middlewares.push(middleware);
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Fold the chain around `inner`. An empty chain returns `inner` untouched.
    pub fn build(&self, inner: Arc<dyn Transport>) -> Arc<dyn Transport> {
        self.middlewares
            .iter()
            .fold(inner, |next, middleware| middleware.wrap(next))
    }
}

impl From<Vec<Arc<dyn Middleware>>> for MiddlewareChain {
    fn from(middlewares: Vec<Arc<dyn Middleware>>) -> Self {
        Self { middlewares }
    }
}

impl std::fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("len", &self.middlewares.len())
            .finish()
    }
}

// ============================================================================
// Logging Middleware
// ============================================================================

/// Logs request and response bodies at `info` level.
///
/// Credentials in logged bodies (URL userinfo, auth values, tokens) are
/// redacted; everything else is logged as sent.
///
/// The response body is buffered and put back, so layers further out still
/// read the full body.
#[derive(Debug, Clone)]
pub struct Logging {
    max_body_bytes: usize,
}

impl Logging {
    pub fn new() -> Self {
        Self {
            max_body_bytes: 64 * 1024,
        }
    }

    /// Truncate logged bodies to `max` bytes
    pub fn max_body_bytes(mut self, max: usize) -> Self {
        self.max_body_bytes = max;
        self
    }
}

impl Default for Logging {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for Logging {
    fn wrap(&self, next: Arc<dyn Transport>) -> Arc<dyn Transport> {
        Arc::new(LoggingTransport {
            next,
            max_body_bytes: self.max_body_bytes,
        })
    }
}

struct LoggingTransport {
    next: Arc<dyn Transport>,
    max_body_bytes: usize,
}

#[async_trait]
impl Transport for LoggingTransport {
    async fn round_trip(&self, request: reqwest::Request) -> HttpResult<reqwest::Response> {
        let method = request.method().clone();
        let path = request.url().path().to_string();

        // Buffered bodies are readable in place; streaming bodies are not logged.
        let request_body = request
            .body()
            .and_then(reqwest::Body::as_bytes)
            .map(|bytes| preview(bytes, self.max_body_bytes))
            .unwrap_or_default();
        tracing::info!(method = %method, path = %path, body = %request_body, "http request");

        let response = match self.next.round_trip(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::info!(
                    method = %method,
                    path = %path,
                    error = %e.sanitized_message(),
                    "http request failed"
                );
                return Err(e);
            }
        };

        let (response, body) = buffer_response(response).await?;
        tracing::info!(
            method = %method,
            path = %path,
            status = response.status().as_u16(),
            body = %preview(&body, self.max_body_bytes),
            "http response"
        );
        Ok(response)
    }
}

fn preview(bytes: &[u8], max: usize) -> String {
    let shown = &bytes[..bytes.len().min(max)];
    let text = redact_credentials(&String::from_utf8_lossy(shown));
    if bytes.len() > max {
        format!("{}... ({} bytes)", text, bytes.len())
    } else {
        text
    }
}

/// Read the whole body and rebuild an equivalent response around it.
async fn buffer_response(response: reqwest::Response) -> HttpResult<(reqwest::Response, Bytes)> {
    let status = response.status();
    let version = response.version();
    let url = response.url().clone();
    let headers = response.headers().clone();

    let body = response.bytes().await.map_err(HttpError::from_transport)?;

    let mut builder = http::Response::builder()
        .status(status)
        .version(version)
        .url(url);
    if let Some(map) = builder.headers_mut() {
        *map = headers;
    }
    let rebuilt = builder
        .body(body.clone())
        .map_err(|e| HttpError::ResponseError(format!("Failed to rebuild response: {}", e)))?;

    Ok((reqwest::Response::from(rebuilt), body))
}

// ============================================================================
// Basic Auth Middleware
// ============================================================================

/// Sets basic-auth credentials on every outbound request
#[derive(Debug, Clone)]
pub struct BasicAuth {
    header: HeaderValue,
}

impl BasicAuth {
    pub fn new(username: &str, password: &str) -> HttpResult<Self> {
        Ok(Self {
            header: basic_auth_header(username, password)?,
        })
    }
}

impl Middleware for BasicAuth {
    fn wrap(&self, next: Arc<dyn Transport>) -> Arc<dyn Transport> {
        Arc::new(BasicAuthTransport {
            header: self.header.clone(),
            next,
        })
    }
}

struct BasicAuthTransport {
    header: HeaderValue,
    next: Arc<dyn Transport>,
}

#[async_trait]
impl Transport for BasicAuthTransport {
    async fn round_trip(&self, mut request: reqwest::Request) -> HttpResult<reqwest::Response> {
        request
            .headers_mut()
            .insert(AUTHORIZATION, self.header.clone());
        self.next.round_trip(request).await
    }
}

// ============================================================================
// Closure Middleware
// ============================================================================

/// Turn a closure into a middleware.
///
/// The closure receives the request and the next transport in the chain.
///
/// ```ignore
/// let tag = middleware_fn(|mut req, next| {
///     Box::pin(async move {
///         req.headers_mut().insert("x-request-id", HeaderValue::from_static("42"));
///         next.round_trip(req).await
///     })
/// });
/// ```
pub fn middleware_fn<F>(f: F) -> Arc<dyn Middleware>
where
    F: Fn(reqwest::Request, Arc<dyn Transport>) -> BoxFuture<'static, HttpResult<reqwest::Response>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnMiddleware { f: Arc::new(f) })
}

struct FnMiddleware<F> {
    f: Arc<F>,
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(reqwest::Request, Arc<dyn Transport>) -> BoxFuture<'static, HttpResult<reqwest::Response>>
        + Send
        + Sync
        + 'static,
{
    fn wrap(&self, next: Arc<dyn Transport>) -> Arc<dyn Transport> {
        Arc::new(FnTransport {
            f: self.f.clone(),
            next,
        })
    }
}

struct FnTransport<F> {
    f: Arc<F>,
    next: Arc<dyn Transport>,
}

#[async_trait]
impl<F> Transport for FnTransport<F>
where
    F: Fn(reqwest::Request, Arc<dyn Transport>) -> BoxFuture<'static, HttpResult<reqwest::Response>>
        + Send
        + Sync
        + 'static,
{
    async fn round_trip(&self, request: reqwest::Request) -> HttpResult<reqwest::Response> {
        (self.f)(request, self.next.clone()).await
    }
}

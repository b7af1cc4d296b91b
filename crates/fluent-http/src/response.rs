//! HTTP response types

use crate::error::{HttpError, HttpResult};
use crate::request::RequestInfo;
use bytes::Bytes;
use http::HeaderMap;
use std::sync::Arc;
use std::time::Duration;

/// Fully buffered HTTP response with latency measurement
///
/// The body is always complete when the exchange succeeded; a response
/// attached to a failure may be empty (`status_code == 0`).
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status code, `0` when no response was received
    pub status_code: u16,

    /// Response headers
    pub headers: HeaderMap,

    /// Response body
    pub body: Bytes,

    /// Request latency in milliseconds
    pub latency_ms: u64,

    /// Final URL (may differ from request URL due to redirects)
    pub url: String,

    /// HTTP version
    pub version: String,

    /// The request that produced this response
    pub request: Arc<RequestInfo>,
}

impl Response {
    /// Response carrying only the request back-reference
    pub fn empty(request: Arc<RequestInfo>) -> Self {
        Self {
            status_code: 0,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            latency_ms: 0,
            url: request.url.clone(),
            version: String::new(),
            request,
        }
    }

    /// True if a status line was received
    pub fn is_received(&self) -> bool {
        self.status_code != 0
    }

    /// Check if status is success (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Check if status is client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code)
    }

    /// Check if status is server error (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status_code)
    }

    /// Check if status is redirect (3xx)
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status_code)
    }

    /// Get body as text (UTF-8)
    pub fn text(&self) -> HttpResult<String> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| HttpError::ResponseError(format!("Invalid UTF-8 in response: {}", e)))
    }

    /// Get body as JSON
    pub fn json(&self) -> HttpResult<serde_json::Value> {
        serde_json::from_slice(&self.body)
            .map_err(|e| HttpError::Json(format!("Failed to parse JSON: {}", e)))
    }

    /// Get body as JSON and deserialize to type
    pub fn json_as<T: serde::de::DeserializeOwned>(&self) -> HttpResult<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| HttpError::Json(format!("Failed to deserialize JSON: {}", e)))
    }

    /// Get raw bytes
    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    /// Get content length
    pub fn content_length(&self) -> usize {
        self.body.len()
    }

    /// Get latency as Duration
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }

    /// Get the first value of a header (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get every value of a header, in received order
    pub fn header_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    /// Get content type
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Check if content type is JSON
    pub fn is_json(&self) -> bool {
        self.content_type()
            .map(|ct| ct.contains("application/json"))
            .unwrap_or(false)
    }
}

/// Approximate wire size of a header block (`name: value\r\n` per entry)
pub(crate) fn header_block_size(headers: &HeaderMap) -> usize {
    headers
        .iter()
        .map(|(name, value)| name.as_str().len() + value.len() + 4)
        .sum()
}

/// Fail when a response header block is larger than `max_header_bytes`.
pub(crate) fn ensure_header_limit(headers: &HeaderMap, max_header_bytes: usize) -> HttpResult<()> {
    let header_bytes = header_block_size(headers);
    if header_bytes > max_header_bytes {
        return Err(HttpError::ResponseError(format!(
            "response headers exceed {} bytes ({} received)",
            max_header_bytes, header_bytes
        )));
    }
    Ok(())
}

/// Drain a reqwest response into a [`Response`].
///
/// The reqwest response is consumed on every path, which returns its
/// connection to the pool or closes it.
pub(crate) async fn from_reqwest(
    response: reqwest::Response,
    request: Arc<RequestInfo>,
    started: tokio::time::Instant,
) -> HttpResult<Response> {
    let status_code = response.status().as_u16();
    let url = response.url().to_string();
    let version = format!("{:?}", response.version());
    let headers = response.headers().clone();

    let body = response.bytes().await.map_err(HttpError::from_transport)?;
    let latency_ms = started.elapsed().as_millis() as u64;

    Ok(Response {
        status_code,
        headers,
        body,
        latency_ms,
        url,
        version,
        request,
    })
}

//! HTTP request types and builders
//!
//! A [`RequestBuilder`] never fails mid-chain. The first construction error
//! (bad URL, bad header, unreadable file) is recorded and every later setter
//! still returns the builder; the error surfaces when [`RequestBuilder::send`]
//! is awaited, before any network I/O happens.

use crate::body::{Body, EncodedBody};
use crate::client::Client;
use crate::error::{HttpError, SendFailure, SendResult};
use crate::redirect::Hop;
use crate::response::Response;
use base64::Engine;
use http::header::{HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, COOKIE, USER_AGENT};
use http::HeaderMap;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

/// HTTP request methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    /// Returns the method as a string slice.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = HttpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            _ => Err(HttpError::InvalidRequest(format!("Invalid HTTP method: {}", s))),
        }
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Options => reqwest::Method::OPTIONS,
        }
    }
}

/// Normalize a user-supplied URL into an absolute one.
///
/// - `http://...` / `https://...` are kept as-is
/// - `:8080/path` and `/path` become `http://localhost:8080/path` / `http://localhost/path`
/// - anything else gets `https://` prepended
pub fn parse_scheme(raw: &str) -> String {
    if raw.starts_with("https://") || raw.starts_with("http://") {
        raw.to_string()
    } else if raw.starts_with(':') || raw.starts_with('/') {
        format!("http://localhost{}", raw)
    } else {
        format!("https://{}", raw)
    }
}

/// Snapshot of an outbound request, shared with the response it produced.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HeaderMap,
}

type Callback = Box<dyn FnOnce(SendResult) -> SendResult + Send>;

/// Fluent request builder bound to a [`Client`].
pub struct RequestBuilder {
    method: HttpMethod,
    url: Option<Url>,
    headers: HeaderMap,
    body: Option<EncodedBody>,
    deadline: Option<Instant>,
    client: Option<Client>,
    error: Option<HttpError>,
    callback: Option<Callback>,
}

impl RequestBuilder {
    /// Create a builder that will execute on `client`.
    ///
    /// The URL is normalized with [`parse_scheme`] here and nowhere else.
    pub(crate) fn new(client: Client, method: HttpMethod, raw_url: &str) -> Self {
        let mut builder = Self::detached(method, raw_url);
        builder.client = Some(client);
        builder
    }

    /// Create a builder that already carries a construction error.
    pub(crate) fn failed(method: HttpMethod, raw_url: &str, error: HttpError) -> Self {
        let mut builder = Self::detached(method, raw_url);
        builder.record(error);
        builder
    }

    fn detached(method: HttpMethod, raw_url: &str) -> Self {
        let normalized = parse_scheme(raw_url);
        let mut builder = Self {
            method,
            url: None,
            headers: HeaderMap::new(),
            body: None,
            deadline: None,
            client: None,
            error: None,
            callback: None,
        };
        match Url::parse(&normalized) {
            Ok(url) if url.has_host() => builder.url = Some(url),
            Ok(_) => builder.record(HttpError::InvalidUrl(format!("{}: missing host", raw_url))),
            Err(e) => builder.record(HttpError::InvalidUrl(format!("{}: {}", raw_url, e))),
        }
        builder
    }

    fn record(&mut self, error: HttpError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Target URL, `None` if it failed to parse
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Encoded body, if one was set
    pub fn body(&self) -> Option<&EncodedBody> {
        self.body.as_ref()
    }

    /// Deadline the request will be sent with, if any
    pub fn current_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The first construction error, if any
    pub fn error(&self) -> Option<&HttpError> {
        self.error.as_ref()
    }

    // Query

    /// Append a query parameter, keeping any existing query string
    pub fn query(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let Some(url) = self.url.as_mut() {
            url.query_pairs_mut()
                .append_pair(key.as_ref(), value.as_ref());
        }
        self
    }

    /// Append several query parameters
    pub fn queries<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in params {
            self = self.query(key, value);
        }
        self
    }

    // Headers

    /// Set a header, replacing existing values for the same name
    pub fn set_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        match header_pair(name.as_ref(), value.as_ref()) {
            Ok((name, value)) => {
                self.headers.insert(name, value);
            }
            Err(e) => self.record(e),
        }
        self
    }

    /// Set several headers, replacing existing values
    pub fn set_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in headers {
            self = self.set_header(name, value);
        }
        self
    }

    /// Append a header value, keeping existing values for the same name
    pub fn add_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        match header_pair(name.as_ref(), value.as_ref()) {
            Ok((name, value)) => {
                self.headers.append(name, value);
            }
            Err(e) => self.record(e),
        }
        self
    }

    /// Append several header values
    pub fn add_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in headers {
            self = self.add_header(name, value);
        }
        self
    }

    /// Set the `User-Agent` header
    pub fn user_agent(self, user_agent: impl AsRef<str>) -> Self {
        self.set_header(USER_AGENT, user_agent)
    }

    /// Append a `Cookie` header entry.
    ///
    /// At send time these entries are joined with the client's stored
    /// cookies for the target URL into a single `Cookie` header.
    pub fn add_cookie(self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let cookie = format!("{}={}", name.as_ref(), value.as_ref());
        self.add_header(COOKIE, cookie)
    }

    /// Set basic authentication
    pub fn basic_auth(mut self, username: impl AsRef<str>, password: impl AsRef<str>) -> Self {
        match basic_auth_header(username.as_ref(), password.as_ref()) {
            Ok(value) => {
                self.headers.insert(AUTHORIZATION, value);
            }
            Err(e) => self.record(e),
        }
        self
    }

    /// Set bearer token authentication
    pub fn bearer_auth(mut self, token: impl AsRef<str>) -> Self {
        match HeaderValue::from_str(&format!("Bearer {}", token.as_ref())) {
            Ok(mut value) => {
                value.set_sensitive(true);
                self.headers.insert(AUTHORIZATION, value);
            }
            Err(e) => self.record(HttpError::InvalidRequest(format!("bearer token: {}", e))),
        }
        self
    }

    // Body

    /// Set a form body from key/value pairs
    pub fn form<I, K, V>(self, data: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let pairs = data
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.set_body(Body::Form(pairs))
    }

    /// Set a JSON body from already-serialized text
    pub fn json(self, text: impl Into<String>) -> Self {
        self.set_body(Body::Json(text.into()))
    }

    /// Serialize `value` and set it as the JSON body
    pub fn json_value<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(text) => self.set_body(Body::Json(text)),
            Err(e) => {
                self.record(HttpError::Json(format!("Failed to serialize JSON: {}", e)));
                self
            }
        }
    }

    /// Set a plain text body
    pub fn text(self, text: impl Into<String>) -> Self {
        self.set_body(Body::Text(text.into()))
    }

    /// Set a raw body with an explicit content type
    pub fn bytes(self, content_type: impl Into<String>, data: impl Into<bytes::Bytes>) -> Self {
        self.set_body(Body::Bytes {
            content_type: content_type.into(),
            data: data.into(),
        })
    }

    /// Upload the file at `path` as a single-part multipart body.
    ///
    /// The file is read immediately; a read failure is recorded.
    pub fn file(self, field: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.set_body(Body::Multipart {
            field: field.into(),
            path: path.into(),
        })
    }

    /// Replace the body and its `Content-Type`
    pub fn set_body(mut self, body: Body) -> Self {
        match body.encode() {
            Ok(Some(encoded)) => match HeaderValue::from_str(&encoded.content_type) {
                Ok(content_type) => {
                    self.headers.insert(CONTENT_TYPE, content_type);
                    self.body = Some(encoded);
                }
                Err(e) => self.record(HttpError::InvalidRequest(format!("content type: {}", e))),
            },
            Ok(None) => {
                self.headers.remove(CONTENT_TYPE);
                self.body = None;
            }
            Err(e) => self.record(e),
        }
        self
    }

    // Deadline

    /// Bound the request by `timeout` from now.
    ///
    /// Composes with an existing deadline: the earlier one wins.
    pub fn timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.deadline(deadline),
            None => self,
        }
    }

    /// Set timeout from seconds
    pub fn timeout_secs(self, secs: f64) -> Self {
        match Duration::try_from_secs_f64(secs) {
            Ok(timeout) => self.timeout(timeout),
            Err(e) => {
                let mut builder = self;
                builder.record(HttpError::InvalidRequest(format!("timeout: {}", e)));
                builder
            }
        }
    }

    /// Bound the request by an externally supplied deadline
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Post-process the outcome of [`send`](Self::send) before it is returned
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(SendResult) -> SendResult + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Execute the request.
    ///
    /// A recorded construction error is returned without touching the
    /// network. Either way the response (possibly empty) carries the request.
    pub async fn send(self) -> SendResult {
        let RequestBuilder {
            method,
            url,
            headers,
            body,
            deadline,
            client,
            error,
            callback,
        } = self;

        let info = Arc::new(RequestInfo {
            method,
            url: url.as_ref().map(Url::to_string).unwrap_or_default(),
            headers: headers.clone(),
        });

        let outcome = match (error, client, url) {
            (Some(error), _, _) => Err(SendFailure::new(error, Response::empty(info))),
            (None, Some(client), Some(url)) => {
                let hop = Hop::new(method.into(), url, headers, body.map(|b| b.bytes));
                client.execute(hop, info, deadline).await
            }
            (None, _, _) => Err(SendFailure::new(
                HttpError::InvalidRequest("request is not bound to a client".to_string()),
                Response::empty(info),
            )),
        };

        match callback {
            Some(callback) => callback(outcome),
            None => outcome,
        }
    }
}

impl fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("method", &self.method)
            .field("url", &self.url.as_ref().map(Url::as_str))
            .field("headers", &self.headers)
            .field("body_len", &self.body.as_ref().map(EncodedBody::content_length))
            .field("deadline", &self.deadline)
            .field("error", &self.error)
            .finish()
    }
}

fn header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), HttpError> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| HttpError::InvalidRequest(format!("header name {:?}: {}", name, e)))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|e| HttpError::InvalidRequest(format!("header {}: {}", name, e)))?;
    Ok((header_name, header_value))
}

/// `Authorization` value for basic auth, marked sensitive
pub(crate) fn basic_auth_header(username: &str, password: &str) -> Result<HeaderValue, HttpError> {
    let credentials =
        base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", username, password));
    let mut value = HeaderValue::from_str(&format!("Basic {}", credentials))
        .map_err(|e| HttpError::InvalidRequest(format!("basic auth: {}", e)))?;
    value.set_sensitive(true);
    Ok(value)
}

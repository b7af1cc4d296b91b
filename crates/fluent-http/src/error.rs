//! HTTP error types and handling

use crate::response::Response;
use thiserror::Error;

/// HTTP-specific errors
#[derive(Error, Debug)]
pub enum HttpError {
    /// Connection failed (DNS, TCP, TLS)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Request deadline elapsed
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Invalid request configuration (bad header, bad body input)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Response could not be read or violated a client limit
    #[error("Response error: {0}")]
    ResponseError(String),

    /// Redirect limit exceeded or redirects rejected
    #[error("Redirect error: {0}")]
    Redirect(String),

    /// URL could not be normalized into an absolute URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(String),

    /// The client itself could not be built
    #[error("Client configuration error: {0}")]
    Config(String),

    /// File read failed while building a body
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic reqwest error
    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// Result type for HTTP operations
pub type HttpResult<T> = Result<T, HttpError>;

/// Error category for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpErrorCategory {
    /// Connection-related errors (DNS, TCP, TLS)
    Connection,
    /// Timeout errors
    Timeout,
    /// Invalid request construction
    Request,
    /// Response parsing or status errors
    Response,
    /// Redirect errors
    Redirect,
    /// Unknown/other errors
    Unknown,
}

impl HttpError {
    /// Categorize the error for reporting
    pub fn category(&self) -> HttpErrorCategory {
        match self {
            HttpError::Connection(_) => HttpErrorCategory::Connection,
            HttpError::Timeout(_) => HttpErrorCategory::Timeout,
            HttpError::InvalidRequest(_)
            | HttpError::InvalidUrl(_)
            | HttpError::Io(_)
            | HttpError::Config(_) => HttpErrorCategory::Request,
            HttpError::ResponseError(_) | HttpError::Json(_) => HttpErrorCategory::Response,
            HttpError::Redirect(_) => HttpErrorCategory::Redirect,
            HttpError::Reqwest(e) => {
                if e.is_connect() {
                    HttpErrorCategory::Connection
                } else if e.is_timeout() {
                    HttpErrorCategory::Timeout
                } else if e.is_redirect() {
                    HttpErrorCategory::Redirect
                } else if e.is_request() || e.is_builder() {
                    HttpErrorCategory::Request
                } else if e.is_body() || e.is_decode() {
                    HttpErrorCategory::Response
                } else {
                    HttpErrorCategory::Unknown
                }
            }
        }
    }

    /// True for errors recorded while the request was being built.
    ///
    /// These never reach the network: `send()` short-circuits on them.
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            HttpError::InvalidRequest(_)
                | HttpError::InvalidUrl(_)
                | HttpError::Io(_)
                | HttpError::Json(_)
                | HttpError::Config(_)
        )
    }

    /// Shorthand for `category() == HttpErrorCategory::Timeout`
    pub fn is_timeout(&self) -> bool {
        self.category() == HttpErrorCategory::Timeout
    }

    /// Sanitize error message (remove sensitive info like credentials, internal IPs)
    pub fn sanitized_message(&self) -> String {
        let msg = self.to_string();
        sanitize_error_message(&msg)
    }

    /// Map a transport error onto the dedicated variants so callers can match
    /// on them without digging into reqwest.
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HttpError::Timeout(err.to_string())
        } else if err.is_redirect() {
            HttpError::Redirect(redirect_reason(&err))
        } else if err.is_connect() {
            HttpError::Connection(err.to_string())
        } else {
            HttpError::Reqwest(err)
        }
    }
}

/// reqwest wraps the policy error; the innermost source carries the reason.
fn redirect_reason(err: &reqwest::Error) -> String {
    let mut source: &dyn std::error::Error = err;
    while let Some(next) = source.source() {
        source = next;
    }
    source.to_string()
}

/// Failure half of [`crate::request::RequestBuilder::send`].
///
/// Carries the error together with the (possibly empty) response, which always
/// holds a back-reference to the originating request.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct SendFailure {
    pub error: HttpError,
    pub response: Box<Response>,
}

impl SendFailure {
    pub fn new(error: HttpError, response: Response) -> Self {
        Self {
            error,
            response: Box::new(response),
        }
    }

    pub fn into_parts(self) -> (HttpError, Response) {
        (self.error, *self.response)
    }
}

/// Outcome of sending a request
pub type SendResult = Result<Response, SendFailure>;

/// Sanitize error messages by removing sensitive information
pub(crate) fn sanitize_error_message(msg: &str) -> String {
    use regex::Regex;
    use std::sync::OnceLock;

    static INTERNAL_IP_RE: OnceLock<Regex> = OnceLock::new();

    let internal_ip_re = INTERNAL_IP_RE.get_or_init(|| {
        Regex::new(r"\b(10\.|172\.(1[6-9]|2[0-9]|3[01])\.|192\.168\.)\d+\.\d+\b")
            .expect("valid regex")
    });

    let redacted = redact_credentials(msg);
    internal_ip_re
        .replace_all(&redacted, "[INTERNAL_IP]")
        .into_owned()
}

/// Redact URL userinfo, auth header values and token-like parameters.
///
/// Unlike [`sanitize_error_message`] this leaves addresses alone, so it is
/// safe for payloads where every other byte should survive.
pub(crate) fn redact_credentials(text: &str) -> String {
    use regex::Regex;
    use std::sync::OnceLock;

    static URL_CREDS_RE: OnceLock<Regex> = OnceLock::new();
    static AUTH_HEADER_RE: OnceLock<Regex> = OnceLock::new();

    let url_creds_re = URL_CREDS_RE
        .get_or_init(|| Regex::new(r"https?://[^@:/\s]+:[^@/\s]+@").expect("valid regex"));
    let auth_header_re = AUTH_HEADER_RE.get_or_init(|| {
        Regex::new(r"(?i)(authorization:\s*(?:basic|bearer)|bearer|basic|api[_-]?key|token)\s*[:=]?\s*\S+")
            .expect("valid regex")
    });

    let redacted = url_creds_re.replace_all(text, "https://[REDACTED]@");
    auth_header_re
        .replace_all(&redacted, "$1: [REDACTED]")
        .into_owned()
}

//! Redirect following
//!
//! The client follows redirects itself, one hop at a time, so every hop goes
//! through the middleware chain and the cookie jar. The underlying reqwest
//! client never follows redirects on its own.

use crate::config::RedirectPolicy;
use crate::error::{HttpError, HttpResult};
use bytes::Bytes;
use http::header::{
    AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, LOCATION, PROXY_AUTHORIZATION,
    TRANSFER_ENCODING, WWW_AUTHENTICATE,
};
use http::{HeaderMap, HeaderValue, StatusCode};
use reqwest::Method;
use url::Url;

/// One outbound request of an exchange, kept in parts so it can be replayed
#[derive(Debug, Clone)]
pub(crate) struct Hop {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl Hop {
    pub(crate) fn new(method: Method, url: Url, headers: HeaderMap, body: Option<Bytes>) -> Self {
        Self {
            method,
            url,
            headers,
            body,
        }
    }

    /// Build the transport request for this hop.
    ///
    /// A present body is always `Some`, even when it is empty.
    pub(crate) fn to_transport(&self) -> reqwest::Request {
        let mut request = reqwest::Request::new(self.method.clone(), self.url.clone());
        *request.headers_mut() = self.headers.clone();
        if let Some(body) = &self.body {
            *request.body_mut() = Some(reqwest::Body::from(body.clone()));
        }
        request
    }
}

pub(crate) fn is_redirect_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

/// Decide what follows `current` given its response.
///
/// `Ok(None)` hands the response back to the caller: not a redirect, no
/// `Location`, or the policy is [`RedirectPolicy::Stop`]. `followed` counts
/// the redirects already taken in this exchange.
pub(crate) fn next_hop(
    policy: RedirectPolicy,
    followed: usize,
    status: StatusCode,
    headers: &HeaderMap,
    current: &Hop,
) -> HttpResult<Option<Hop>> {
    if policy == RedirectPolicy::Stop || !is_redirect_status(status) {
        return Ok(None);
    }
    let Some(location) = headers.get(LOCATION) else {
        return Ok(None);
    };

    let location = location.to_str().map_err(|_| {
        HttpError::Redirect(format!("{} sent a non-ASCII Location header", current.url))
    })?;
    let url = current
        .url
        .join(location)
        .map_err(|e| HttpError::Redirect(format!("invalid Location {:?}: {}", location, e)))?;

    match policy {
        RedirectPolicy::Reject => {
            return Err(HttpError::Redirect(format!(
                "redirect to {} rejected: redirects are disabled",
                url
            )));
        }
        RedirectPolicy::Follow { max } if followed >= max => {
            return Err(HttpError::Redirect(format!("stopped after {} redirects", max)));
        }
        _ => {}
    }
    if !matches!(url.scheme(), "http" | "https") {
        return Err(HttpError::Redirect(format!(
            "redirect to unsupported scheme: {}",
            url
        )));
    }

    let mut next = Hop::new(
        current.method.clone(),
        url,
        current.headers.clone(),
        current.body.clone(),
    );

    // 307/308 replay method and body; 303 and POST under 301/302 become a bodiless GET
    let becomes_get = match status {
        StatusCode::SEE_OTHER => current.method != Method::HEAD,
        StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND => current.method == Method::POST,
        _ => false,
    };
    if becomes_get {
        next.method = Method::GET;
        next.body = None;
        next.headers.remove(CONTENT_TYPE);
        next.headers.remove(CONTENT_LENGTH);
        next.headers.remove(TRANSFER_ENCODING);
    }

    remove_sensitive_headers(&mut next.headers, &next.url, &current.url);
    Ok(Some(next))
}

/// Credentials and manual cookies do not follow a redirect to another host.
pub(crate) fn remove_sensitive_headers(headers: &mut HeaderMap, next: &Url, previous: &Url) {
    let cross_host = next.host_str() != previous.host_str()
        || next.port_or_known_default() != previous.port_or_known_default();
    if cross_host {
        headers.remove(AUTHORIZATION);
        headers.remove(COOKIE);
        headers.remove(PROXY_AUTHORIZATION);
        headers.remove(WWW_AUTHENTICATE);
    }
}

/// Fold every `Cookie` entry plus the jar's cookies into one header.
///
/// Manual cookies come first. Entries are joined with `"; "`.
pub(crate) fn merge_cookies(headers: &mut HeaderMap, stored: Option<HeaderValue>) {
    let mut entries: Vec<HeaderValue> = headers.get_all(COOKIE).iter().cloned().collect();
    entries.extend(stored);
    if entries.len() < 2 {
        if let Some(only) = entries.pop() {
            headers.insert(COOKIE, only);
        }
        return;
    }

    let mut joined = Vec::new();
    for (i, entry) in entries.iter().enumerate() {
        if i > 0 {
            joined.extend_from_slice(b"; ");
        }
        joined.extend_from_slice(entry.as_bytes());
    }
    match HeaderValue::from_bytes(&joined) {
        Ok(value) => {
            headers.insert(COOKIE, value);
        }
        Err(e) => tracing::debug!(error = %e, "cookie entries left unmerged"),
    }
}

//! HTTP client with connection pooling and middleware

use crate::config::HttpClientConfig;
use crate::error::{HttpError, HttpResult, SendFailure, SendResult};
use crate::middleware::{Middleware, MiddlewareChain, ReqwestTransport, Transport};
use crate::redirect::{self, Hop};
use crate::request::{HttpMethod, RequestBuilder, RequestInfo};
use crate::response::{ensure_header_limit, from_reqwest, Response};
use http::header::SET_COOKIE;
use reqwest::cookie::{CookieStore, Jar};
use std::sync::{Arc, OnceLock};
use tokio::time::Instant;

/// Async HTTP client with connection pooling, cookies and middleware
///
/// Cloning is cheap; clones share the pool, the cookie jar and the chain.
///
/// # Example
///
/// ```ignore
/// use fluent_http::{BasicAuth, Client, HttpClientConfig, Logging};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = Client::with_middlewares(
///         HttpClientConfig::new().max_redirects(5),
///         vec![Arc::new(Logging::new()), Arc::new(BasicAuth::new("user", "pass")?)],
///     )?;
///
///     let response = client
///         .post("api.example.com/users")
///         .form([("name", "peter")])
///         .send()
///         .await?;
///     println!("Status: {}, Latency: {}ms", response.status_code, response.latency_ms);
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    config: HttpClientConfig,
    cookie_jar: Option<Arc<Jar>>,
    middleware_count: usize,
}

impl Client {
    /// Create a new HTTP client with the given configuration
    pub fn new(config: HttpClientConfig) -> HttpResult<Self> {
        Self::with_middlewares(config, Vec::new())
    }

    /// Create a client whose transport is wrapped by `middlewares`.
    ///
    /// The last middleware in the list is the outermost one.
    pub fn with_middlewares(
        config: HttpClientConfig,
        middlewares: Vec<Arc<dyn Middleware>>,
    ) -> HttpResult<Self> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.connect_budget())
            .tcp_keepalive(config.tcp_keepalive)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(&config.user_agent);

        // Configure compression
        builder = builder.gzip(config.gzip).brotli(config.brotli);

        // Danger: Accept invalid certificates (testing only)
        if config.danger_accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| HttpError::Config(e.to_string()))?;

        let cookie_jar = config.cookie_store.then(|| Arc::new(Jar::default()));
        let chain = MiddlewareChain::from(middlewares);
        let transport = chain.build(Arc::new(ReqwestTransport::new(client)));

        Ok(Self {
            inner: Arc::new(ClientInner {
                transport,
                config,
                cookie_jar,
                middleware_count: chain.len(),
            }),
        })
    }

    /// The configuration this client was built with
    pub fn config(&self) -> &HttpClientConfig {
        &self.inner.config
    }

    /// The client's cookie jar, if cookies are enabled
    pub fn cookie_jar(&self) -> Option<&Arc<Jar>> {
        self.inner.cookie_jar.as_ref()
    }

    // Request factories

    /// Start building a request
    pub fn request(&self, method: HttpMethod, url: &str) -> RequestBuilder {
        RequestBuilder::new(self.clone(), method, url)
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(HttpMethod::Get, url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.request(HttpMethod::Post, url)
    }

    pub fn put(&self, url: &str) -> RequestBuilder {
        self.request(HttpMethod::Put, url)
    }

    pub fn patch(&self, url: &str) -> RequestBuilder {
        self.request(HttpMethod::Patch, url)
    }

    pub fn delete(&self, url: &str) -> RequestBuilder {
        self.request(HttpMethod::Delete, url)
    }

    pub fn head(&self, url: &str) -> RequestBuilder {
        self.request(HttpMethod::Head, url)
    }

    pub fn options(&self, url: &str) -> RequestBuilder {
        self.request(HttpMethod::Options, url)
    }

    /// Execute a request through the middleware chain, following redirects.
    ///
    /// The request deadline and the client's overall timeout bound the whole
    /// exchange, redirects and body included; the earlier one wins. Every
    /// transport response is consumed or dropped before returning.
    pub(crate) async fn execute(
        &self,
        hop: Hop,
        info: Arc<RequestInfo>,
        deadline: Option<Instant>,
    ) -> SendResult {
        let started = Instant::now();
        let overall = self
            .inner
            .config
            .timeout
            .and_then(|timeout| started.checked_add(timeout));
        let deadline = match (deadline, overall) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        let exchange = self.exchange(hop, info.clone(), started);

        let result = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, exchange).await {
                Ok(result) => result,
                Err(_) => Err(HttpError::Timeout(format!(
                    "deadline elapsed after {}ms",
                    started.elapsed().as_millis()
                ))),
            },
            None => exchange.await,
        };

        match result {
            Ok(response) => {
                tracing::debug!(
                    method = %info.method,
                    url = %info.url,
                    status = response.status_code,
                    latency_ms = response.latency_ms,
                    "request completed"
                );
                Ok(response)
            }
            Err(error) => {
                tracing::warn!(
                    method = %info.method,
                    url = %crate::error::sanitize_error_message(&info.url),
                    error = %error.sanitized_message(),
                    "request failed"
                );
                Err(SendFailure::new(error, Response::empty(info)))
            }
        }
    }

    async fn exchange(
        &self,
        first: Hop,
        info: Arc<RequestInfo>,
        started: Instant,
    ) -> HttpResult<Response> {
        let config = &self.inner.config;
        let mut hop = first;
        let mut followed = 0;

        loop {
            let mut request = hop.to_transport();
            let stored = self
                .inner
                .cookie_jar
                .as_ref()
                .and_then(|jar| jar.cookies(&hop.url));
            redirect::merge_cookies(request.headers_mut(), stored);

            let response = self.inner.transport.round_trip(request).await?;
            ensure_header_limit(response.headers(), config.max_response_header_bytes)?;
            if let Some(jar) = &self.inner.cookie_jar {
                jar.set_cookies(&mut response.headers().get_all(SET_COOKIE).iter(), &hop.url);
            }

            let status = response.status();
            let next = redirect::next_hop(
                config.redirect_policy,
                followed,
                status,
                response.headers(),
                &hop,
            )?;
            match next {
                Some(next) => {
                    tracing::debug!(
                        status = status.as_u16(),
                        from = %hop.url,
                        to = %next.url,
                        "following redirect"
                    );
                    followed += 1;
                    hop = next;
                }
                None => return from_reqwest(response, info, started).await,
            }
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("timeout", &self.inner.config.timeout)
            .field("redirect_policy", &self.inner.config.redirect_policy)
            .field("cookie_store", &self.inner.cookie_jar.is_some())
            .field("middlewares", &self.inner.middleware_count)
            .finish()
    }
}

// ============================================================================
// Default client
// ============================================================================

static DEFAULT_CLIENT: OnceLock<Result<Client, String>> = OnceLock::new();

/// Process-wide client with default configuration.
///
/// Built on first use and never replaced. A build failure is remembered and
/// returned on every call.
pub fn default_client() -> HttpResult<Client> {
    DEFAULT_CLIENT
        .get_or_init(|| Client::new(HttpClientConfig::default()).map_err(|e| e.to_string()))
        .clone()
        .map_err(HttpError::Config)
}

/// Start a request on the default client
pub fn request(method: HttpMethod, url: &str) -> RequestBuilder {
    match default_client() {
        Ok(client) => client.request(method, url),
        Err(e) => RequestBuilder::failed(method, url, e),
    }
}

/// Start a GET request on the default client
pub fn get(url: &str) -> RequestBuilder {
    request(HttpMethod::Get, url)
}

/// Start a POST request on the default client
pub fn post(url: &str) -> RequestBuilder {
    request(HttpMethod::Post, url)
}

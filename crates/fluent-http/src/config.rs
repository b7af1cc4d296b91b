//! HTTP client configuration

use std::time::Duration;

/// What the client does when a server answers with a redirect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectPolicy {
    /// Follow up to `max` hops, then fail with a redirect error
    Follow { max: usize },
    /// Fail on the first redirect
    Reject,
    /// Do not follow; hand the 3xx response back to the caller
    Stop,
}

impl Default for RedirectPolicy {
    fn default() -> Self {
        RedirectPolicy::Follow { max: 10 }
    }
}

/// Configuration for HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Overall timeout for each exchange, redirects included; a tighter
    /// per-request deadline still wins
    pub timeout: Option<Duration>,

    /// Connection timeout (TCP connect)
    pub connect_timeout: Duration,

    /// TLS handshake budget, added to the connect timeout
    pub tls_handshake_timeout: Duration,

    /// TCP keep-alive interval
    pub tcp_keepalive: Duration,

    /// Maximum idle connections per host
    pub pool_max_idle_per_host: usize,

    /// Idle connection timeout
    pub pool_idle_timeout: Duration,

    /// Largest response header block accepted, in bytes
    pub max_response_header_bytes: usize,

    /// Redirect handling
    pub redirect_policy: RedirectPolicy,

    /// Persist cookies across requests made by the same client
    pub cookie_store: bool,

    /// User-Agent header value
    pub user_agent: String,

    /// Whether to accept invalid certificates (for testing only)
    pub danger_accept_invalid_certs: bool,

    /// Enable gzip compression
    pub gzip: bool,

    /// Enable brotli compression
    pub brotli: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            connect_timeout: Duration::from_secs(10),
            tls_handshake_timeout: Duration::from_secs(5),
            tcp_keepalive: Duration::from_secs(30),
            pool_max_idle_per_host: 50,
            pool_idle_timeout: Duration::from_secs(60),
            max_response_header_bytes: 5 * 1024,
            redirect_policy: RedirectPolicy::default(),
            cookie_store: true,
            user_agent: format!("fluent-http/{}", env!("CARGO_PKG_VERSION")),
            danger_accept_invalid_certs: false,
            gzip: true,
            brotli: true,
        }
    }
}

impl HttpClientConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the overall timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the overall timeout from seconds.
    ///
    /// Negative, NaN or overflowing values leave the timeout unchanged.
    pub fn timeout_secs(mut self, secs: f64) -> Self {
        match Duration::try_from_secs_f64(secs) {
            Ok(timeout) => self.timeout = Some(timeout),
            Err(e) => tracing::warn!(secs, error = %e, "ignoring invalid client timeout"),
        }
        self
    }

    /// Set the connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the TLS handshake timeout
    pub fn tls_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.tls_handshake_timeout = timeout;
        self
    }

    /// Set the TCP keep-alive interval
    pub fn tcp_keepalive(mut self, interval: Duration) -> Self {
        self.tcp_keepalive = interval;
        self
    }

    /// Set max idle connections per host
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    /// Set idle connection timeout
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    /// Set the response header size cap
    pub fn max_response_header_bytes(mut self, max: usize) -> Self {
        self.max_response_header_bytes = max;
        self
    }

    /// Set the redirect policy
    pub fn redirect_policy(mut self, policy: RedirectPolicy) -> Self {
        self.redirect_policy = policy;
        self
    }

    /// Follow at most `max` redirects
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.redirect_policy = RedirectPolicy::Follow { max };
        self
    }

    /// Enable/disable the per-client cookie jar
    pub fn cookie_store(mut self, enabled: bool) -> Self {
        self.cookie_store = enabled;
        self
    }

    /// Set the User-Agent header
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Accept invalid certificates (DANGER - testing only)
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.danger_accept_invalid_certs = accept;
        self
    }

    /// Enable/disable gzip compression
    pub fn gzip(mut self, enabled: bool) -> Self {
        self.gzip = enabled;
        self
    }

    /// Enable/disable brotli compression
    pub fn brotli(mut self, enabled: bool) -> Self {
        self.brotli = enabled;
        self
    }

    /// Budget for establishing a connection, TLS included
    pub fn connect_budget(&self) -> Duration {
        self.connect_timeout + self.tls_handshake_timeout
    }
}

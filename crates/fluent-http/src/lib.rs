//! fluent-http: fluent async HTTP client
//!
//! Chainable request builders on top of a shared, connection-pooled reqwest
//! client, with a middleware chain around the transport.
//!
//! # Architecture
//!
//! - `RequestBuilder`: query, headers, auth, cookies, body and deadline; errors
//!   are recorded and surface on `send()`
//! - `body`: form, JSON, text and multipart file encoding
//! - `Client`: pool, timeouts, cookie jar, middleware chain; follows redirects
//!   hop by hop so each hop passes through the chain
//! - `middleware`: `Transport` wrappers (logging, basic auth, closures)
//! - `spawn`: run a request on a background task and receive it on a channel
//!
//! ```ignore
//! let response = fluent_http::post("api.example.com/post")
//!     .form([("name", "peter"), ("address", "unknown")])
//!     .timeout(std::time::Duration::from_secs(5))
//!     .send()
//!     .await?;
//! ```

pub mod body;
pub mod client;
pub mod config;
pub mod error;
pub mod middleware;
mod redirect;
pub mod request;
pub mod response;
pub mod spawn;

pub use body::{Body, EncodedBody};
pub use client::{default_client, get, post, request, Client};
pub use config::{HttpClientConfig, RedirectPolicy};
pub use error::{HttpError, HttpErrorCategory, HttpResult, SendFailure, SendResult};
pub use middleware::{middleware_fn, BasicAuth, Logging, Middleware, MiddlewareChain, Transport};
pub use request::{parse_scheme, HttpMethod, RequestBuilder, RequestInfo};
pub use response::Response;
pub use spawn::{spawn_get, spawn_request};

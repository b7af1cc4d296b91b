//! Fire-and-forget requests on a background task

use crate::client::{self, Client};
use crate::error::SendResult;
use crate::request::RequestBuilder;
use tokio::sync::oneshot;

/// Send `builder` on a new tokio task; the outcome arrives on the receiver.
///
/// Must be called from within a tokio runtime. Dropping the receiver does not
/// cancel the request; only the request's own deadline does.
pub fn spawn_request(builder: RequestBuilder) -> oneshot::Receiver<SendResult> {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let outcome = builder.send().await;
        if tx.send(outcome).is_err() {
            tracing::debug!("receiver dropped before the response was delivered");
        }
    });
    rx
}

/// GET `url` with the default client on a background task
pub fn spawn_get(url: &str) -> oneshot::Receiver<SendResult> {
    spawn_request(client::get(url))
}

impl Client {
    /// GET `url` with this client on a background task
    pub fn spawn_get(&self, url: &str) -> oneshot::Receiver<SendResult> {
        spawn_request(self.get(url))
    }
}

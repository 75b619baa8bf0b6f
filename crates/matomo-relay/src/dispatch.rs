//! Best-effort delivery of tracking requests.
//!
//! [`Dispatch::dispatch`] hands a request off and returns immediately. The
//! caller never waits on delivery and never sees its result: failures are
//! logged and dropped, nothing is retried.

use crate::error::DispatchError;
use crate::tracking::TrackingRequest;
use http::StatusCode;
use std::sync::Arc;

/// Fire-and-forget sink for tracking requests.
///
/// Implementations must not block and must not panic on delivery failure.
pub trait Dispatch: Send + Sync + 'static {
    /// Submit a request for background delivery
    fn dispatch(&self, request: TrackingRequest);
}

impl<D: Dispatch + ?Sized> Dispatch for Arc<D> {
    fn dispatch(&self, request: TrackingRequest) {
        (**self).dispatch(request)
    }
}

/// Sends tracking requests to the collector over HTTP.
///
/// Each dispatched request runs as its own detached task on the current
/// tokio runtime. No timeout is applied beyond what the client was built
/// with.
#[derive(Debug, Clone, Default)]
pub struct HttpDispatcher {
    client: reqwest::Client,
}

impl HttpDispatcher {
    /// Create a dispatcher with a default client
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured client (timeouts, proxies, TLS settings)
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Send one request and wait for the collector's answer.
    ///
    /// Any non-2xx status is reported as [`DispatchError::Status`].
    pub async fn send(&self, request: &TrackingRequest) -> Result<StatusCode, DispatchError> {
        let response = self
            .client
            .request(request.method(), request.url().clone())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(status)
        } else {
            Err(DispatchError::Status(status))
        }
    }
}

impl Dispatch for HttpDispatcher {
    fn dispatch(&self, request: TrackingRequest) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!(error = %DispatchError::NoRuntime, "Dropping tracking request");
                return;
            }
        };

        let dispatcher = self.clone();
        handle.spawn(async move {
            match dispatcher.send(&request).await {
                Ok(status) => {
                    tracing::debug!(status = %status.as_u16(), "Tracking request delivered");
                }
                Err(e) => {
                    tracing::warn!(
                        collector = %request.url().path(),
                        error = %e,
                        "Tracking request failed"
                    );
                }
            }
        });
    }
}

//! Middleware that relays each handled request to the collector.

use super::layer::{BoxFuture, BoxedNext, MiddlewareLayer, Request};
use crate::config::TrackerConfig;
use crate::directive::Directive;
use crate::dispatch::{Dispatch, HttpDispatcher};
use crate::error::Result;
use crate::extract::RequestSnapshot;
use crate::tracking::TrackingRequest;
use std::sync::Arc;

/// Analytics relay middleware.
///
/// For every request the downstream handler runs first and its outcome is
/// returned untouched. Afterwards, unless the raw request-URI matches an
/// exclusion pattern, a tracking request is built and handed to the
/// dispatcher without waiting for delivery.
///
/// # Example
///
/// ```ignore
/// use matomo_relay::middleware::{LayerStack, TrackingLayer};
///
/// let tracking = TrackingLayer::from_block(r#"
///     matomo {
///         url https://stats.example.com/matomo.php
///         token 0123abcd
///         exclude ^/health
///     }
/// "#)?;
///
/// let mut stack = LayerStack::new();
/// stack.push(Box::new(tracking));
/// ```
#[derive(Clone)]
pub struct TrackingLayer {
    config: Arc<TrackerConfig>,
    dispatcher: Arc<dyn Dispatch>,
}

impl TrackingLayer {
    /// Create the layer with an HTTP dispatcher
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config: Arc::new(config),
            dispatcher: Arc::new(HttpDispatcher::new()),
        }
    }

    /// Validate directives and create the layer
    pub fn from_directives<I>(directives: I) -> Result<Self>
    where
        I: IntoIterator<Item = Directive>,
    {
        TrackerConfig::from_directives(directives).map(Self::new)
    }

    /// Parse a `matomo { ... }` block and create the layer
    pub fn from_block(input: &str) -> Result<Self> {
        TrackerConfig::from_block(input).map(Self::new)
    }

    /// Read `MATOMO_*` environment variables and create the layer
    #[cfg(feature = "env")]
    pub fn from_env() -> Result<Self> {
        TrackerConfig::from_env().map(Self::new)
    }

    /// Replace the dispatcher
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn Dispatch>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// The shared configuration
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Wrap a downstream handler, returning a handler that tracks it
    pub fn wrap(&self, next: BoxedNext) -> BoxedNext {
        let layer = self.clone();
        Arc::new(move |req: Request| layer.call(req, next.clone()))
    }

    /// Filter, build and dispatch a tracking request for a finished request.
    ///
    /// Returns whether a request was handed to the dispatcher.
    pub fn observe(&self, snapshot: &RequestSnapshot) -> bool {
        if self.config.excludes().is_excluded(&snapshot.raw_uri) {
            tracing::debug!(raw_uri = %snapshot.raw_uri, "Request excluded from tracking");
            return false;
        }

        match TrackingRequest::build(&self.config, snapshot) {
            Ok(request) => {
                self.dispatcher.dispatch(request);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to build tracking request");
                false
            }
        }
    }
}

impl std::fmt::Debug for TrackingLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingLayer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MiddlewareLayer for TrackingLayer {
    fn call(&self, req: Request, next: BoxedNext) -> BoxFuture {
        let layer = self.clone();

        Box::pin(async move {
            let snapshot = RequestSnapshot::capture(&req);

            let outcome = next(req).await;

            layer.observe(&snapshot.with_outcome(&outcome));
            outcome
        })
    }

    fn clone_box(&self) -> Box<dyn MiddlewareLayer> {
        Box::new(self.clone())
    }
}

//! Handler chaining primitives
//!
//! A request handler is modelled as an explicit "next stage": a shared async
//! function from [`Request`] to [`Outcome`]. Middleware receives the request
//! together with the next stage and decides what to do around it.

use crate::error::HandlerError;
use bytes::Bytes;
use http_body_util::Full;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;

/// Request with a buffered body
pub type Request = http::Request<Bytes>;

/// Response with a buffered body
pub type Response = http::Response<Full<Bytes>>;

/// What a downstream handler produced: a response, or an error that may
/// carry an explicit status
pub type Outcome = Result<Response, HandlerError>;

/// Boxed future resolving to an [`Outcome`]
pub type BoxFuture = Pin<Box<dyn Future<Output = Outcome> + Send + 'static>>;

/// A boxed next function for middleware chains
pub type BoxedNext = Arc<dyn Fn(Request) -> BoxFuture + Send + Sync>;

/// Trait for pipeline stages wrapped around a downstream handler
pub trait MiddlewareLayer: Send + Sync + 'static {
    /// Handle a request, calling `next` to continue the chain
    fn call(&self, req: Request, next: BoxedNext) -> BoxFuture;

    /// Clone this middleware into a boxed trait object
    fn clone_box(&self) -> Box<dyn MiddlewareLayer>;
}

impl Clone for Box<dyn MiddlewareLayer> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Turn an async function into a [`BoxedNext`].
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use http_body_util::Full;
/// use matomo_relay::middleware::{handler_fn, Request};
///
/// let hello = handler_fn(|_req: Request| async {
///     Ok(http::Response::new(Full::new(Bytes::from("hello"))))
/// });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> BoxedNext
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    Arc::new(move |req: Request| Box::pin(f(req)) as BoxFuture)
}

/// Adapt a Tower service into a [`BoxedNext`].
///
/// Service errors become [`HandlerError`]s without an explicit status.
pub fn service_next<S>(service: S) -> BoxedNext
where
    S: Service<Request, Response = Response> + Clone + Send + Sync + 'static,
    S::Error: Into<crate::error::BoxError>,
    S::Future: Send + 'static,
{
    Arc::new(move |req: Request| {
        let mut service = service.clone();
        Box::pin(async move {
            futures_util::future::poll_fn(|cx| service.poll_ready(cx))
                .await
                .map_err(HandlerError::from_source)?;
            service.call(req).await.map_err(HandlerError::from_source)
        }) as BoxFuture
    })
}

/// A stack of middleware layers
#[derive(Clone, Default)]
pub struct LayerStack {
    layers: Vec<Box<dyn MiddlewareLayer>>,
}

impl LayerStack {
    /// Create a new empty layer stack
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Add a middleware layer to the stack
    ///
    /// Layers are executed in the order they are added (outermost first).
    pub fn push(&mut self, layer: Box<dyn MiddlewareLayer>) {
        self.layers.push(layer);
    }

    /// Add a middleware layer to the beginning of the stack
    pub fn prepend(&mut self, layer: Box<dyn MiddlewareLayer>) {
        self.layers.insert(0, layer);
    }

    /// Check if the stack is empty
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Get the number of layers
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Compose every layer around `handler` into a single next function
    pub fn build(&self, handler: BoxedNext) -> BoxedNext {
        // Build the chain from inside out
        let mut next = handler;

        for layer in self.layers.iter().rev() {
            let layer = layer.clone_box();
            let current_next = next;
            next = Arc::new(move |req: Request| {
                let layer = layer.clone_box();
                let next = current_next.clone();
                Box::pin(async move { layer.call(req, next).await }) as BoxFuture
            });
        }

        next
    }

    /// Execute the middleware stack with a final handler
    pub fn execute(&self, req: Request, handler: BoxedNext) -> BoxFuture {
        if self.layers.is_empty() {
            return handler(req);
        }
        self.build(handler)(req)
    }
}

/// A [`BoxedNext`] exposed as a Tower service
pub struct NextService {
    next: BoxedNext,
}

impl NextService {
    pub fn new(next: BoxedNext) -> Self {
        Self { next }
    }
}

impl Clone for NextService {
    fn clone(&self) -> Self {
        Self {
            next: self.next.clone(),
        }
    }
}

impl Service<Request> for NextService {
    type Response = Response;
    type Error = HandlerError;
    type Future = BoxFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request) -> Self::Future {
        (self.next)(req)
    }
}

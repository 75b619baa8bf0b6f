//! Middleware infrastructure
//!
//! Handlers and middleware share one shape: a [`BoxedNext`] takes a
//! buffered [`Request`] and resolves to an [`Outcome`]. [`TrackingLayer`]
//! wraps such a handler and relays every request it sees to the collector.
//!
//! # Example
//!
//! ```rust,ignore
//! use matomo_relay::middleware::{handler_fn, LayerStack, TrackingLayer};
//!
//! let mut stack = LayerStack::new();
//! stack.push(Box::new(TrackingLayer::from_env()?));
//!
//! let app = stack.build(handler_fn(hello));
//! ```

mod layer;
mod tracking;

pub use layer::{
    handler_fn, service_next, BoxFuture, BoxedNext, LayerStack, MiddlewareLayer, NextService,
    Outcome, Request, Response,
};
pub use tracking::TrackingLayer;

//! # matomo-relay
//!
//! HTTP middleware that reports every request it sees to a
//! [Matomo](https://matomo.org) collector through the server-side tracking
//! API.
//!
//! The pipeline per request:
//!
//! 1. [`RequestSnapshot::capture`] reads URL, client IP, referrer, user agent
//!    and language before the request is handed downstream.
//! 2. The downstream handler runs; its outcome is returned unchanged.
//! 3. Requests whose raw request-URI matches an exclusion pattern stop here.
//! 4. [`TrackingRequest::build`] turns the snapshot into a `GET` against the
//!    collector URL.
//! 5. A [`Dispatch`] implementation sends it in the background.
//!
//! Tracking never changes the response and never reports errors to the
//! client: problems are logged through `tracing` and the event is dropped.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use matomo_relay::middleware::{handler_fn, LayerStack, TrackingLayer};
//! use matomo_relay::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let mut layers = LayerStack::new();
//!     layers.push(Box::new(TrackingLayer::from_block(
//!         "matomo {\n url https://stats.example.com/matomo.php\n token abc\n}",
//!     )?));
//!
//!     Server::new(layers, handler_fn(hello)).run("127.0.0.1:8080").await
//! }
//! ```
//!
//! ## Features
//!
//! - `env` (default): [`TrackerConfig::from_env`] reading `MATOMO_*`
//!   variables

pub mod config;
pub mod directive;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod filter;
pub mod middleware;
mod server;
pub mod tracking;

pub use config::{TrackerConfig, TrackerConfigBuilder, DEFAULT_SITE};
pub use directive::{parse_block, Directive, BLOCK_NAME};
pub use dispatch::{Dispatch, HttpDispatcher};
pub use error::{BoxError, ConfigError, DispatchError, HandlerError, TrackingError};
pub use extract::{RawRequestUri, RemoteAddr, RequestSnapshot};
pub use filter::ExclusionFilter;
pub use middleware::TrackingLayer;
pub use server::Server;
pub use tracking::TrackingRequest;

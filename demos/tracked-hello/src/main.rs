//! Tracked hello world
//!
//! Reads `MATOMO_URL`, `MATOMO_TOKEN` and friends from the environment (or a
//! `.env` file) and serves a tiny app whose every request is reported to the
//! collector.
//!
//! Run with: cargo run -p tracked-hello
//!
//! Then visit: http://127.0.0.1:8080

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use matomo_relay::middleware::{handler_fn, LayerStack, Outcome, Request};
use matomo_relay::{HandlerError, Server, TrackingLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn app(req: Request) -> Outcome {
    match req.uri().path() {
        "/" => Ok(text(StatusCode::OK, "Hello, World!")),
        "/health" => Ok(text(StatusCode::OK, "OK")),
        "/teapot" => Ok(text(StatusCode::IM_A_TEAPOT, "short and stout")),
        "/boom" => Err(HandlerError::new("something broke")),
        path => Err(HandlerError::with_status(
            StatusCode::NOT_FOUND,
            format!("No route found for {}", path),
        )),
    }
}

fn text(status: StatusCode, body: &'static str) -> http::Response<Full<Bytes>> {
    let mut response = http::Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,matomo_relay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    let tracking = TrackingLayer::from_env()?;
    tracing::info!(collector = %tracking.config().url(), "Relaying requests to Matomo");

    let mut layers = LayerStack::new();
    layers.push(Box::new(tracking));

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    Server::new(layers, handler_fn(app)).run(&addr).await
}

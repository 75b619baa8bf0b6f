//! Minimal HTTP/1.1 host for a middleware stack

use crate::error::{BoxError, HandlerError};
use crate::extract::{RawRequestUri, RemoteAddr};
use crate::middleware::{BoxedNext, LayerStack, Request, Response};
use bytes::Bytes;
use http::{header, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Serves a handler wrapped in a [`LayerStack`].
///
/// Every request body is buffered before it enters the stack, and the peer
/// address and raw request target are attached as [`RemoteAddr`] and
/// [`RawRequestUri`] extensions.
pub struct Server {
    app: BoxedNext,
}

impl Server {
    pub fn new(layers: LayerStack, handler: BoxedNext) -> Self {
        Self {
            app: layers.build(handler),
        }
    }

    /// Bind `addr` and serve until the listener fails
    pub async fn run(self, addr: &str) -> Result<(), BoxError> {
        let addr: SocketAddr = addr.parse()?;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener
    pub async fn serve(self, listener: TcpListener) -> Result<(), BoxError> {
        info!(addr = %listener.local_addr()?, "Server listening");

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let app = self.app.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: hyper::Request<Incoming>| {
                    let app = app.clone();
                    async move {
                        let response = handle_request(app, req, remote_addr).await;
                        Ok::<_, Infallible>(response)
                    }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Connection error: {}", err);
                }
            });
        }
    }
}

/// Handle a single HTTP request
async fn handle_request(
    app: BoxedNext,
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = std::time::Instant::now();

    let (mut parts, body) = req.into_parts();

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            let response = error_response(&HandlerError::with_status(
                StatusCode::BAD_REQUEST,
                format!("Failed to read request body: {}", err),
            ));
            log_request(&method, &path, response.status(), start);
            return response;
        }
    };

    // hyper keeps the request target as received; origin-form targets print back unchanged
    parts
        .extensions
        .insert(RawRequestUri(parts.uri.to_string()));
    parts
        .extensions
        .insert(RemoteAddr(remote_addr.to_string()));

    let response = match app(Request::from_parts(parts, body)).await {
        Ok(response) => response,
        Err(err) => error_response(&err),
    };

    log_request(&method, &path, response.status(), start);
    response
}

fn error_response(err: &HandlerError) -> Response {
    let status = err.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = http::Response::new(Full::new(Bytes::from(err.message().to_string())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// Log request completion
fn log_request(method: &http::Method, path: &str, status: StatusCode, start: std::time::Instant) {
    let elapsed = start.elapsed();

    if status.is_server_error() {
        error!(
            method = %method,
            path = %path,
            status = %status.as_u16(),
            duration_ms = %elapsed.as_millis(),
            "Request failed"
        );
    } else {
        info!(
            method = %method,
            path = %path,
            status = %status.as_u16(),
            duration_ms = %elapsed.as_millis(),
            "Request completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::handler_fn;

    async fn spawn(handler: BoxedNext) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(Server::new(LayerStack::new(), handler).serve(listener));
        addr
    }

    #[test]
    fn error_response_defaults_to_500() {
        let response = error_response(&HandlerError::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain; charset=utf-8");

        let response = error_response(&HandlerError::with_status(StatusCode::FORBIDDEN, "no"));
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn attaches_peer_and_raw_target() {
        let addr = spawn(handler_fn(|req: Request| async move {
            let raw = req.extensions().get::<RawRequestUri>().unwrap().0.clone();
            let peer = req.extensions().get::<RemoteAddr>().unwrap().0.clone();
            let body = format!("{}|{}|{}", raw, peer, String::from_utf8_lossy(req.body()));
            Ok(http::Response::new(Full::new(Bytes::from(body))))
        }))
        .await;

        let text = reqwest::Client::new()
            .post(format!("http://{}/echo?a=1&b=two", addr))
            .body("payload")
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();

        let parts: Vec<_> = text.split('|').collect();
        assert_eq!(parts[0], "/echo?a=1&b=two");
        assert!(parts[1].starts_with("127.0.0.1:"));
        assert_eq!(parts[2], "payload");
    }

    #[tokio::test]
    async fn handler_error_becomes_text_response() {
        let addr = spawn(handler_fn(|_req| async {
            Err(HandlerError::with_status(StatusCode::NOT_FOUND, "nothing here"))
        }))
        .await;

        let response = reqwest::get(format!("http://{}/missing", addr)).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
        assert_eq!(response.text().await.unwrap(), "nothing here");
    }
}

//! Field extraction: derive the trackable attributes of a request.
//!
//! Extraction happens in two steps. [`RequestSnapshot::capture`] reads
//! everything it needs from the request before it is handed downstream, and
//! [`RequestSnapshot::with_outcome`] records the resolved status once the
//! downstream handler has finished. Nothing here fails: every odd input falls
//! back to a usable value and is logged.

use crate::middleware::{Outcome, Request};
use http::header::{ACCEPT_LANGUAGE, HOST, REFERER, USER_AGENT};
use http::{HeaderName, StatusCode, Uri};
use std::net::SocketAddr;

/// Host used when the request carries no Host information.
pub const PLACEHOLDER_HOST: &str = "example.com";

/// Scheme forced onto reconstructed URLs.
pub const SERVING_SCHEME: &str = "http";

/// Raw peer address as reported by the transport, e.g. `203.0.113.5:54321`
/// or `[::1]:8080`.
///
/// Hosts attach this as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAddr(pub String);

/// The request target exactly as it appeared on the request line.
///
/// Hosts attach this as a request extension when they have it; otherwise the
/// parsed URI is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRequestUri(pub String);

/// Trackable attributes of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSnapshot {
    /// Raw request-URI (path and query), used for exclusion matching
    pub raw_uri: String,
    /// Reconstructed absolute URL
    pub url: String,
    /// Client IP without port or IPv6 brackets
    pub client_ip: String,
    /// `Referer` header
    pub referrer: Option<String>,
    /// `User-Agent` header
    pub user_agent: Option<String>,
    /// `Accept-Language` header
    pub language: Option<String>,
    /// Resolved response status, once the downstream handler has finished
    pub status: Option<u16>,
}

impl RequestSnapshot {
    /// Capture the request side of a snapshot
    pub fn capture(req: &Request) -> Self {
        let raw_uri = raw_request_uri(req);
        let host = request_host(req);
        let url = reconstruct_url(&raw_uri, req.uri(), &host);

        Self {
            raw_uri,
            url,
            client_ip: parse_client_ip(&remote_addr(req)),
            referrer: header_value(req, &REFERER),
            user_agent: header_value(req, &USER_AGENT),
            language: header_value(req, &ACCEPT_LANGUAGE),
            status: None,
        }
    }

    /// Record the status resolved from a downstream outcome
    pub fn with_outcome(self, outcome: &Outcome) -> Self {
        self.with_status(status_of(outcome))
    }

    /// Record an already resolved status
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// Resolve the status to report for a finished request.
///
/// Precedence: a failure with no explicit status is `500`; otherwise an
/// explicit status wins; otherwise the status observed being written is used,
/// and `200` if nothing was written.
pub fn resolve_status(explicit: Option<StatusCode>, failed: bool, recorded: Option<StatusCode>) -> u16 {
    match (explicit, failed) {
        (None, true) => StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
        (None, false) => recorded.unwrap_or(StatusCode::OK).as_u16(),
        (Some(status), _) => status.as_u16(),
    }
}

/// Resolve the status of a downstream [`Outcome`].
///
/// A response is the status that was written; an error contributes its
/// explicit status, if any.
pub fn status_of(outcome: &Outcome) -> u16 {
    match outcome {
        Ok(response) => resolve_status(None, false, Some(response.status())),
        Err(err) => resolve_status(err.status(), true, None),
    }
}

/// Extract the client IP from a raw `host:port` remote address.
///
/// Everything before the last `:` is kept and surrounding `[`/`]` are
/// trimmed, so `[::1]:8080` gives `::1`. An address without any `:` is
/// logged and returned unchanged.
pub fn parse_client_ip(remote_addr: &str) -> String {
    match remote_addr.rfind(':') {
        Some(idx) => remote_addr[..idx]
            .trim_matches(|c| c == '[' || c == ']')
            .to_string(),
        None => {
            tracing::warn!(
                remote_addr = %remote_addr,
                "Cannot find ':' in remote address, using it as client ip"
            );
            remote_addr.to_string()
        }
    }
}

/// Rebuild the publicly visible URL of a request.
///
/// The raw request-URI is validated as a request target and its path and
/// query are kept byte for byte; if validation fails the already parsed
/// `fallback` URI is used. Scheme is always
/// [`SERVING_SCHEME`] and the host is `host`, or [`PLACEHOLDER_HOST`] when
/// empty.
pub fn reconstruct_url(raw_uri: &str, fallback: &Uri, host: &str) -> String {
    let path_and_query = match parse_request_target(raw_uri) {
        Ok(pq) => pq,
        Err(e) => {
            tracing::warn!(
                raw_uri = %raw_uri,
                error = %e,
                "Failed to parse request uri, falling back to parsed uri"
            );
            fallback
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| "/".to_string())
        }
    };

    let host = if host.is_empty() { PLACEHOLDER_HOST } else { host };
    format!("{}://{}{}", SERVING_SCHEME, host, path_and_query)
}

#[derive(Debug, thiserror::Error)]
enum TargetError {
    #[error(transparent)]
    Invalid(#[from] http::uri::InvalidUri),
    #[error("not an origin-form or absolute-form request target")]
    UnsupportedForm,
}

/// Validate an origin-form (`/path?query`) or absolute-form request target
/// and return its path and query exactly as received.
fn parse_request_target(raw: &str) -> Result<String, TargetError> {
    let uri: Uri = raw.parse()?;
    if uri.scheme().is_none() && !raw.starts_with('/') {
        return Err(TargetError::UnsupportedForm);
    }

    Ok(uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .filter(|pq| !pq.is_empty())
        .unwrap_or("/")
        .to_string())
}

fn raw_request_uri(req: &Request) -> String {
    match req.extensions().get::<RawRequestUri>() {
        Some(raw) => raw.0.clone(),
        None => req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| req.uri().to_string()),
    }
}

fn request_host(req: &Request) -> String {
    header_value(req, &HOST)
        .or_else(|| req.uri().authority().map(|a| a.as_str().to_string()))
        .unwrap_or_default()
}

fn remote_addr(req: &Request) -> String {
    if let Some(addr) = req.extensions().get::<RemoteAddr>() {
        return addr.0.clone();
    }
    req.extensions()
        .get::<SocketAddr>()
        .map(|addr| addr.to_string())
        .unwrap_or_default()
}

fn header_value(req: &Request, name: &HeaderName) -> Option<String> {
    let value = req.headers().get(name)?;
    match value.to_str() {
        Ok(s) if !s.is_empty() => Some(s.to_string()),
        Ok(_) => None,
        Err(_) => {
            tracing::debug!(header = %name, "Ignoring non-ASCII header value");
            None
        }
    }
}

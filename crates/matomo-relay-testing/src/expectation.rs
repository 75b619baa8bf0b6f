use super::matcher::RequestMatcher;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};

/// An expectation for tracking requests
#[derive(Debug, Clone)]
pub struct Expectation {
    pub(crate) matcher: RequestMatcher,
    pub(crate) response: MockResponse,
    pub(crate) times: Times,
    pub(crate) call_count: usize,
}

impl Expectation {
    /// Create a new expectation, matched exactly once by default
    pub fn new(matcher: RequestMatcher) -> Self {
        Self {
            matcher,
            response: MockResponse::default(),
            times: Times::Once,
            call_count: 0,
        }
    }

    /// Number of requests matched so far
    pub fn call_count(&self) -> usize {
        self.call_count
    }

    /// Whether the call count satisfies `times`
    pub fn is_satisfied(&self) -> bool {
        self.times.allows(self.call_count)
    }
}

/// How many times an expectation should be matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Times {
    Once,
    Exactly(usize),
    AtLeast(usize),
    AtMost(usize),
    Any,
}

impl Times {
    pub fn allows(self, count: usize) -> bool {
        match self {
            Times::Once => count == 1,
            Times::Exactly(n) => count == n,
            Times::AtLeast(n) => count >= n,
            Times::AtMost(n) => count <= n,
            Times::Any => true,
        }
    }
}

/// Canned collector answer.
///
/// Defaults to `204 No Content`, which is what a Matomo collector sends
/// when no tracking image is requested.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
}

impl Default for MockResponse {
    fn default() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }
}

impl MockResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn times_bounds() {
        assert!(Times::Once.allows(1));
        assert!(!Times::Once.allows(0));
        assert!(Times::Exactly(0).allows(0));
        assert!(Times::AtLeast(2).allows(5));
        assert!(!Times::AtLeast(2).allows(1));
        assert!(Times::AtMost(2).allows(0));
        assert!(!Times::AtMost(2).allows(3));
        assert!(Times::Any.allows(42));
    }

    #[test]
    fn default_response_is_no_content() {
        let response = MockResponse::new();
        assert_eq!(response.status, StatusCode::NO_CONTENT);
        assert!(response.body.is_empty());
    }
}

use super::error::MockCollectorError;
use super::expectation::{Expectation, MockResponse};
use super::matcher::RequestMatcher;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Notify};

type GenericError = Box<dyn std::error::Error + Send + Sync>;

/// Path served by [`MockCollector::tracking_url`]
pub const TRACKING_PATH: &str = "/matomo.php";

/// A mock Matomo collector
pub struct MockCollector {
    addr: SocketAddr,
    state: Arc<Mutex<CollectorState>>,
    arrived: Arc<Notify>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

#[derive(Default)]
struct CollectorState {
    expectations: Vec<Expectation>,
    requests: Vec<RecordedRequest>,
    unmatched_requests: Vec<RecordedRequest>,
}

/// A request as received by the collector
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: http::Method,
    pub path: String,
    /// Decoded query pairs in wire order
    pub query: Vec<(String, String)>,
    pub headers: http::HeaderMap,
    pub body: Bytes,
}

impl RecordedRequest {
    /// Value of the first query parameter named `key`
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl MockCollector {
    /// Start a collector on a random local port
    pub async fn start() -> Result<Self, MockCollectorError> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let state = Arc::new(Mutex::new(CollectorState::default()));
        let arrived = Arc::new(Notify::new());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let state_clone = state.clone();
        let arrived_clone = arrived.clone();
        tokio::spawn(async move {
            let mut stop_future = shutdown_rx;

            loop {
                tokio::select! {
                    res = listener.accept() => {
                        match res {
                            Ok((stream, _)) => {
                                let io = TokioIo::new(stream);
                                let state = state_clone.clone();
                                let arrived = arrived_clone.clone();

                                tokio::spawn(async move {
                                    let service = service_fn(move |req| {
                                        handle_request(req, state.clone(), arrived.clone())
                                    });
                                    if let Err(err) = hyper_util::server::conn::auto::Builder::new(hyper_util::rt::TokioExecutor::new())
                                        .serve_connection(io, service)
                                        .await
                                    {
                                        tracing::debug!(error = %err, "Mock collector connection error");
                                    }
                                });
                            }
                            Err(e) => tracing::debug!(error = %e, "Mock collector accept error"),
                        }
                    }
                    _ = &mut stop_future => {
                        break;
                    }
                }
            }
        });

        Ok(Self {
            addr,
            state,
            arrived,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    /// Base URL of the collector, e.g. `http://127.0.0.1:40123`
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// URL to configure as the tracking endpoint
    pub fn tracking_url(&self) -> String {
        format!("{}{}", self.base_url(), TRACKING_PATH)
    }

    /// Every request received so far, in arrival order
    pub fn received_requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    /// Requests that didn't match any expectation
    pub fn unmatched_requests(&self) -> Vec<RecordedRequest> {
        self.lock().unmatched_requests.clone()
    }

    /// Wait until at least `count` requests have arrived.
    ///
    /// Deliveries from the middleware are detached from the request that
    /// caused them, so tests poll for them rather than assume they are done.
    pub async fn wait_for_requests(
        &self,
        count: usize,
        timeout: Duration,
    ) -> Result<Vec<RecordedRequest>, MockCollectorError> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let notified = self.arrived.notified();
            tokio::pin!(notified);
            // Register before checking so an arrival in between is not missed
            notified.as_mut().enable();

            {
                let state = self.lock();
                if state.requests.len() >= count {
                    return Ok(state.requests.clone());
                }
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                let received = self.lock().requests.len();
                if received >= count {
                    return Ok(self.received_requests());
                }
                return Err(MockCollectorError::Timeout {
                    expected: count,
                    received,
                    timeout,
                });
            }
        }
    }

    /// Add an expectation
    pub fn expect(&self, matcher: RequestMatcher) -> ExpectationBuilder {
        ExpectationBuilder {
            collector: self.state.clone(),
            expectation: Some(Expectation::new(matcher)),
        }
    }

    /// Assert that every expectation was matched the expected number of times
    pub fn verify(&self) {
        let state = self.lock();
        for exp in &state.expectations {
            assert!(
                exp.is_satisfied(),
                "Expectation {:?} expected {:?} calls, got {}",
                exp.matcher,
                exp.times,
                exp.call_count
            );
        }
    }

    fn lock(&self) -> MutexGuard<'_, CollectorState> {
        lock(&self.state)
    }
}

impl Drop for MockCollector {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Registers its expectation with the collector when dropped
pub struct ExpectationBuilder {
    collector: Arc<Mutex<CollectorState>>,
    expectation: Option<Expectation>,
}

impl ExpectationBuilder {
    pub fn respond_with(mut self, response: MockResponse) -> Self {
        if let Some(exp) = self.expectation.as_mut() {
            exp.response = response;
        }
        self
    }

    pub fn times(mut self, n: usize) -> Self {
        self.set_times(super::Times::Exactly(n));
        self
    }

    pub fn once(mut self) -> Self {
        self.set_times(super::Times::Once);
        self
    }

    pub fn at_least_once(mut self) -> Self {
        self.set_times(super::Times::AtLeast(1));
        self
    }

    pub fn never(mut self) -> Self {
        self.set_times(super::Times::Exactly(0));
        self
    }

    fn set_times(&mut self, times: super::Times) {
        if let Some(exp) = self.expectation.as_mut() {
            exp.times = times;
        }
    }
}

impl Drop for ExpectationBuilder {
    fn drop(&mut self) {
        if let Some(exp) = self.expectation.take() {
            lock(&self.collector).expectations.push(exp);
        }
    }
}

// A panicking test thread must not hide what was recorded
fn lock(state: &Mutex<CollectorState>) -> MutexGuard<'_, CollectorState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<Mutex<CollectorState>>,
    arrived: Arc<Notify>,
) -> Result<Response<Full<Bytes>>, GenericError> {
    let (parts, body) = req.into_parts();
    let body = body.collect().await?.to_bytes();

    let query = parts
        .uri
        .query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    let recorded = RecordedRequest {
        method: parts.method,
        path: parts.uri.path().to_string(),
        query,
        headers: parts.headers,
        body,
    };

    let answer = {
        let mut state = lock(&state);
        state.requests.push(recorded.clone());

        // Later expectations override earlier ones
        let matching = state
            .expectations
            .iter_mut()
            .rev()
            .find(|exp| exp.matcher.matches(&recorded));

        match matching {
            Some(exp) => {
                exp.call_count += 1;
                exp.response.clone()
            }
            None => {
                state.unmatched_requests.push(recorded);
                MockResponse::default()
            }
        }
    };
    arrived.notify_waiters();

    let mut response = Response::builder().status(answer.status);
    for (k, v) in &answer.headers {
        response = response.header(k, v);
    }
    Ok(response.body(Full::new(answer.body))?)
}

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MockCollectorError {
    #[error("failed to bind mock collector: {0}")]
    Bind(#[from] std::io::Error),

    #[error("expected {expected} tracking requests within {timeout:?}, received {received}")]
    Timeout {
        expected: usize,
        received: usize,
        timeout: Duration,
    },
}

//! Testing utilities for matomo-relay
//!
//! [`MockCollector`] stands in for a Matomo tracking endpoint. It records
//! every request it receives, answers according to registered expectations,
//! and can wait for detached deliveries to arrive.
//!
//! ```rust,ignore
//! let collector = MockCollector::start().await?;
//! collector
//!     .expect(RequestMatcher::new().query_param("rec", "1"))
//!     .once();
//!
//! // ... drive the middleware at collector.tracking_url() ...
//!
//! let received = collector.wait_for_requests(1, Duration::from_secs(5)).await?;
//! assert_eq!(received[0].query_param("idsite"), Some("1"));
//! collector.verify();
//! ```

pub mod collector;
pub mod error;
pub mod expectation;
pub mod matcher;

pub use collector::{MockCollector, RecordedRequest, TRACKING_PATH};
pub use error::MockCollectorError;
pub use expectation::{Expectation, MockResponse, Times};
pub use matcher::RequestMatcher;

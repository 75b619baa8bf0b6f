//! Error types for matomo-relay
//!
//! Only [`ConfigError`] is ever surfaced to a caller in normal operation: it
//! is returned while building a [`TrackerConfig`](crate::TrackerConfig) at
//! startup. The remaining errors describe conditions inside the tracking
//! pipeline and are logged and discarded by the middleware.

use http::StatusCode;
use std::fmt;

/// Boxed error used as the source of a [`HandlerError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type alias for configuration building
pub type Result<T, E = ConfigError> = std::result::Result<T, E>;

/// Configuration errors.
///
/// Every variant is terminal: a middleware instance is never created from a
/// configuration that failed to validate.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required attribute (`url` or `token`) was never supplied.
    #[error("expecting \"{0}\" attribute for matomo directive")]
    MissingAttribute(&'static str),

    /// A directive that takes an argument was given none.
    #[error("expecting an argument for \"{directive}\" (line {line})")]
    MissingArgument { directive: String, line: usize },

    /// A directive was given more arguments than it accepts.
    #[error("too many arguments for \"{directive}\" (line {line}): expected {expected}, got {got}")]
    UnexpectedArguments {
        directive: String,
        line: usize,
        expected: usize,
        got: usize,
    },

    /// A directive name that this middleware does not know.
    #[error("unknown matomo directive \"{directive}\" (line {line})")]
    UnknownDirective { directive: String, line: usize },

    /// The block did not start with the expected name.
    #[error("expecting \"{expected}\", got \"{found}\" (line {line})")]
    ExpectedBlockName {
        expected: &'static str,
        found: String,
        line: usize,
    },

    /// The block name was not followed by an opening brace.
    #[error("expecting \"{{\", got \"{found}\" (line {line})")]
    ExpectedOpenBrace { found: String, line: usize },

    /// Input ended before a block or quoted token was closed.
    #[error("unexpected end of input: {0}")]
    UnexpectedEof(&'static str),

    /// Environment variables could not be deserialized.
    #[cfg(feature = "env")]
    #[error("environment configuration error: {0}")]
    Env(#[from] envy::Error),
}

/// Failure to construct an outbound tracking request.
#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    /// The configured collector URL is not a valid absolute URL.
    #[error("invalid collector url \"{url}\": {source}")]
    InvalidCollectorUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Failure to deliver a tracking request to the collector.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Connection, DNS, TLS or protocol failure.
    #[error("tracking request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The collector answered with a non-success status.
    #[error("collector returned status {0}")]
    Status(StatusCode),

    /// No async runtime was available to run the request on.
    #[error("no tokio runtime available to send tracking request")]
    NoRuntime,
}

/// Error half of a downstream handler [`Outcome`](crate::middleware::Outcome).
///
/// A handler may fail with an explicit status (the host turns it into a
/// response with that status) or without one, in which case both the host and
/// the tracking pipeline treat it as `500 Internal Server Error`.
#[derive(Debug)]
pub struct HandlerError {
    status: Option<StatusCode>,
    message: String,
    source: Option<BoxError>,
}

impl HandlerError {
    /// Create an error with no explicit status
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            source: None,
        }
    }

    /// Create an error carrying an explicit status
    pub fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an underlying error
    pub fn from_source(source: impl Into<BoxError>) -> Self {
        let source = source.into();
        Self {
            status: None,
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// The explicit status, if the handler set one
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Human-readable message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} ({})", self.message, status.as_u16()),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for HandlerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_attribute_message_names_the_attribute() {
        let err = ConfigError::MissingAttribute("token");
        assert_eq!(
            err.to_string(),
            "expecting \"token\" attribute for matomo directive"
        );
    }

    #[test]
    fn open_brace_message_is_escaped() {
        let err = ConfigError::ExpectedOpenBrace {
            found: "url".to_string(),
            line: 1,
        };
        assert_eq!(err.to_string(), "expecting \"{\", got \"url\" (line 1)");
    }

    #[test]
    fn handler_error_display_includes_status() {
        let err = HandlerError::with_status(StatusCode::NOT_FOUND, "no such page");
        assert_eq!(err.to_string(), "no such page (404)");
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));

        let err = HandlerError::new("boom");
        assert_eq!(err.to_string(), "boom");
        assert_eq!(err.status(), None);
    }

    #[test]
    fn handler_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = HandlerError::from_source(io);
        assert_eq!(err.message(), "disk gone");
        assert!(std::error::Error::source(&err).is_some());
    }
}

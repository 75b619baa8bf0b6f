//! Pattern-based exclusion of requests from tracking.

use regex::Regex;

/// An ordered set of compiled exclusion patterns.
///
/// A request is excluded when any pattern matches anywhere in its raw
/// request-URI (path plus query). With no patterns nothing is excluded.
#[derive(Debug, Clone, Default)]
pub struct ExclusionFilter {
    patterns: Vec<Regex>,
}

impl ExclusionFilter {
    /// Create an empty filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an already compiled pattern
    pub fn push(&mut self, pattern: Regex) {
        self.patterns.push(pattern);
    }

    /// Compile and add a pattern.
    ///
    /// A pattern that fails to compile is logged and skipped; it never makes
    /// configuration fail. Returns whether the pattern was added.
    pub fn push_str(&mut self, pattern: &str) -> bool {
        match Regex::new(pattern) {
            Ok(re) => {
                self.patterns.push(re);
                true
            }
            Err(e) => {
                tracing::warn!(
                    pattern = %pattern,
                    error = %e,
                    "Failed to compile exclude regex, skipping"
                );
                false
            }
        }
    }

    /// Whether the raw request-URI matches any pattern
    pub fn is_excluded(&self, raw_uri: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(raw_uri))
    }

    /// Number of active patterns
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether there are no patterns
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Iterate over the pattern sources in insertion order
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(Regex::as_str)
    }
}

impl FromIterator<Regex> for ExclusionFilter {
    fn from_iter<I: IntoIterator<Item = Regex>>(iter: I) -> Self {
        Self {
            patterns: iter.into_iter().collect(),
        }
    }
}

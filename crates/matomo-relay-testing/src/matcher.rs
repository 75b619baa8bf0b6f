use crate::collector::RecordedRequest;
use http::Method;

/// Matcher for inbound tracking requests.
///
/// All configured criteria must hold. An empty matcher matches everything.
#[derive(Debug, Clone, Default)]
pub struct RequestMatcher {
    pub(crate) method: Option<Method>,
    pub(crate) path: Option<String>,
    pub(crate) query: Vec<(String, Option<String>)>,
    pub(crate) headers: Vec<(String, String)>,
}

impl RequestMatcher {
    /// Create a new matcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Match a specific HTTP method
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Match a specific path
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Match a decoded query parameter value
    pub fn query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), Some(value.into())));
        self
    }

    /// Match the presence of a query parameter with any value
    pub fn has_query_param(mut self, key: impl Into<String>) -> Self {
        self.query.push((key.into(), None));
        self
    }

    /// Match a specific header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Check if the matcher matches a recorded request
    pub fn matches(&self, request: &RecordedRequest) -> bool {
        if let Some(m) = &self.method {
            if *m != request.method {
                return false;
            }
        }

        if let Some(p) = &self.path {
            if *p != request.path {
                return false;
            }
        }

        for (key, expected) in &self.query {
            let found = match expected {
                Some(value) => request
                    .query
                    .iter()
                    .any(|(k, v)| k == key && v == value),
                None => request.query.iter().any(|(k, _)| k == key),
            };
            if !found {
                return false;
            }
        }

        for (k, v) in &self.headers {
            match request.headers.get(k) {
                Some(val) if val == v.as_str() => {}
                _ => return false,
            }
        }

        true
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use bytes::Bytes;
    use http::HeaderMap;
    use proptest::prelude::*;

    fn recorded(method: Method, path: &str, query: Vec<(String, String)>) -> RecordedRequest {
        RecordedRequest {
            method,
            path: path.to_string(),
            query,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    fn method_strategy() -> impl Strategy<Value = Method> {
        prop_oneof![
            Just(Method::GET),
            Just(Method::POST),
            Just(Method::HEAD),
        ]
    }

    fn param_strategy() -> impl Strategy<Value = (String, String)> {
        (
            prop_oneof![
                Just("rec".to_string()),
                Just("url".to_string()),
                Just("cip".to_string()),
                Just("idsite".to_string()),
                Just("dimension1".to_string()),
            ],
            "[a-z0-9 ./:]{0,12}",
        )
    }

    #[test]
    fn header_values_are_case_sensitive() {
        let mut request = recorded(Method::GET, "/matomo.php", Vec::new());
        request
            .headers
            .insert("user-agent", "Relay".parse().unwrap());

        assert!(RequestMatcher::new().header("User-Agent", "Relay").matches(&request));
        assert!(!RequestMatcher::new().header("user-agent", "relay").matches(&request));
        assert!(!RequestMatcher::new().header("accept", "*/*").matches(&request));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// An empty matcher accepts any request.
        #[test]
        fn prop_empty_matcher_matches_all(
            method in method_strategy(),
            path in "/[a-z]{1,10}\\.php",
            query in proptest::collection::vec(param_strategy(), 0..6),
        ) {
            prop_assert!(RequestMatcher::new().matches(&recorded(method, &path, query)));
        }

        /// A query matcher accepts exactly the requests carrying that pair.
        #[test]
        fn prop_query_param_matching(
            query in proptest::collection::vec(param_strategy(), 0..6),
            wanted in param_strategy(),
        ) {
            let request = recorded(Method::GET, "/matomo.php", query.clone());
            let expected = query.contains(&wanted);
            let present = query.iter().any(|(k, _)| k == &wanted.0);

            prop_assert_eq!(
                RequestMatcher::new().query_param(wanted.0.clone(), wanted.1.clone()).matches(&request),
                expected
            );
            prop_assert_eq!(
                RequestMatcher::new().has_query_param(wanted.0.clone()).matches(&request),
                present
            );
        }

        /// Criteria are combined with AND.
        #[test]
        fn prop_criteria_combine_with_and(
            method in method_strategy(),
            other in method_strategy(),
            path in "/[a-z]{1,10}\\.php",
        ) {
            let request = recorded(method.clone(), &path, vec![("rec".into(), "1".into())]);
            let matcher = RequestMatcher::new()
                .method(other.clone())
                .path(path.clone())
                .query_param("rec", "1");

            prop_assert_eq!(matcher.matches(&request), method == other);
            prop_assert!(!matcher.clone().path("/elsewhere").matches(&request));
        }
    }
}

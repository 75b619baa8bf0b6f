//! Construction of outbound tracking requests.
//!
//! A tracking request is a plain `GET` against the collector URL whose query
//! string carries the event, following the Matomo HTTP tracking API:
//!
//! | Parameter | Value |
//! |---|---|
//! | `rec` | `1` |
//! | `apiv` | `1` |
//! | `send_image` | `0` |
//! | `url` | reconstructed request URL |
//! | `cip` | client IP |
//! | `idsite` | site id |
//! | `token_auth` | auth token |
//! | `urlref`, `ua`, `lang` | when present on the request |
//! | `dimension1` | response status, when known |
//! | `bots` | `1` when bots are counted |

use crate::config::TrackerConfig;
use crate::error::TrackingError;
use crate::extract::RequestSnapshot;
use http::Method;
use url::Url;

/// Custom page-scope dimension carrying the HTTP status.
pub const STATUS_DIMENSION: &str = "dimension1";

/// A fully built outbound tracking request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingRequest {
    url: Url,
}

impl TrackingRequest {
    /// Build the tracking request for one observed request.
    ///
    /// Query parameters already present on the collector URL are kept. The
    /// final query is sorted by key, so equal inputs always give the same URL.
    pub fn build(config: &TrackerConfig, snapshot: &RequestSnapshot) -> Result<Self, TrackingError> {
        let mut url = Url::parse(config.url()).map_err(|source| TrackingError::InvalidCollectorUrl {
            url: config.url().to_string(),
            source,
        })?;

        let mut params: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let mut add = |key: &str, value: &str| params.push((key.to_string(), value.to_string()));

        add("rec", "1");
        add("apiv", "1");
        add("send_image", "0");

        if let Some(status) = snapshot.status {
            add(STATUS_DIMENSION, &status.to_string());
        }
        add("url", &snapshot.url);
        add("cip", &snapshot.client_ip);

        if let Some(referrer) = &snapshot.referrer {
            add("urlref", referrer);
        }
        if let Some(user_agent) = &snapshot.user_agent {
            add("ua", user_agent);
        }
        if let Some(language) = &snapshot.language {
            add("lang", language);
        }

        add("idsite", config.site());
        add("token_auth", config.token());
        if config.count_bots() {
            add("bots", "1");
        }

        // Stable sort keeps the relative order of repeated keys
        params.sort_by(|a, b| a.0.cmp(&b.0));

        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter())
            .finish();
        url.set_query(Some(&query));

        Ok(Self { url })
    }

    /// HTTP method of the request
    pub fn method(&self) -> Method {
        Method::GET
    }

    /// Full target URL including the query string
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Decoded query parameters in wire order
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.url.query_pairs().into_owned().collect()
    }

    /// Value of the first query parameter named `key`
    pub fn param(&self, key: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    /// Consume into the target URL
    pub fn into_url(self) -> Url {
        self.url
    }
}

//! Tracker configuration.
//!
//! [`TrackerConfig`] is built once at startup and shared read-only by every
//! request. All construction paths (directives, a text block, the builder and
//! the environment) go through [`TrackerConfig::from_directives`], so the
//! validation rules are the same everywhere:
//!
//! - `url` and `token` are required
//! - `site` defaults to `"1"`
//! - bots are counted unless `nobots` is given
//! - `exclude` patterns that fail to compile are logged and skipped

use crate::directive::{self, Directive};
use crate::error::{ConfigError, Result};
use crate::filter::ExclusionFilter;

/// Default Matomo site id.
pub const DEFAULT_SITE: &str = "1";

/// Validated, immutable tracker settings.
///
/// # Example
///
/// ```
/// use matomo_relay::TrackerConfig;
///
/// let config = TrackerConfig::builder()
///     .url("https://stats.example.com/matomo.php")
///     .token("0123abcd")
///     .exclude("^/health")
///     .build()
///     .unwrap();
///
/// assert_eq!(config.site(), "1");
/// assert!(config.count_bots());
/// ```
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    url: String,
    site: String,
    token: String,
    bots: bool,
    excludes: ExclusionFilter,
}

impl TrackerConfig {
    /// Start a programmatic builder
    pub fn builder() -> TrackerConfigBuilder {
        TrackerConfigBuilder::default()
    }

    /// Validate a sequence of directives.
    ///
    /// Later `url`, `token` and `site` directives override earlier ones;
    /// `exclude` directives accumulate in order.
    pub fn from_directives<I>(directives: I) -> Result<Self>
    where
        I: IntoIterator<Item = Directive>,
    {
        let mut url = None;
        let mut token = None;
        let mut site = DEFAULT_SITE.to_string();
        let mut bots = true;
        let mut excludes = ExclusionFilter::new();

        for d in directives {
            match d.name.as_str() {
                "url" => url = Some(single_arg(&d)?),
                "token" => token = Some(single_arg(&d)?),
                "site" => site = single_arg(&d)?,
                "exclude" => {
                    let pattern = single_arg(&d)?;
                    excludes.push_str(&pattern);
                }
                "nobots" => {
                    if !d.args.is_empty() {
                        return Err(ConfigError::UnexpectedArguments {
                            directive: d.name,
                            line: d.line,
                            expected: 0,
                            got: d.args.len(),
                        });
                    }
                    bots = false;
                }
                _ => {
                    return Err(ConfigError::UnknownDirective {
                        directive: d.name,
                        line: d.line,
                    })
                }
            }
        }

        let url = url
            .filter(|u| !u.is_empty())
            .ok_or(ConfigError::MissingAttribute("url"))?;
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingAttribute("token"))?;

        Ok(Self {
            url,
            site,
            token,
            bots,
            excludes,
        })
    }

    /// Parse and validate a `matomo { ... }` text block
    pub fn from_block(input: &str) -> Result<Self> {
        Self::from_directives(directive::parse_block(input)?)
    }

    /// Load configuration from `MATOMO_*` environment variables.
    ///
    /// | Variable | Meaning |
    /// |---|---|
    /// | `MATOMO_URL` | collector URL (required) |
    /// | `MATOMO_TOKEN` | auth token (required) |
    /// | `MATOMO_SITE` | site id |
    /// | `MATOMO_NOBOTS` | `true` to stop counting bots |
    /// | `MATOMO_EXCLUDE` | comma-separated exclusion patterns |
    #[cfg(feature = "env")]
    pub fn from_env() -> Result<Self> {
        let env = envy::prefixed("MATOMO_").from_env::<EnvConfig>()?;
        Self::from_directives(env.into_directives())
    }

    /// Collector endpoint URL as configured
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Matomo site id
    pub fn site(&self) -> &str {
        &self.site
    }

    /// Auth token sent as `token_auth`
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Whether requests by bots are recorded
    pub fn count_bots(&self) -> bool {
        self.bots
    }

    /// The exclusion patterns
    pub fn excludes(&self) -> &ExclusionFilter {
        &self.excludes
    }
}

fn single_arg(d: &Directive) -> Result<String> {
    match d.args.as_slice() {
        [arg] if !arg.is_empty() => Ok(arg.clone()),
        [] | [_] => Err(ConfigError::MissingArgument {
            directive: d.name.clone(),
            line: d.line,
        }),
        args => Err(ConfigError::UnexpectedArguments {
            directive: d.name.clone(),
            line: d.line,
            expected: 1,
            got: args.len(),
        }),
    }
}

#[cfg(feature = "env")]
#[derive(Debug, serde::Deserialize)]
struct EnvConfig {
    url: Option<String>,
    token: Option<String>,
    site: Option<String>,
    #[serde(default)]
    nobots: bool,
    #[serde(default)]
    exclude: Vec<String>,
}

#[cfg(feature = "env")]
impl EnvConfig {
    fn into_directives(self) -> Vec<Directive> {
        let mut directives = Vec::new();
        if let Some(url) = self.url {
            directives.push(Directive::new("url", [url]));
        }
        if let Some(token) = self.token {
            directives.push(Directive::new("token", [token]));
        }
        if let Some(site) = self.site {
            directives.push(Directive::new("site", [site]));
        }
        for pattern in self.exclude.into_iter().filter(|p| !p.is_empty()) {
            directives.push(Directive::new("exclude", [pattern]));
        }
        if self.nobots {
            directives.push(Directive::flag("nobots"));
        }
        directives
    }
}

/// Builder for [`TrackerConfig`].
///
/// Records directives and validates them all at once in [`build`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct TrackerConfigBuilder {
    directives: Vec<Directive>,
}

impl TrackerConfigBuilder {
    fn push(mut self, name: &str, arg: String) -> Self {
        self.directives.push(Directive::new(name, [arg]));
        self
    }

    /// Set the collector URL
    pub fn url(self, url: impl Into<String>) -> Self {
        self.push("url", url.into())
    }

    /// Set the auth token
    pub fn token(self, token: impl Into<String>) -> Self {
        self.push("token", token.into())
    }

    /// Set the site id
    pub fn site(self, site: impl Into<String>) -> Self {
        self.push("site", site.into())
    }

    /// Append an exclusion pattern
    pub fn exclude(self, pattern: impl Into<String>) -> Self {
        self.push("exclude", pattern.into())
    }

    /// Stop counting bots
    pub fn no_bots(mut self) -> Self {
        self.directives.push(Directive::flag("nobots"));
        self
    }

    /// Validate and build
    pub fn build(self) -> Result<TrackerConfig> {
        TrackerConfig::from_directives(self.directives)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Vec<Directive> {
        vec![
            Directive::new("url", ["http://localhost:2015/matomo.php"]),
            Directive::new("token", ["secret"]),
        ]
    }

    #[test]
    fn defaults_are_applied() {
        let config = TrackerConfig::from_directives(base()).unwrap();
        assert_eq!(config.url(), "http://localhost:2015/matomo.php");
        assert_eq!(config.token(), "secret");
        assert_eq!(config.site(), DEFAULT_SITE);
        assert!(config.count_bots());
        assert!(config.excludes().is_empty());
    }

    #[test]
    fn missing_url_is_fatal() {
        let err =
            TrackerConfig::from_directives(vec![Directive::new("token", ["secret"])]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingAttribute("url")));
    }

    #[test]
    fn missing_token_is_fatal() {
        let err = TrackerConfig::from_directives(vec![Directive::new("url", ["http://x"])])
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingAttribute("token")));
    }

    #[test]
    fn missing_argument_is_fatal() {
        for name in ["url", "token", "site", "exclude"] {
            let mut directives = base();
            directives.push(Directive::flag(name));
            let err = TrackerConfig::from_directives(directives).unwrap_err();
            assert!(
                matches!(err, ConfigError::MissingArgument { ref directive, .. } if directive == name),
                "{name}: {err}"
            );
        }
    }

    #[test]
    fn extra_arguments_are_fatal() {
        let mut directives = base();
        directives.push(Directive::new("exclude", ["a", "b"]));
        let err = TrackerConfig::from_directives(directives).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnexpectedArguments { expected: 1, got: 2, .. }
        ));

        let mut directives = base();
        directives.push(Directive::new("nobots", ["yes"]));
        let err = TrackerConfig::from_directives(directives).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnexpectedArguments { expected: 0, got: 1, .. }
        ));
    }

    #[test]
    fn unknown_directive_is_fatal() {
        let mut directives = base();
        directives.push(Directive::new("sampling", ["0.5"]));
        let err = TrackerConfig::from_directives(directives).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownDirective { .. }));
    }

    #[test]
    fn nobots_disables_bot_counting() {
        let mut directives = base();
        directives.push(Directive::flag("nobots"));
        let config = TrackerConfig::from_directives(directives).unwrap();
        assert!(!config.count_bots());
    }

    #[test]
    fn bad_exclude_pattern_is_skipped() {
        let mut directives = base();
        directives.push(Directive::new("exclude", ["[unclosed"]));
        directives.push(Directive::new("exclude", ["^/health"]));
        let config = TrackerConfig::from_directives(directives).unwrap();
        assert_eq!(config.excludes().len(), 1);
        assert!(config.excludes().is_excluded("/health"));
    }

    #[test]
    fn later_values_override_earlier_ones() {
        let mut directives = base();
        directives.push(Directive::new("site", ["2"]));
        directives.push(Directive::new("site", ["5"]));
        let config = TrackerConfig::from_directives(directives).unwrap();
        assert_eq!(config.site(), "5");
    }

    #[test]
    fn builder_validates_like_directives() {
        let config = TrackerConfig::builder()
            .url("http://stats/matomo.php")
            .token("t")
            .site("9")
            .exclude("^/a")
            .exclude("^/b")
            .no_bots()
            .build()
            .unwrap();
        assert_eq!(config.site(), "9");
        assert!(!config.count_bots());
        assert_eq!(config.excludes().patterns().collect::<Vec<_>>(), vec!["^/a", "^/b"]);

        let err = TrackerConfig::builder().token("t").build().unwrap_err();
        assert!(matches!(err, ConfigError::MissingAttribute("url")));

        let err = TrackerConfig::builder().url("").token("t").build().unwrap_err();
        assert!(matches!(err, ConfigError::MissingArgument { .. }));
    }

    #[test]
    fn from_block_parses_and_validates() {
        let config = TrackerConfig::from_block(
            r#"
            matomo {
                url http://localhost:2015/matomo.php
                token abc
                site 4
                exclude "^/(health|metrics)$"
                nobots
            }
            "#,
        )
        .unwrap();
        assert_eq!(config.site(), "4");
        assert!(!config.count_bots());
        assert!(config.excludes().is_excluded("/metrics"));

        let err = TrackerConfig::from_block("matomo {\n url http://x\n}").unwrap_err();
        assert!(matches!(err, ConfigError::MissingAttribute("token")));
    }

    #[cfg(feature = "env")]
    #[test]
    fn env_config_maps_to_directives() {
        let env = EnvConfig {
            url: Some("http://x/matomo.php".into()),
            token: Some("t".into()),
            site: None,
            nobots: true,
            exclude: vec!["^/a".into(), String::new(), "^/b".into()],
        };
        let config = TrackerConfig::from_directives(env.into_directives()).unwrap();
        assert_eq!(config.site(), DEFAULT_SITE);
        assert!(!config.count_bots());
        assert_eq!(config.excludes().len(), 2);
    }

    #[cfg(feature = "env")]
    #[test]
    fn env_config_without_token_is_fatal() {
        let env = EnvConfig {
            url: Some("http://x/matomo.php".into()),
            token: None,
            site: None,
            nobots: false,
            exclude: Vec::new(),
        };
        let err = TrackerConfig::from_directives(env.into_directives()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingAttribute("token")));
    }
}

//! Configuration for the scraping module.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::scraping::error::{ScrapeError, ScrapeResult};

/// Default thread base URL; `base_url + id` is a thread page.
pub const DEFAULT_BASE_URL: &str = "https://f95zone.to/threads/";
/// Default search endpoint.
pub const DEFAULT_SEARCH_URL: &str = "https://f95zone.to/search/";
/// Images hosted by the site start with this prefix.
pub const DEFAULT_ATTACHMENT_PREFIX: &str = "https://attachments.f95zone.to/";
/// Cover images (Open Graph) start with this prefix.
pub const DEFAULT_COVER_PREFIX: &str = "https://f95zone.to/data/covers";
/// Fixed client identifier sent as `User-Agent`.
pub const DEFAULT_USER_AGENT: &str = "Playnite.Extensions";

/// Configuration for the scraper.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Base URL of thread pages.
    pub base_url: String,
    /// Search endpoint.
    pub search_url: String,
    /// Prefix of attachment images kept by the image rule.
    pub attachment_prefix: String,
    /// Prefix of Open Graph cover images.
    pub cover_prefix: String,
    /// `User-Agent` header value.
    pub user_agent: String,
    /// Request timeout.
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,
    /// Connection timeout.
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,
    /// Fallback renderer settings.
    pub renderer: RendererSettings,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            search_url: DEFAULT_SEARCH_URL.to_string(),
            attachment_prefix: DEFAULT_ATTACHMENT_PREFIX.to_string(),
            cover_prefix: DEFAULT_COVER_PREFIX.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            renderer: RendererSettings::default(),
        }
    }
}

impl ScraperConfig {
    /// Create a new config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON config file. Missing keys take their defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> ScrapeResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Point thread and search URLs at another site root, e.g. a test server.
    #[must_use]
    pub fn with_site_root(mut self, root: &str) -> Self {
        let root = root.trim_end_matches('/');
        self.base_url = format!("{root}/threads/");
        self.search_url = format!("{root}/search/");
        self
    }

    /// Set the thread base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the search endpoint.
    #[must_use]
    pub fn with_search_url(mut self, search_url: impl Into<String>) -> Self {
        self.search_url = search_url.into();
        self
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the WebDriver endpoint used by the fallback renderer.
    #[must_use]
    pub fn with_webdriver_url(mut self, url: impl Into<String>) -> Self {
        self.renderer.webdriver_url = url.into();
        self
    }

    /// Apply environment overrides (`WEBDRIVER_URL`).
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(webdriver_url) = std::env::var("WEBDRIVER_URL") {
            if !webdriver_url.is_empty() {
                self.renderer.webdriver_url = webdriver_url;
            }
        }
        self
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if a URL is malformed or a value is out of range.
    pub fn validate(&self) -> ScrapeResult<()> {
        for (key, value) in [
            ("base_url", &self.base_url),
            ("search_url", &self.search_url),
            ("renderer.webdriver_url", &self.renderer.webdriver_url),
        ] {
            Url::parse(value)
                .map_err(|e| ScrapeError::Config(format!("{key} is not a valid URL: {e}")))?;
        }

        if !self.base_url.ends_with('/') {
            return Err(ScrapeError::Config("base_url must end with '/'".to_string()));
        }

        if self.user_agent.trim().is_empty() {
            return Err(ScrapeError::Config("user_agent must not be empty".to_string()));
        }

        if self.request_timeout.is_zero() {
            return Err(ScrapeError::Config("request_timeout must be > 0".to_string()));
        }

        if self.renderer.cookie_fallback_ttl.is_zero() {
            return Err(ScrapeError::Config(
                "renderer.cookie_fallback_ttl must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Origin of the site (`scheme://host[:port]`), used to resolve relative links.
    ///
    /// # Errors
    /// Returns an error if `base_url` is not a valid URL.
    pub fn site_origin(&self) -> ScrapeResult<Url> {
        let base = Url::parse(&self.base_url)?;
        Ok(base.join("/")?)
    }
}

/// Settings for the fallback renderer surface.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    /// WebDriver endpoint.
    pub webdriver_url: String,
    /// Run the browser without a window.
    pub headless: bool,
    /// Whether scripts run; the challenge pages need them.
    pub javascript_enabled: bool,
    /// Window width in pixels.
    pub window_width: u32,
    /// Window height in pixels.
    pub window_height: u32,
    /// `User-Agent` of the rendered session.
    pub user_agent: String,
    /// Expiry applied to replicated cookies that have none.
    #[serde(with = "duration_serde")]
    pub cookie_fallback_ttl: Duration,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:4444".to_string(),
            headless: false,
            javascript_enabled: true,
            window_width: 900,
            window_height: 700,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            cookie_fallback_ttl: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

/// Serde module for Duration serialization.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ScraperConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.user_agent, "Playnite.Extensions");
        assert_eq!(config.renderer.window_width, 900);
        assert_eq!(config.renderer.cookie_fallback_ttl, Duration::from_secs(604_800));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = ScraperConfig::new()
            .with_site_root("http://127.0.0.1:8080/")
            .with_timeout(Duration::from_secs(60))
            .with_webdriver_url("http://localhost:9515");

        assert_eq!(config.base_url, "http://127.0.0.1:8080/threads/");
        assert_eq!(config.search_url, "http://127.0.0.1:8080/search/");
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.renderer.webdriver_url, "http://localhost:9515");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = ScraperConfig::new().with_base_url("not a url");
        assert!(matches!(config.validate(), Err(ScrapeError::Config(_))));

        let config = ScraperConfig::new().with_base_url("https://f95zone.to/threads");
        assert!(matches!(config.validate(), Err(ScrapeError::Config(_))));

        let config = ScraperConfig::new().with_timeout(Duration::ZERO);
        assert!(matches!(config.validate(), Err(ScrapeError::Config(_))));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{"user_agent": "custom", "request_timeout": 5, "renderer": {"headless": true}}"#;
        let config: ScraperConfig = serde_json::from_str(json).unwrap_or_default();
        assert_eq!(config.user_agent, "custom");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert!(config.renderer.headless);
        assert_eq!(config.renderer.window_height, 700);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_site_origin() {
        let config = ScraperConfig::default();
        let origin = config.site_origin().map(|u| u.to_string()).unwrap_or_default();
        assert_eq!(origin, "https://f95zone.to/");
    }
}

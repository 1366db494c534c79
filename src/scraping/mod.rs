//! Thread metadata scraping for the forum site.
//!
//! This module provides:
//! - Title and rating grammar
//! - Cookie-authenticated page fetching
//! - Bot-protection detection with a one-shot browser bypass
//! - Thread page and search result extraction

pub mod cancel;
pub mod config;
pub mod cookies;
pub mod dom;
pub mod error;
pub mod fetcher;
pub mod grammar;
pub mod guard;
pub mod notify;
pub mod page;
pub mod rating;
pub mod render;
pub mod search;
pub mod types;

pub use cancel::{CancelHandle, CancelSignal};
pub use config::{RendererSettings, ScraperConfig};
pub use cookies::{Cookie, CookieSet};
pub use error::{ScrapeError, ScrapeResult};
pub use fetcher::DocumentFetcher;
pub use guard::AntiBotGuard;
pub use notify::{LogNotifier, Notification, Notifier};
pub use page::PageExtractor;
pub use render::{Renderer, RendererFactory, WebDriverRendererFactory};
pub use search::SearchExtractor;
pub use types::{PageLink, PageResult, SearchResult};

use std::sync::Arc;

use tracing::{debug, error, info};
use url::Url;

/// Main scraper that coordinates fetching, guarding and extraction.
pub struct Scraper {
    config: ScraperConfig,
    fetcher: DocumentFetcher,
    renderers: Arc<dyn RendererFactory>,
    notifier: Arc<dyn Notifier>,
    pages: PageExtractor,
    searches: SearchExtractor,
}

impl Scraper {
    /// Create a scraper from its collaborators.
    ///
    /// # Errors
    /// Returns an error if the config is invalid or the HTTP client cannot
    /// be created.
    pub fn new(
        config: ScraperConfig,
        cookies: CookieSet,
        renderers: Arc<dyn RendererFactory>,
        notifier: Arc<dyn Notifier>,
    ) -> ScrapeResult<Self> {
        config.validate()?;
        let fetcher = DocumentFetcher::new(&config, Arc::new(cookies))?;
        let pages = PageExtractor::new(&config);
        let searches = SearchExtractor::new(config.site_origin()?);

        Ok(Self {
            config,
            fetcher,
            renderers,
            notifier,
            pages,
            searches,
        })
    }

    /// Create a scraper using a WebDriver renderer and log-only notifications.
    ///
    /// # Errors
    /// Returns an error if the config is invalid or the HTTP client cannot
    /// be created.
    pub fn with_defaults(config: ScraperConfig, cookies: CookieSet) -> ScrapeResult<Self> {
        Self::new(
            config,
            cookies,
            Arc::new(WebDriverRendererFactory),
            Arc::new(LogNotifier),
        )
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &ScraperConfig {
        &self.config
    }

    /// URL of the thread page for `id`.
    ///
    /// # Errors
    /// Returns an error if the resulting URL is invalid.
    pub fn page_url(&self, id: &str) -> ScrapeResult<Url> {
        Ok(Url::parse(&format!("{}{}", self.config.base_url, id.trim()))?)
    }

    /// URL of the search page for `term` at unix timestamp `ts`.
    ///
    /// # Errors
    /// Returns an error if the resulting URL is invalid.
    pub fn search_url(&self, term: &str, ts: i64) -> ScrapeResult<Url> {
        search::build_search_url(&self.config.search_url, term, ts)
    }

    fn guard(&self) -> AntiBotGuard<'_> {
        AntiBotGuard::new(
            self.renderers.as_ref(),
            &self.config.renderer,
            self.fetcher.cookies(),
        )
    }

    /// Fetch thread `id` and extract its metadata.
    ///
    /// # Errors
    /// Any fetch or guard failure. Field-level extraction failures are
    /// logged and leave the field absent instead.
    pub async fn fetch_page(&self, id: &str, cancel: &CancelSignal) -> ScrapeResult<PageResult> {
        let result = self.fetch_page_inner(id, cancel).await;
        if let Err(err) = &result {
            self.report(&format!("Could not scrape page {id}"), err);
        }
        result
    }

    async fn fetch_page_inner(&self, id: &str, cancel: &CancelSignal) -> ScrapeResult<PageResult> {
        let url = self.page_url(id)?;
        let document = self.fetcher.fetch(&url, cancel).await?;
        let document = self.guard().resolve(document, cancel).await?;

        let page = self.pages.extract(&document, id);
        info!(page = id, name = ?page.name, "Scraped page");
        Ok(page)
    }

    /// Search the site for `term`.
    ///
    /// Fetch and guard failures are reported and yield an empty list.
    ///
    /// # Errors
    /// `Cancelled` if `cancel` fires, or an invalid search URL.
    pub async fn search(
        &self,
        term: &str,
        cancel: &CancelSignal,
    ) -> ScrapeResult<Vec<SearchResult>> {
        let url = self.search_url(term, chrono::Utc::now().timestamp())?;

        match self.search_inner(&url, cancel).await {
            Ok(results) => Ok(results),
            Err(ScrapeError::Cancelled) => {
                debug!("Search for \"{term}\": cancelled");
                Err(ScrapeError::Cancelled)
            }
            Err(err) => {
                self.report(&format!("Search for \"{term}\" failed"), &err);
                Ok(Vec::new())
            }
        }
    }

    async fn search_inner(
        &self,
        url: &Url,
        cancel: &CancelSignal,
    ) -> ScrapeResult<Vec<SearchResult>> {
        let document = self.fetcher.fetch(url, cancel).await?;
        let document = self.guard().resolve(document, cancel).await?;
        self.searches.extract(&document)
    }

    /// Log a failure and forward it to the notifier. Cancellation is quiet.
    fn report(&self, context: &str, err: &ScrapeError) {
        if matches!(err, ScrapeError::Cancelled) {
            debug!("{context}: cancelled");
            return;
        }
        error!("{context}: {err}");
        self.notifier.notify(Notification::from_error(context, err));
    }
}

impl std::fmt::Debug for Scraper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scraper")
            .field("config", &self.config)
            .field("fetcher", &self.fetcher)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scraper() -> ScrapeResult<Scraper> {
        Scraper::with_defaults(ScraperConfig::default(), CookieSet::new())
    }

    #[test]
    fn test_scraper_creation() {
        assert!(scraper().is_ok());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ScraperConfig::default().with_base_url("not a url");
        let result = Scraper::with_defaults(config, CookieSet::new());
        assert!(matches!(result, Err(ScrapeError::Config(_))));
    }

    #[test]
    fn test_page_url() {
        let url = scraper()
            .and_then(|s| s.page_url("1234"))
            .map(String::from)
            .unwrap_or_default();
        assert_eq!(url, "https://f95zone.to/threads/1234");
    }

    #[test]
    fn test_search_url() {
        let url = scraper()
            .and_then(|s| s.search_url("champions", 42))
            .map(String::from)
            .unwrap_or_default();
        assert_eq!(
            url,
            "https://f95zone.to/search/42/?q=champions&t=post&c[child_nodes]=1&c[nodes][0]=2&o=relevance&g=1"
        );
    }
}

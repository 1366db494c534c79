//! HTTP fetching of site pages.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE, LOCATION, USER_AGENT};
use reqwest::redirect::Policy;
use reqwest::Response;
use tracing::debug;
use url::Url;

use crate::scraping::cancel::CancelSignal;
use crate::scraping::config::ScraperConfig;
use crate::scraping::cookies::CookieSet;
use crate::scraping::dom::Document;
use crate::scraping::error::{ScrapeError, ScrapeResult};

/// Fetches pages with the configured cookies and returns parsed documents.
#[derive(Clone, Debug)]
pub struct DocumentFetcher {
    client: reqwest::Client,
    cookies: Arc<CookieSet>,
}

impl DocumentFetcher {
    /// Create a fetcher.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &ScraperConfig, cookies: Arc<CookieSet>) -> ScrapeResult<Self> {
        let client = Self::build_client(config)?;
        Ok(Self { client, cookies })
    }

    /// Build an HTTP client with the fixed client identifier.
    ///
    /// Redirects are not followed automatically; `fetch` follows one itself.
    fn build_client(config: &ScraperConfig) -> ScrapeResult<reqwest::Client> {
        let mut headers = HeaderMap::new();

        let ua = HeaderValue::from_str(&config.user_agent)
            .map_err(|e| ScrapeError::HttpClient(format!("invalid user agent: {e}")))?;
        headers.insert(USER_AGENT, ua);

        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .redirect(Policy::none())
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| ScrapeError::HttpClient(e.to_string()))
    }

    /// Cookies attached to every request.
    #[must_use]
    pub fn cookies(&self) -> &CookieSet {
        &self.cookies
    }

    /// GET `url` and parse the body.
    ///
    /// # Errors
    /// `FetchFailed` on a non-success status, `Cancelled` if `cancel` fires
    /// first, or the underlying transport error.
    pub async fn fetch(&self, url: &Url, cancel: &CancelSignal) -> ScrapeResult<Document> {
        // Bail out before touching the network
        if cancel.is_cancelled() {
            return Err(ScrapeError::Cancelled);
        }

        debug!(
            "Fetching {url} with {} cookie(s)",
            self.cookies.cookies_for(url).count()
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ScrapeError::Cancelled),
            fetched = self.fetch_source(url) => {
                let (final_url, body) = fetched?;
                Ok(Document::parse(final_url, body))
            }
        }
    }

    /// Fetch the body, following at most one redirect.
    async fn fetch_source(&self, url: &Url) -> ScrapeResult<(Url, String)> {
        // Make request
        let mut response = self.get(url).await?;

        // Follow a single redirect
        if response.status().is_redirection() {
            let target = redirect_target(url, &response)?;
            debug!("Following redirect {url} -> {target}");
            response = self.get(&target).await?;
        }

        // Check status
        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::FetchFailed {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let final_url = response.url().clone();
        let body = response.text().await?;
        Ok((final_url, body))
    }

    async fn get(&self, url: &Url) -> ScrapeResult<Response> {
        let mut request = self.client.get(url.clone());

        // Attach login cookies scoped to this URL
        if let Some(cookie_header) = self.cookies.header_for(url) {
            request = request.header(COOKIE, cookie_header);
        }
        Ok(request.send().await?)
    }
}

/// Resolve the `Location` of a redirect response against the request URL.
fn redirect_target(url: &Url, response: &Response) -> ScrapeResult<Url> {
    let status = response.status();
    let location = response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ScrapeError::FetchFailed {
            status: status.as_u16(),
            reason: "redirect without Location header".to_string(),
        })?;
    Ok(url.join(location)?)
}

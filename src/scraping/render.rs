//! Fallback renderer used to get past bot protection.
//!
//! The renderer is a real browser surface driven through a small contract:
//! open, receive cookies, navigate and wait for load, hand back the rendered
//! source, close. [`with_renderer`] is the only way the scraper acquires
//! one, and it always closes and drops it before returning.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use fantoccini::{Client, ClientBuilder};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};
use url::Url;

use crate::scraping::cancel::CancelSignal;
use crate::scraping::config::RendererSettings;
use crate::scraping::cookies::{Cookie, CookieSet};
use crate::scraping::error::{ScrapeError, ScrapeResult};

/// Boxed future type for renderer operations.
pub type RenderFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A browser surface able to render one page.
pub trait Renderer: Send {
    /// Start the surface.
    fn open<'a>(&'a mut self, settings: &'a RendererSettings) -> RenderFuture<'a, ScrapeResult<()>>;

    /// Install a cookie for `url` before navigating to it.
    fn set_cookie<'a>(
        &'a mut self,
        url: &'a Url,
        cookie: &'a Cookie,
        expires: DateTime<Utc>,
    ) -> RenderFuture<'a, ScrapeResult<()>>;

    /// Navigate and block until the page finished loading.
    fn navigate_and_wait<'a>(&'a mut self, url: &'a Url) -> RenderFuture<'a, ScrapeResult<()>>;

    /// Rendered HTML of the current page.
    fn page_source(&mut self) -> RenderFuture<'_, ScrapeResult<String>>;

    /// Close the surface. Must be safe to call on a surface that never opened.
    fn close(&mut self) -> RenderFuture<'_, ScrapeResult<()>>;
}

/// Creates a fresh renderer for each bypass attempt.
pub trait RendererFactory: Send + Sync {
    /// Create an unopened renderer.
    fn create(&self) -> Box<dyn Renderer>;
}

/// Render `url` in a freshly created renderer and return its HTML.
///
/// The renderer is closed and dropped on every exit path, including errors
/// and cancellation.
///
/// # Errors
/// `Cancelled` if `cancel` fires, otherwise any renderer failure.
pub async fn with_renderer(
    factory: &dyn RendererFactory,
    settings: &RendererSettings,
    url: &Url,
    cookies: &CookieSet,
    cancel: &CancelSignal,
) -> ScrapeResult<String> {
    let mut renderer = factory.create();

    let rendered = tokio::select! {
        biased;
        () = cancel.cancelled() => Err(ScrapeError::Cancelled),
        rendered = render_page(renderer.as_mut(), settings, url, cookies) => rendered,
    };

    if let Err(err) = renderer.close().await {
        warn!("Failed to close renderer: {err}");
    }
    drop(renderer);

    rendered
}

async fn render_page(
    renderer: &mut dyn Renderer,
    settings: &RendererSettings,
    url: &Url,
    cookies: &CookieSet,
) -> ScrapeResult<String> {
    renderer.open(settings).await?;

    let fallback = chrono::Duration::from_std(settings.cookie_fallback_ttl)
        .map_err(|e| ScrapeError::Config(format!("cookie_fallback_ttl out of range: {e}")))?;
    let now = Utc::now();
    for cookie in cookies.cookies_for(url) {
        renderer
            .set_cookie(url, cookie, cookie.expiry_or(now, fallback))
            .await?;
    }

    renderer.navigate_and_wait(url).await?;
    renderer.page_source().await
}

/// Renderer backed by a WebDriver session (ChromeDriver, geckodriver, ...).
#[derive(Default)]
pub struct WebDriverRenderer {
    client: Option<Client>,
    // Origin the session currently sits on; WebDriver only accepts cookies
    // for the current document's domain.
    origin: Option<String>,
}

impl WebDriverRenderer {
    /// Create an unopened renderer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self) -> ScrapeResult<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| ScrapeError::Render("renderer is not open".to_string()))
    }
}

impl std::fmt::Debug for WebDriverRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebDriverRenderer")
            .field("open", &self.client.is_some())
            .field("origin", &self.origin)
            .finish()
    }
}

impl Renderer for WebDriverRenderer {
    fn open<'a>(&'a mut self, settings: &'a RendererSettings) -> RenderFuture<'a, ScrapeResult<()>> {
        Box::pin(async move {
            let mut builder = ClientBuilder::native();
            builder.capabilities(capabilities(settings));
            let client = builder.connect(&settings.webdriver_url).await.map_err(|e| {
                ScrapeError::Render(format!(
                    "failed to start WebDriver session at {}: {e}",
                    settings.webdriver_url
                ))
            })?;

            if let Err(e) = client
                .set_window_size(settings.window_width, settings.window_height)
                .await
            {
                debug!("Could not resize renderer window: {e}");
            }

            self.client = Some(client);
            Ok(())
        })
    }

    fn set_cookie<'a>(
        &'a mut self,
        url: &'a Url,
        cookie: &'a Cookie,
        expires: DateTime<Utc>,
    ) -> RenderFuture<'a, ScrapeResult<()>> {
        Box::pin(async move {
            let origin = url.origin().ascii_serialization();
            if self.origin.as_deref() != Some(origin.as_str()) {
                self.client()?
                    .goto(&origin)
                    .await
                    .map_err(|e| ScrapeError::Render(format!("failed to open {origin}: {e}")))?;
                self.origin = Some(origin);
            }

            let raw = format!(
                "{}={}; Domain={}; Path={}; Expires={}",
                cookie.name,
                cookie.value,
                cookie.domain,
                cookie.path_or_root(),
                expires.format("%a, %d %b %Y %H:%M:%S GMT")
            );
            let parsed = fantoccini::cookies::Cookie::parse(raw)
                .map_err(|e| ScrapeError::Render(format!("invalid cookie {}: {e}", cookie.name)))?;

            self.client()?
                .add_cookie(parsed)
                .await
                .map_err(|e| ScrapeError::Render(format!("failed to set cookie {}: {e}", cookie.name)))
        })
    }

    fn navigate_and_wait<'a>(&'a mut self, url: &'a Url) -> RenderFuture<'a, ScrapeResult<()>> {
        Box::pin(async move {
            self.client()?
                .goto(url.as_str())
                .await
                .map_err(|e| ScrapeError::Render(format!("navigation to {url} failed: {e}")))?;
            self.origin = Some(url.origin().ascii_serialization());
            Ok(())
        })
    }

    fn page_source(&mut self) -> RenderFuture<'_, ScrapeResult<String>> {
        Box::pin(async move {
            self.client()?
                .source()
                .await
                .map_err(|e| ScrapeError::Render(format!("failed to read page source: {e}")))
        })
    }

    fn close(&mut self) -> RenderFuture<'_, ScrapeResult<()>> {
        Box::pin(async move {
            self.origin = None;
            match self.client.take() {
                Some(client) => client
                    .close()
                    .await
                    .map_err(|e| ScrapeError::Render(format!("failed to close session: {e}"))),
                None => Ok(()),
            }
        })
    }
}

/// Creates [`WebDriverRenderer`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct WebDriverRendererFactory;

impl RendererFactory for WebDriverRendererFactory {
    fn create(&self) -> Box<dyn Renderer> {
        Box::new(WebDriverRenderer::new())
    }
}

/// WebDriver capabilities for Chrome and Firefox drivers.
fn capabilities(settings: &RendererSettings) -> Map<String, Value> {
    let mut chrome_args = vec![
        format!("--user-agent={}", settings.user_agent),
        format!(
            "--window-size={},{}",
            settings.window_width, settings.window_height
        ),
    ];
    let mut firefox_args = Vec::new();
    if settings.headless {
        chrome_args.push("--headless=new".to_string());
        firefox_args.push("-headless".to_string());
    }

    let mut caps = Map::new();
    caps.insert("goog:chromeOptions".to_string(), json!({ "args": chrome_args }));
    caps.insert(
        "moz:firefoxOptions".to_string(),
        json!({
            "args": firefox_args,
            "prefs": {
                "general.useragent.override": settings.user_agent,
                "javascript.enabled": settings.javascript_enabled,
            }
        }),
    );
    caps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_headless() {
        let settings = RendererSettings {
            headless: true,
            ..RendererSettings::default()
        };
        let caps = capabilities(&settings);
        let chrome = caps
            .get("goog:chromeOptions")
            .map(ToString::to_string)
            .unwrap_or_default();
        assert!(chrome.contains("--headless=new"));
        assert!(chrome.contains("--user-agent=Playnite.Extensions"));
        assert!(chrome.contains("--window-size=900,700"));
    }

    #[test]
    fn test_capabilities_windowed() {
        let caps = capabilities(&RendererSettings::default());
        let chrome = caps
            .get("goog:chromeOptions")
            .map(ToString::to_string)
            .unwrap_or_default();
        assert!(!chrome.contains("headless"));
    }

    #[tokio::test]
    async fn test_close_unopened_renderer_is_ok() {
        let mut renderer = WebDriverRenderer::new();
        assert!(renderer.close().await.is_ok());
        assert!(renderer.page_source().await.is_err());
    }
}

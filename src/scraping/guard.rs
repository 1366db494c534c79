//! Bot-protection and login-failure detection with a one-shot bypass.

use tracing::{error, info, warn};

use crate::scraping::cancel::CancelSignal;
use crate::scraping::config::RendererSettings;
use crate::scraping::cookies::CookieSet;
use crate::scraping::dom::Document;
use crate::scraping::error::{ScrapeError, ScrapeResult};
use crate::scraping::render::{with_renderer, RendererFactory};

/// Class of the captcha widget on challenge pages.
pub const CAPTCHA_CLASS: &str = "ddg-captcha";
/// Phrases shown on challenge interstitials.
pub const CHALLENGE_PHRASES: [&str; 2] = [
    "Checking your browser before accessing",
    "looks too much like a bot request",
];
/// `<title>` of the protection page.
pub const GUARD_TITLE: &str = "ddos-guard";
/// Shown instead of content when the session is not logged in.
pub const LOGIN_REQUIRED_PHRASE: &str = "Sorry, you have to be";
/// Marker of the adware page the renderer sometimes lands on.
pub const ADWARE_SIGNATURE: &str = "AdGlareDisplayAd";

/// Why a document is considered blocked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockReason {
    /// Captcha widget present.
    Captcha,
    /// Challenge phrase present.
    ChallengePhrase,
    /// Protection page title.
    GuardTitle,
    /// Login wall.
    LoginRequired,
}

/// Outcome of inspecting a document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuardState {
    /// Real content.
    Clear,
    /// Protection or login wall.
    Blocked(BlockReason),
}

/// Inspect a document for protection or login signatures.
///
/// The login wall is checked first since it is never worth a bypass.
#[must_use]
pub fn inspect(document: &Document) -> GuardState {
    // Lowercase once; every phrase is matched against the same copy.
    let source = document.source().to_lowercase();

    if source.contains(&LOGIN_REQUIRED_PHRASE.to_lowercase()) {
        return GuardState::Blocked(BlockReason::LoginRequired);
    }
    if document.exists(&format!(".{CAPTCHA_CLASS}")) {
        return GuardState::Blocked(BlockReason::Captcha);
    }
    if CHALLENGE_PHRASES
        .iter()
        .any(|phrase| source.contains(&phrase.to_lowercase()))
    {
        return GuardState::Blocked(BlockReason::ChallengePhrase);
    }
    if document
        .title()
        .is_some_and(|title| title.eq_ignore_ascii_case(GUARD_TITLE))
    {
        return GuardState::Blocked(BlockReason::GuardTitle);
    }

    GuardState::Clear
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Clears fetched documents, escalating to the renderer at most once.
pub struct AntiBotGuard<'a> {
    factory: &'a dyn RendererFactory,
    settings: &'a RendererSettings,
    cookies: &'a CookieSet,
}

impl<'a> AntiBotGuard<'a> {
    /// Create a guard that bypasses through `factory`'s renderers.
    #[must_use]
    pub fn new(
        factory: &'a dyn RendererFactory,
        settings: &'a RendererSettings,
        cookies: &'a CookieSet,
    ) -> Self {
        Self {
            factory,
            settings,
            cookies,
        }
    }

    /// Return a document with real content, or the reason there is none.
    ///
    /// # Errors
    /// `AuthenticationFailed` on a login wall, `HostileRedirect` if the
    /// renderer lands on adware, `GuardPersists` if protection survives the
    /// bypass, plus renderer and cancellation errors.
    pub async fn resolve(&self, document: Document, cancel: &CancelSignal) -> ScrapeResult<Document> {
        if document.source().trim().is_empty() {
            error!("Document from {} is empty, scraping aborted", document.url());
            return Err(ScrapeError::EmptyDocument);
        }

        let url = match inspect(&document) {
            GuardState::Clear => return Ok(document),
            GuardState::Blocked(BlockReason::LoginRequired) => {
                error!("Login cookies invalid for {}, re-authentication required", document.url());
                return Err(ScrapeError::AuthenticationFailed);
            }
            GuardState::Blocked(reason) => {
                warn!(?reason, "Bot protection detected on {}, attempting bypass", document.url());
                document.url().clone()
            }
        };
        // The parsed tree is not Send; release it before suspending.
        drop(document);

        let rendered =
            with_renderer(self.factory, self.settings, &url, self.cookies, cancel).await?;

        if contains_ci(&rendered, ADWARE_SIGNATURE) {
            error!("Adware page rendered instead of {url}, scraping aborted");
            return Err(ScrapeError::HostileRedirect);
        }

        let document = Document::parse(url, rendered);
        match inspect(&document) {
            GuardState::Clear => {
                info!("Bypass succeeded for {}", document.url());
                Ok(document)
            }
            GuardState::Blocked(BlockReason::LoginRequired) => {
                error!("Login wall after bypass on {}", document.url());
                Err(ScrapeError::AuthenticationFailed)
            }
            GuardState::Blocked(reason) => {
                error!(?reason, "Bot protection still active after bypass on {}", document.url());
                Err(ScrapeError::GuardPersists)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;

    fn doc(html: &str) -> Document {
        let url = Url::parse("https://f95zone.to/threads/1").unwrap_or_else(|_| unreachable!());
        Document::parse(url, html)
    }

    #[test]
    fn test_clear_document() {
        let document = doc("<html><head><title>Some Game | F95zone</title></head><body><p>hi</p></body></html>");
        assert_eq!(inspect(&document), GuardState::Clear);
    }

    #[test]
    fn test_captcha_class() {
        let document = doc(r#"<div class="ddg-captcha"></div>"#);
        assert_eq!(inspect(&document), GuardState::Blocked(BlockReason::Captcha));
    }

    #[test]
    fn test_challenge_phrases() {
        let document = doc("<p>checking your browser before accessing f95zone.to</p>");
        assert_eq!(inspect(&document), GuardState::Blocked(BlockReason::ChallengePhrase));

        let document = doc("<p>Your request looks too much like a bot request.</p>");
        assert_eq!(inspect(&document), GuardState::Blocked(BlockReason::ChallengePhrase));
    }

    #[test]
    fn test_guard_title() {
        let document = doc("<html><head><title>DDoS-Guard</title></head><body></body></html>");
        assert_eq!(inspect(&document), GuardState::Blocked(BlockReason::GuardTitle));
    }

    #[test]
    fn test_phrases_match_in_any_case() {
        let document = doc("<p>SORRY, YOU HAVE TO BE logged in</p>");
        assert_eq!(inspect(&document), GuardState::Blocked(BlockReason::LoginRequired));

        let document = doc("<p>Looks Too Much Like A Bot Request</p>");
        assert_eq!(inspect(&document), GuardState::Blocked(BlockReason::ChallengePhrase));
    }

    #[test]
    fn test_login_wall_wins() {
        let document = doc(r#"<div class="ddg-captcha"></div><p>Sorry, you have to be logged in</p>"#);
        assert_eq!(inspect(&document), GuardState::Blocked(BlockReason::LoginRequired));
    }
}

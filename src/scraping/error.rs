//! Error types for the scraping module.

use thiserror::Error;

/// Errors that can occur while fetching, guarding or extracting a page.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The site answered with a non-success status.
    #[error("request failed with status {status}: {reason}")]
    FetchFailed {
        /// HTTP status code.
        status: u16,
        /// Canonical reason phrase, or a short description.
        reason: String,
    },

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// The site asked for a login; the stored cookies are stale or missing.
    #[error("login cookies are invalid or expired")]
    AuthenticationFailed,

    /// Bot protection was still active after the bypass attempt.
    #[error("bot protection still active after bypass")]
    GuardPersists,

    /// The renderer landed on an adware page instead of the target.
    #[error("renderer was redirected to an adware page")]
    HostileRedirect,

    /// A single field could not be extracted. Never escapes the extractor.
    #[error("could not extract {field}: {reason}")]
    ExtractionIncomplete {
        /// Name of the field being extracted.
        field: &'static str,
        /// What was missing.
        reason: String,
    },

    /// The fetched body was empty.
    #[error("document is empty")]
    EmptyDocument,

    /// An element did not have the expected tag.
    #[error("expected <{expected}> element, found <{found}>")]
    UnexpectedElement {
        /// Tag name the caller asked for.
        expected: &'static str,
        /// Tag name actually present.
        found: String,
    },

    /// HTML or selector parsing error.
    #[error("HTML parsing error: {0}")]
    HtmlParse(String),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// HTTP client configuration error.
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The fallback renderer failed.
    #[error("renderer error: {0}")]
    Render(String),

    /// Regex error.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

/// Convenience result alias for scraping operations.
pub type ScrapeResult<T> = Result<T, ScrapeError>;

impl ScrapeError {
    /// Check if this error ends the operation with no automatic recovery.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed | Self::GuardPersists | Self::HostileRedirect
        )
    }

    /// Short title used for user-facing notifications.
    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self {
            Self::FetchFailed { .. } | Self::HttpRequest(_) | Self::EmptyDocument => {
                "Scraping Error"
            }
            Self::Cancelled => "Cancelled",
            Self::AuthenticationFailed => "Login Failed",
            Self::GuardPersists => "Bot Protection Detected",
            Self::HostileRedirect => "Adware Redirect Detected",
            Self::Render(_) => "Bypass Error",
            Self::Config(_) | Self::HttpClient(_) | Self::InvalidUrl(_) => "Configuration Error",
            _ => "Scraping Error",
        }
    }

    /// Suggested remedy shown next to the error.
    #[must_use]
    pub const fn remedy(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "Please re-authenticate and update your cookies.",
            Self::GuardPersists => "Try again later or use a different network.",
            Self::Config(_) | Self::HttpClient(_) | Self::InvalidUrl(_) => {
                "Check the scraper configuration."
            }
            Self::Cancelled => "",
            _ => "Please try again later.",
        }
    }

    /// Build a field-level extraction failure.
    pub(crate) fn missing(field: &'static str, reason: impl Into<String>) -> Self {
        Self::ExtractionIncomplete {
            field,
            reason: reason.into(),
        }
    }
}

//! Parsed documents and narrowed element views.

use html5ever::driver::{self, ParseOpts};
use html5ever::tendril::TendrilSink;
use html5ever::tree_builder::TreeBuilderOpts;
use scraper::{ElementRef, Html, HtmlTreeSink, Selector};
use url::Url;

use crate::scraping::error::{ScrapeError, ScrapeResult};

/// Compile a CSS selector.
///
/// # Errors
/// Returns an error if the selector is invalid.
pub fn selector(css: &str) -> ScrapeResult<Selector> {
    Selector::parse(css).map_err(|e| ScrapeError::HtmlParse(format!("Invalid selector {css}: {e:?}")))
}

/// Concatenated text content of an element.
#[must_use]
pub fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

/// Nearest ancestor that is an element.
#[must_use]
pub fn parent_element(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element.parent().and_then(ElementRef::wrap)
}

/// Whether an element has the given tag name (case-insensitive).
#[must_use]
pub fn is_tag(element: ElementRef<'_>, tag: &str) -> bool {
    element.value().name().eq_ignore_ascii_case(tag)
}

/// Narrow an element to a tag, failing when it is something else.
fn narrow<'a>(element: ElementRef<'a>, expected: &'static str) -> ScrapeResult<ElementRef<'a>> {
    if is_tag(element, expected) {
        Ok(element)
    } else {
        Err(ScrapeError::UnexpectedElement {
            expected,
            found: element.value().name().to_string(),
        })
    }
}

/// Parse a document the way a browser with scripting disabled would.
///
/// `<noscript>` content becomes real elements instead of raw text, so
/// lazy-loaded images wrapped in it stay selectable.
fn parse_without_scripting(source: &str) -> Html {
    let opts = ParseOpts {
        tree_builder: TreeBuilderOpts {
            scripting_enabled: false,
            ..TreeBuilderOpts::default()
        },
        ..ParseOpts::default()
    };
    driver::parse_document(HtmlTreeSink::new(Html::new_document()), opts).one(source)
}

/// An HTML document together with its source and location.
pub struct Document {
    url: Url,
    source: String,
    html: Html,
}

impl Document {
    /// Parse `source` as an HTML document fetched from `url`.
    #[must_use]
    pub fn parse(url: Url, source: impl Into<String>) -> Self {
        let source = source.into();
        let html = parse_without_scripting(&source);
        Self { url, source, html }
    }

    /// Where the document came from.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Raw source text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parsed tree.
    #[must_use]
    pub const fn html(&self) -> &Html {
        &self.html
    }

    /// Text of the `<title>` element, trimmed.
    #[must_use]
    pub fn title(&self) -> Option<String> {
        self.select_first("title")
            .ok()
            .flatten()
            .map(|title| text_of(title).trim().to_string())
    }

    /// First element matching `css`.
    ///
    /// # Errors
    /// Returns an error if the selector is invalid.
    pub fn select_first(&self, css: &str) -> ScrapeResult<Option<ElementRef<'_>>> {
        let selector = selector(css)?;
        Ok(self.html.select(&selector).next())
    }

    /// All elements matching `css`, in document order.
    ///
    /// # Errors
    /// Returns an error if the selector is invalid.
    pub fn select_all(&self, css: &str) -> ScrapeResult<Vec<ElementRef<'_>>> {
        let selector = selector(css)?;
        Ok(self.html.select(&selector).collect())
    }

    /// Whether any element matches `css`.
    #[must_use]
    pub fn exists(&self, css: &str) -> bool {
        matches!(self.select_first(css), Ok(Some(_)))
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("url", &self.url.as_str())
            .field("len", &self.source.len())
            .finish_non_exhaustive()
    }
}

/// `<a>` element.
#[derive(Clone, Copy, Debug)]
pub struct Anchor<'a>(ElementRef<'a>);

impl<'a> Anchor<'a> {
    /// Raw `href` attribute.
    #[must_use]
    pub fn href(&self) -> Option<&'a str> {
        self.0.value().attr("href")
    }

    /// Text content.
    #[must_use]
    pub fn text(&self) -> String {
        text_of(self.0)
    }
}

impl<'a> TryFrom<ElementRef<'a>> for Anchor<'a> {
    type Error = ScrapeError;

    fn try_from(element: ElementRef<'a>) -> ScrapeResult<Self> {
        narrow(element, "a").map(Self)
    }
}

/// `<img>` element.
#[derive(Clone, Copy, Debug)]
pub struct Image<'a>(ElementRef<'a>);

impl<'a> Image<'a> {
    /// `src` attribute.
    #[must_use]
    pub fn src(&self) -> Option<&'a str> {
        self.0.value().attr("src")
    }

    /// Lazy-load source (`data-src`).
    #[must_use]
    pub fn data_src(&self) -> Option<&'a str> {
        self.0.value().attr("data-src")
    }

    /// The element itself, for ancestor traversal.
    #[must_use]
    pub const fn element(&self) -> ElementRef<'a> {
        self.0
    }
}

impl<'a> TryFrom<ElementRef<'a>> for Image<'a> {
    type Error = ScrapeError;

    fn try_from(element: ElementRef<'a>) -> ScrapeResult<Self> {
        narrow(element, "img").map(Self)
    }
}

/// `<select>` element.
#[derive(Clone, Copy, Debug)]
pub struct Select<'a>(ElementRef<'a>);

impl<'a> Select<'a> {
    /// Value of a `data-*` attribute, looked up case-insensitively.
    #[must_use]
    pub fn data(&self, key: &str) -> Option<&'a str> {
        let wanted = format!("data-{key}");
        self.0
            .value()
            .attrs()
            .find(|(name, _)| name.eq_ignore_ascii_case(&wanted))
            .map(|(_, value)| value)
    }
}

impl<'a> TryFrom<ElementRef<'a>> for Select<'a> {
    type Error = ScrapeError;

    fn try_from(element: ElementRef<'a>) -> ScrapeResult<Self> {
        narrow(element, "select").map(Self)
    }
}

/// `<meta>` element.
#[derive(Clone, Copy, Debug)]
pub struct Meta<'a>(ElementRef<'a>);

impl<'a> Meta<'a> {
    /// `property` attribute.
    #[must_use]
    pub fn property(&self) -> Option<&'a str> {
        self.0.value().attr("property")
    }

    /// `content` attribute.
    #[must_use]
    pub fn content(&self) -> Option<&'a str> {
        self.0.value().attr("content")
    }
}

impl<'a> TryFrom<ElementRef<'a>> for Meta<'a> {
    type Error = ScrapeError;

    fn try_from(element: ElementRef<'a>) -> ScrapeResult<Self> {
        narrow(element, "meta").map(Self)
    }
}

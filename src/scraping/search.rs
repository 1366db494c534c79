//! Search result extraction.

use tracing::{debug, warn};
use url::Url;

use crate::scraping::dom::{selector, Anchor, Document};
use crate::scraping::error::{ScrapeError, ScrapeResult};
use crate::scraping::grammar::extract_search_result_name;
use crate::scraping::types::SearchResult;

const ROW_SELECTOR: &str = "li.block-row[data-author]";
const TITLE_SELECTOR: &str = ".contentRow-title";

/// Build the search URL for `term` at unix timestamp `ts`.
///
/// # Errors
/// Returns an error if `search_url` is not a valid URL.
pub fn build_search_url(search_url: &str, term: &str, ts: i64) -> ScrapeResult<Url> {
    let base = if search_url.ends_with('/') {
        search_url.to_string()
    } else {
        format!("{search_url}/")
    };
    let url = format!(
        "{base}{ts}/?q={}&t=post&c[child_nodes]=1&c[nodes][0]=2&o=relevance&g=1",
        urlencoding::encode(term)
    );
    Ok(Url::parse(&url)?)
}

/// Extracts `(name, link)` rows from a search results page.
#[derive(Clone, Debug)]
pub struct SearchExtractor {
    origin: Url,
}

impl SearchExtractor {
    /// Create an extractor resolving relative links against `origin`.
    #[must_use]
    pub const fn new(origin: Url) -> Self {
        Self { origin }
    }

    /// Extract every result row in document order.
    ///
    /// # Errors
    /// Returns an error only if a selector fails to compile.
    pub fn extract(&self, document: &Document) -> ScrapeResult<Vec<SearchResult>> {
        let title_selector = selector(TITLE_SELECTOR)?;
        let mut results = Vec::new();

        for row in document.select_all(ROW_SELECTOR)? {
            let Some(title) = row.select(&title_selector).next() else {
                continue;
            };

            // Only a direct child anchor carries the thread link.
            let Some(anchor) = title
                .children()
                .filter_map(scraper::ElementRef::wrap)
                .find_map(|child| Anchor::try_from(child).ok())
            else {
                continue;
            };

            let Some(href) = anchor.href().map(str::trim).filter(|href| !href.is_empty()) else {
                continue;
            };

            let link = match self.resolve(href) {
                Ok(link) => link,
                Err(err) => {
                    warn!("Skipping search result with unusable link `{href}`: {err}");
                    continue;
                }
            };

            let text = anchor.text();
            results.push(SearchResult {
                link,
                name: extract_search_result_name(text.trim()),
            });
        }

        debug!("Extracted {} search result(s)", results.len());
        Ok(results)
    }

    fn resolve(&self, href: &str) -> ScrapeResult<String> {
        self.origin
            .join(href)
            .map(String::from)
            .map_err(ScrapeError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("https://f95zone.to/").unwrap_or_else(|_| unreachable!())
    }

    fn extract(html: &str) -> Vec<SearchResult> {
        let document = Document::parse(origin(), html);
        SearchExtractor::new(origin())
            .extract(&document)
            .unwrap_or_default()
    }

    #[test]
    fn test_build_search_url() {
        let url = build_search_url("https://f95zone.to/search/", "corruption of", 1_700_000_000)
            .map(String::from)
            .unwrap_or_default();
        assert!(url.starts_with("https://f95zone.to/search/1700000000/?q=corruption%20of&t=post"));
        assert!(url.ends_with("&o=relevance&g=1"));
    }

    #[test]
    fn test_build_search_url_without_trailing_slash() {
        let url = build_search_url("http://127.0.0.1:8080/search", "a&b", 1)
            .map(String::from)
            .unwrap_or_default();
        assert!(url.starts_with("http://127.0.0.1:8080/search/1/?q=a%26b&"));
    }

    #[test]
    fn test_extract_rows() {
        let results = extract(
            r#"<ol>
            <li class="block-row" data-author="fenoxo">
                <h3 class="contentRow-title"><a href="/threads/corruption-of-champions.1234/">[Flash] [Completed] Corruption of Champions [Fenoxo]</a></h3>
            </li>
            <li class="block-row">
                <h3 class="contentRow-title"><a href="/threads/no-author.1/">No Author</a></h3>
            </li>
            <li class="block-row" data-author="x">
                <h3 class="contentRow-title"><span><a href="/threads/nested.2/">Nested</a></span></h3>
            </li>
            <li class="block-row" data-author="y">
                <h3 class="contentRow-title"><a href="  ">Blank</a></h3>
            </li>
            <li class="block-row" data-author="z">
                <h3 class="contentRow-title"><a href="https://f95zone.to/threads/other.99/">  Other Game  </a></h3>
            </li>
            </ol>"#,
        );

        assert_eq!(
            results,
            vec![
                SearchResult {
                    link: "https://f95zone.to/threads/corruption-of-champions.1234/".to_string(),
                    name: "Corruption of Champions".to_string(),
                },
                SearchResult {
                    link: "https://f95zone.to/threads/other.99/".to_string(),
                    name: "Other Game".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_no_rows() {
        assert!(extract("<html><body><p>No results.</p></body></html>").is_empty());
    }
}

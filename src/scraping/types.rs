//! Core types for scraping results.

use serde::{Deserialize, Serialize};

use crate::scraping::grammar::thread_id_from_link;

/// Description used when a page has none.
pub const NO_DESCRIPTION: &str = "No description.";

/// Metadata scraped from one thread page.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PageResult {
    /// Identifier the page was fetched with.
    pub id: String,
    /// Item name.
    pub name: Option<String>,
    /// Version string.
    pub version: Option<String>,
    /// Developer or publisher.
    pub developer: Option<String>,
    /// Description text, never blank.
    pub description: String,
    /// Prefix labels on the title (status markers, engines).
    pub labels: Option<Vec<String>>,
    /// Title-cased tags.
    pub tags: Option<Vec<String>>,
    /// Rating in [0, 5]; NaN when unknown.
    #[serde(with = "nan_as_null")]
    pub rating: f64,
    /// Absolute image URLs, cover first.
    pub images: Option<Vec<String>>,
    /// Related links, unique by URL.
    pub links: Vec<PageLink>,
}

impl PageResult {
    /// Create an empty result for `id`.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            version: None,
            developer: None,
            description: NO_DESCRIPTION.to_string(),
            labels: None,
            tags: None,
            rating: f64::NAN,
            images: None,
            links: Vec::new(),
        }
    }

    /// Whether a rating was found.
    #[must_use]
    pub fn has_rating(&self) -> bool {
        !self.rating.is_nan()
    }
}

/// A named link found in the first post.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLink {
    /// Display name.
    pub name: String,
    /// Target URL.
    pub url: String,
}

impl PageLink {
    /// Create a link.
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// A single search hit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Absolute thread URL.
    pub link: String,
    /// Title with bracket groups removed.
    pub name: String,
}

impl SearchResult {
    /// Item id of this hit, if the link is a thread under `base_url`.
    #[must_use]
    pub fn thread_id(&self, base_url: &str) -> Option<String> {
        thread_id_from_link(&self.link, base_url)
    }
}

/// Serde module mapping NaN to `null` and back.
mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if value.is_nan() {
            serializer.serialize_none()
        } else {
            serializer.serialize_some(value)
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}

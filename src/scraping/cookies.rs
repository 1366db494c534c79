//! Cookies attached to outbound requests and replicated into the renderer.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::scraping::error::ScrapeResult;

/// A single site cookie.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
    /// Domain the cookie belongs to. A leading dot is ignored.
    pub domain: String,
    /// Path scope, `/` when absent.
    #[serde(default)]
    pub path: Option<String>,
    /// Expiry; absent for session cookies.
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
}

impl Cookie {
    /// Create a cookie scoped to the whole domain.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: None,
            expires: None,
        }
    }

    /// Set the path scope.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the expiry.
    #[must_use]
    pub const fn with_expires(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    /// Path scope, defaulting to `/`.
    #[must_use]
    pub fn path_or_root(&self) -> &str {
        match self.path.as_deref() {
            Some(path) if !path.trim().is_empty() => path,
            _ => "/",
        }
    }

    /// Expiry to hand to the renderer. Missing or epoch expiries are
    /// pushed forward by `fallback`.
    #[must_use]
    pub fn expiry_or(&self, now: DateTime<Utc>, fallback: Duration) -> DateTime<Utc> {
        match self.expires {
            Some(expires) if expires.timestamp() > 0 => expires,
            _ => now + fallback,
        }
    }

    /// Whether this cookie would be sent to `url`.
    #[must_use]
    pub fn matches(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let domain = self.domain.trim_start_matches('.');
        if domain.is_empty() {
            return false;
        }

        let host_matches = host.eq_ignore_ascii_case(domain)
            || host
                .to_ascii_lowercase()
                .ends_with(&format!(".{}", domain.to_ascii_lowercase()));

        host_matches && path_matches(url.path(), self.path_or_root())
    }
}

/// Path-prefix match that stops at a segment boundary, so `/threads`
/// covers `/threads/1` but not `/threadsX`.
fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    match request_path.strip_prefix(cookie_path) {
        Some(rest) => rest.is_empty() || cookie_path.ends_with('/') || rest.starts_with('/'),
        None => false,
    }
}

/// Ordered set of cookies, unique by `(name, domain, path)`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CookieSet {
    cookies: Vec<Cookie>,
}

impl CookieSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON array of cookies.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn from_file(path: impl AsRef<Path>) -> ScrapeResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Parse a JSON array of cookies.
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed.
    pub fn from_json(json: &str) -> ScrapeResult<Self> {
        let cookies: Vec<Cookie> = serde_json::from_str(json)?;
        Ok(cookies.into_iter().collect())
    }

    /// Insert a cookie, replacing one with the same name, domain and path.
    pub fn insert(&mut self, cookie: Cookie) {
        let existing = self.cookies.iter_mut().find(|c| {
            c.name == cookie.name
                && c.domain.eq_ignore_ascii_case(&cookie.domain)
                && c.path_or_root() == cookie.path_or_root()
        });
        match existing {
            Some(slot) => *slot = cookie,
            None => self.cookies.push(cookie),
        }
    }

    /// Number of cookies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Cookie> {
        self.cookies.iter()
    }

    /// Cookies that apply to `url`, in insertion order.
    pub fn cookies_for<'a>(&'a self, url: &'a Url) -> impl Iterator<Item = &'a Cookie> + 'a {
        self.cookies.iter().filter(move |c| c.matches(url))
    }

    /// `Cookie` header value for `url`, if any cookie applies.
    #[must_use]
    pub fn header_for(&self, url: &Url) -> Option<String> {
        let pairs: Vec<String> = self
            .cookies_for(url)
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();
        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }
}

impl FromIterator<Cookie> for CookieSet {
    fn from_iter<I: IntoIterator<Item = Cookie>>(iter: I) -> Self {
        let mut set = Self::new();
        for cookie in iter {
            set.insert(cookie);
        }
        set
    }
}

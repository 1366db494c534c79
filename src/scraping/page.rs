//! Thread page extraction.
//!
//! Every field has its own rule. A rule that cannot find its element logs a
//! warning and leaves the field absent; it never aborts the extraction.

use std::collections::HashSet;

use regex::Regex;
use scraper::ElementRef;
use tracing::{debug, warn};
use url::Url;

use crate::scraping::config::ScraperConfig;
use crate::scraping::dom::{
    is_tag, parent_element, selector, text_of, Anchor, Document, Image, Meta, Select,
};
use crate::scraping::error::{ScrapeError, ScrapeResult};
use crate::scraping::grammar::{breakdown_title, title_case, TitleParts};
use crate::scraping::rating::{in_range, parse_leading_rating, parse_rating};
use crate::scraping::types::{PageLink, PageResult};

const DESCRIPTION_SELECTOR: &str = ".bbWrapper > div:nth-child(1)";
const TITLE_SELECTOR: &str = ".p-title-value";
const LABEL_SELECTOR: &str = ".labelLink";
const TAG_SELECTOR: &str = "a.tagItem";
const RATING_SELECTOR: &str = r#"[name="rating"]"#;
const RATING_BADGE_SELECTOR: &str = ".bratr-rating";
const MESSAGE_BODY_SELECTOR: &str = ".message-body";
const HEAD_META_SELECTOR: &str = "head meta";
const LINK_SELECTOR: &str = ".message-threadStarterPost div.bbWrapper > a";

/// Boilerplate headings stripped from descriptions.
const DESCRIPTION_MARKERS: [&str; 2] = ["Overview:", "Spoiler:"];
/// Link names that say nothing about the target.
const VAGUE_LINK_NAMES: [&str; 3] = ["Here", "Link", "This"];

/// Extracts a [`PageResult`] from a cleared thread page.
#[derive(Clone, Debug)]
pub struct PageExtractor {
    attachment_prefix: String,
    cover_prefix: String,
}

impl PageExtractor {
    /// Create an extractor using the configured image prefixes.
    #[must_use]
    pub fn new(config: &ScraperConfig) -> Self {
        Self {
            attachment_prefix: config.attachment_prefix.clone(),
            cover_prefix: config.cover_prefix.clone(),
        }
    }

    /// Run every rule against `document`.
    #[must_use]
    pub fn extract(&self, document: &Document, id: &str) -> PageResult {
        let mut result = PageResult::new(id);

        match extract_description(document) {
            Ok(description) => result.description = description,
            Err(err) => warn!(page = id, "{err}, using fallback"),
        }

        match extract_title(document) {
            Ok((labels, parts)) => {
                result.labels = labels;
                result.name = parts.name;
                result.version = parts.version;
                result.developer = parts.developer;
            }
            Err(err) => warn!(page = id, "{err}"),
        }

        match extract_tags(document) {
            Ok(tags) => result.tags = Some(tags),
            Err(err) => warn!(page = id, "{err}"),
        }

        match extract_rating(document) {
            Ok(rating) => result.rating = rating,
            Err(err) => warn!(page = id, "{err}"),
        }

        match self.extract_images(document) {
            Ok(images) => result.images = Some(images),
            Err(err) => warn!(page = id, "{err}"),
        }

        match self.extract_cover(document) {
            Ok(cover) => result.images.get_or_insert_with(Vec::new).insert(0, cover),
            Err(err) => warn!(page = id, "{err}"),
        }

        match extract_links(document) {
            Ok(links) => result.links = links,
            Err(err) => warn!(page = id, "{err}"),
        }

        debug!(
            page = id,
            tags = result.tags.as_ref().map_or(0, Vec::len),
            images = result.images.as_ref().map_or(0, Vec::len),
            links = result.links.len(),
            "Extracted page"
        );

        result
    }

    /// Attachment images in the first message body.
    fn extract_images(&self, document: &Document) -> ScrapeResult<Vec<String>> {
        let body = document
            .select_first(MESSAGE_BODY_SELECTOR)?
            .ok_or_else(|| ScrapeError::missing("images", "no `.message-body` element"))?;

        let img_selector = selector("img")?;
        let mut images = Vec::new();

        for element in body.select(&img_selector) {
            let image = Image::try_from(element)?;

            // Skip smilies, avatars and external hotlinks
            let Some(source) = self.attachment_source(&image) else {
                continue;
            };

            // Thumbnails link to the full-size attachment.
            let full_size = enclosing_anchor(image.element())
                .and_then(|anchor| anchor.href())
                .filter(|href| starts_with_ci(href, &self.attachment_prefix));

            images.push(full_size.unwrap_or(source).to_string());
        }

        if images.is_empty() {
            return Err(ScrapeError::missing(
                "images",
                "no attachment images in the first post",
            ));
        }
        Ok(images)
    }

    fn attachment_source<'a>(&self, image: &Image<'a>) -> Option<&'a str> {
        [image.src(), image.data_src()]
            .into_iter()
            .flatten()
            .find(|source| starts_with_ci(source, &self.attachment_prefix))
    }

    /// Open Graph cover image.
    fn extract_cover(&self, document: &Document) -> ScrapeResult<String> {
        let meta = document
            .select_all(HEAD_META_SELECTOR)?
            .into_iter()
            .filter_map(|element| Meta::try_from(element).ok())
            .find(|meta| meta.property() == Some("og:image"))
            .ok_or_else(|| ScrapeError::missing("cover", "no `og:image` meta tag"))?;

        let content = meta
            .content()
            .map(str::trim)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| ScrapeError::missing("cover", "`og:image` has no content"))?;

        if starts_with_ci(content, &self.cover_prefix) {
            Ok(content.to_string())
        } else {
            Err(ScrapeError::missing(
                "cover",
                format!("`{content}` is not a cover image"),
            ))
        }
    }
}

/// First child of the post wrapper, minus boilerplate headings.
fn extract_description(document: &Document) -> ScrapeResult<String> {
    let element = document.select_first(DESCRIPTION_SELECTOR)?.ok_or_else(|| {
        ScrapeError::missing("description", "no `.bbWrapper > div:nth-child(1)` element")
    })?;

    let mut text = text_of(element);
    for marker in DESCRIPTION_MARKERS {
        text = text.replace(marker, "");
    }

    let text = text.trim();
    if text.is_empty() {
        return Err(ScrapeError::missing("description", "description block is blank"));
    }
    Ok(text.to_string())
}

/// Prefix labels and the parsed remainder of the title.
fn extract_title(document: &Document) -> ScrapeResult<(Option<Vec<String>>, TitleParts)> {
    let title_element = document
        .select_first(TITLE_SELECTOR)?
        .ok_or_else(|| ScrapeError::missing("title", "no `.p-title-value` element"))?;

    let label_selector = selector(LABEL_SELECTOR)?;
    let labels: Vec<String> = title_element
        .select(&label_selector)
        .map(|label| text_of(label).trim().to_string())
        .filter(|label| !label.is_empty())
        .collect();

    let full_title = text_of(title_element);
    let full_title = full_title.trim();
    let title = match labels.last() {
        Some(last) => strip_through_label(full_title, last),
        None => full_title,
    };

    let labels = if labels.is_empty() { None } else { Some(labels) };
    Ok((labels, breakdown_title(title)))
}

/// Drop everything up to and including `label`, matched case-insensitively.
fn strip_through_label<'t>(title: &'t str, label: &str) -> &'t str {
    let needle: Vec<char> = label.chars().flat_map(char::to_lowercase).collect();
    if needle.is_empty() {
        return title;
    }

    // Fold char by char so offsets stay valid in `title` even when
    // lowercasing changes the byte length.
    for (start, _) in title.char_indices() {
        let mut folded = Vec::with_capacity(needle.len());
        let mut end = start;
        for (offset, c) in title[start..].char_indices() {
            if folded.len() >= needle.len() {
                break;
            }
            folded.extend(c.to_lowercase());
            end = start + offset + c.len_utf8();
        }
        if folded == needle {
            return title[end..].trim();
        }
    }
    title
}

/// Tag anchors, stripped of markup and title-cased.
fn extract_tags(document: &Document) -> ScrapeResult<Vec<String>> {
    let elements = document.select_all(TAG_SELECTOR)?;
    if elements.is_empty() {
        return Err(ScrapeError::missing("tags", "no `a.tagItem` elements"));
    }

    let markup = Regex::new("<.*?>")?;
    let tags: Vec<String> = elements
        .into_iter()
        .map(text_of)
        .map(|tag| markup.replace_all(&tag, "").trim().to_string())
        .filter(|tag| !tag.is_empty())
        .map(|tag| title_case(&tag))
        .collect();

    if tags.is_empty() {
        return Err(ScrapeError::missing("tags", "every tag element was blank"));
    }
    Ok(tags)
}

/// Rating from the rating form, falling back to the rating badge.
fn extract_rating(document: &Document) -> ScrapeResult<f64> {
    match rating_from_select(document) {
        Ok(rating) => return Ok(rating),
        Err(err) => warn!("{err}, trying rating badge; make sure you are logged in"),
    }
    rating_from_badge(document)
}

fn rating_from_select(document: &Document) -> ScrapeResult<f64> {
    let select = document
        .select_all(RATING_SELECTOR)?
        .into_iter()
        .find_map(|element| Select::try_from(element).ok())
        .ok_or_else(|| ScrapeError::missing("rating", "no `select[name=rating]` element"))?;

    let raw = select
        .data("initial-rating")
        .ok_or_else(|| ScrapeError::missing("rating", "rating select has no `data-initial-rating`"))?;

    let rating = parse_rating(raw).ok_or_else(|| {
        ScrapeError::missing("rating", format!("cannot parse `{raw}` as a number"))
    })?;
    checked_rating(rating)
}

fn rating_from_badge(document: &Document) -> ScrapeResult<f64> {
    let badge = document
        .select_first(RATING_BADGE_SELECTOR)?
        .ok_or_else(|| ScrapeError::missing("rating", "no `.bratr-rating` element"))?;

    let title = badge
        .value()
        .attr("title")
        .ok_or_else(|| ScrapeError::missing("rating", "rating badge has no `title` attribute"))?;

    let rating = parse_leading_rating(title).ok_or_else(|| {
        ScrapeError::missing("rating", format!("cannot convert `{title}` to a rating"))
    })?;
    checked_rating(rating)
}

fn checked_rating(rating: f64) -> ScrapeResult<f64> {
    if in_range(rating) {
        Ok(rating)
    } else {
        Err(ScrapeError::missing(
            "rating",
            format!("{rating} is outside the 0-5 range"),
        ))
    }
}

/// Anchor wrapping an image directly or through a `<noscript>`.
fn enclosing_anchor(element: ElementRef<'_>) -> Option<Anchor<'_>> {
    let parent = parent_element(element)?;
    let candidate = if is_tag(parent, "noscript") {
        parent_element(parent)?
    } else {
        parent
    };
    Anchor::try_from(candidate).ok()
}

/// Named links of the first post, unique by URL, with friendlier names.
fn extract_links(document: &Document) -> ScrapeResult<Vec<PageLink>> {
    let anchors = document.select_all(LINK_SELECTOR)?;
    if anchors.is_empty() {
        return Err(ScrapeError::missing("links", "no links in the first post"));
    }

    // First occurrence of each URL wins
    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for element in anchors {
        let anchor = Anchor::try_from(element)?;
        let Some(url) = anchor.href().map(str::trim).filter(|url| !url.is_empty()) else {
            continue;
        };
        let name = anchor.text();
        let name = name.trim();
        if name.is_empty() || !seen.insert(url.to_lowercase()) {
            continue;
        }
        links.push(PageLink::new(name, url));
    }

    // Rename once the final order is known
    let mut related = 0;
    for link in &mut links {
        link.name = normalize_link_name(&link.name, &link.url, &mut related);
    }

    Ok(links)
}

/// Rename links whose text is the bare URL or a vague word.
///
/// `related` counts the `Related Info #N` names handed out so far.
#[must_use]
pub fn normalize_link_name(name: &str, url: &str, related: &mut usize) -> String {
    let mut name = name.to_string();

    if name.eq_ignore_ascii_case(url) {
        if let Some(host_name) = host_label(url) {
            name = host_name;
        }
    }

    if name.eq_ignore_ascii_case("Website") {
        name = "Official Website".to_string();
    }

    if VAGUE_LINK_NAMES
        .iter()
        .any(|vague| name.eq_ignore_ascii_case(vague))
    {
        *related += 1;
        name = format!("Related Info #{related}");
    }

    if name.chars().next().is_some_and(char::is_lowercase) {
        name = title_case(&name);
    }

    name
}

/// Title-cased second-to-last host label (`www.patreon.com` -> `Patreon`).
fn host_label(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    let labels: Vec<&str> = host.split('.').collect();
    let label = if labels.len() >= 2 {
        labels[labels.len() - 2]
    } else {
        host
    };
    Some(title_case(label))
}

fn starts_with_ci(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(html: &str) -> PageResult {
        let url = Url::parse("https://f95zone.to/threads/1").unwrap_or_else(|_| unreachable!());
        let document = Document::parse(url, html);
        PageExtractor::new(&ScraperConfig::default()).extract(&document, "1")
    }

    #[test]
    fn test_empty_page_uses_defaults() {
        let result = extract("<html><body></body></html>");
        assert_eq!(result.id, "1");
        assert_eq!(result.description, "No description.");
        assert!(result.name.is_none());
        assert!(result.labels.is_none());
        assert!(result.tags.is_none());
        assert!(result.rating.is_nan());
        assert!(result.images.is_none());
        assert!(result.links.is_empty());
    }

    #[test]
    fn test_description_strips_markers() {
        let result = extract(
            r#"<div class="bbWrapper"><div>Overview: A game about things. Spoiler:</div><div>other</div></div>"#,
        );
        assert_eq!(result.description, "A game about things.");
    }

    #[test]
    fn test_blank_description_falls_back() {
        let result = extract(r#"<div class="bbWrapper"><div>  Overview:  </div></div>"#);
        assert_eq!(result.description, "No description.");
    }

    #[test]
    fn test_title_with_labels() {
        let result = extract(
            r#"<h1 class="p-title-value"><a class="labelLink"><span>Ren'Py</span></a><a class="labelLink"><span>Completed</span></a> Corrupted Kingdoms [v0.12.8] [ArcGames]</h1>"#,
        );
        assert_eq!(
            result.labels,
            Some(vec!["Ren'Py".to_string(), "Completed".to_string()])
        );
        assert_eq!(result.name.as_deref(), Some("Corrupted Kingdoms"));
        assert_eq!(result.version.as_deref(), Some("v0.12.8"));
        assert_eq!(result.developer.as_deref(), Some("ArcGames"));
    }

    #[test]
    fn test_title_without_labels() {
        let result = extract(r#"<h1 class="p-title-value">Just A Name</h1>"#);
        assert!(result.labels.is_none());
        assert_eq!(result.name.as_deref(), Some("Just A Name"));
        assert!(result.version.is_none());
    }

    #[test]
    fn test_tags_title_cased() {
        let result = extract(
            r#"<a class="tagItem">3dcg</a><a class="tagItem">male protagonist</a><a class="tagItem">   </a><span class="tagItem">ignored</span>"#,
        );
        assert_eq!(
            result.tags,
            Some(vec!["3dcg".to_string(), "Male Protagonist".to_string()])
        );
    }

    #[test]
    fn test_blank_tags_are_absent() {
        let result = extract(r#"<a class="tagItem"> </a>"#);
        assert!(result.tags.is_none());
    }

    #[test]
    fn test_rating_from_select() {
        let result = extract(
            r#"<select name="rating" data-initial-rating="4.25"></select><span class="bratr-rating" title="1.00 star(s)"></span>"#,
        );
        assert!((result.rating - 4.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rating_from_badge() {
        let result = extract(r#"<span class="bratr-rating" title="4.50 star(s)"></span>"#);
        assert!((result.rating - 4.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rating_ignores_non_select_named_rating() {
        let result = extract(
            r#"<input name="rating" data-initial-rating="2"><span class="bratr-rating" title="3.00 star(s)"></span>"#,
        );
        assert!((result.rating - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rating_out_of_range_is_unknown() {
        let result = extract(r#"<select name="rating" data-initial-rating="9"></select>"#);
        assert!(result.rating.is_nan());
    }

    #[test]
    fn test_images_prefer_full_size_anchor() {
        let result = extract(
            r#"<div class="message-body">
                <a href="https://attachments.f95zone.to/full/1.png"><img src="https://attachments.f95zone.to/thumb/1.png"></a>
                <a href="https://example.com/elsewhere"><img src="https://attachments.f95zone.to/thumb/2.png"></a>
                <img src="https://attachments.f95zone.to/3.png">
                <img src="https://example.com/not-an-attachment.png">
                <img src="data:image/gif;base64,R0lGOD" data-src="https://attachments.f95zone.to/4.png">
            </div>"#,
        );
        assert_eq!(
            result.images,
            Some(vec![
                "https://attachments.f95zone.to/full/1.png".to_string(),
                "https://attachments.f95zone.to/thumb/2.png".to_string(),
                "https://attachments.f95zone.to/3.png".to_string(),
                "https://attachments.f95zone.to/4.png".to_string(),
            ])
        );
    }

    #[test]
    fn test_cover_prepended() {
        let result = extract(
            r#"<html><head><meta property="og:image" content="https://f95zone.to/data/covers/1.jpg"></head>
            <body><div class="message-body"><img src="https://attachments.f95zone.to/a.png"></div></body></html>"#,
        );
        assert_eq!(
            result.images,
            Some(vec![
                "https://f95zone.to/data/covers/1.jpg".to_string(),
                "https://attachments.f95zone.to/a.png".to_string(),
            ])
        );
    }

    #[test]
    fn test_cover_creates_image_list() {
        let result = extract(
            r#"<html><head><meta property="og:image" content="https://f95zone.to/data/covers/2.jpg"></head><body></body></html>"#,
        );
        assert_eq!(
            result.images,
            Some(vec!["https://f95zone.to/data/covers/2.jpg".to_string()])
        );
    }

    #[test]
    fn test_non_cover_og_image_ignored() {
        let result = extract(
            r#"<html><head><meta property="og:image" content="https://f95zone.to/styles/logo.png"></head><body></body></html>"#,
        );
        assert!(result.images.is_none());
    }

    #[test]
    fn test_links_deduplicated_and_renamed() {
        let result = extract(
            r#"<article class="message-threadStarterPost"><div class="bbWrapper">
                <a href="https://www.patreon.com/dev">https://www.patreon.com/dev</a>
                <a href="https://dev.example.com">Website</a>
                <a href="HTTPS://WWW.PATREON.COM/dev ">Patreon again</a>
                <a href="https://a.com/1">here</a>
                <a href="https://a.com/2">Link</a>
                <a href="https://a.com/3">discord server</a>
                <a href="https://a.com/4">   </a>
                <a href="">Empty</a>
            </div></article>"#,
        );
        let names: Vec<&str> = result.links.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Patreon",
                "Official Website",
                "Related Info #1",
                "Related Info #2",
                "Discord Server"
            ]
        );

        let mut urls: Vec<String> = result.links.iter().map(|l| l.url.to_lowercase()).collect();
        urls.sort();
        urls.dedup();
        assert_eq!(urls.len(), result.links.len());
    }

    #[test]
    fn test_normalize_link_name_single_label_host() {
        let mut related = 0;
        assert_eq!(
            normalize_link_name("http://localhost/x", "http://localhost/x", &mut related),
            "Localhost"
        );
        assert_eq!(related, 0);
    }

    #[test]
    fn test_strip_through_label() {
        assert_eq!(strip_through_label("RenPy Game [v1]", "renpy"), "Game [v1]");
        assert_eq!(strip_through_label("Game [v1]", "Unity"), "Game [v1]");
    }

    #[test]
    fn test_strip_through_non_ascii_label() {
        assert_eq!(strip_through_label("ÉTÉ Summer Days [v2]", "été"), "Summer Days [v2]");
        assert_eq!(strip_through_label("Straße Game", "STRASSE"), "Straße Game");
    }

    #[test]
    fn test_noscript_wrapped_image_prefers_full_size_anchor() {
        let result = extract(
            r#"<div class="message-body"><a href="https://attachments.f95zone.to/full/9.png"><noscript><img src="https://attachments.f95zone.to/thumb/9.png"></noscript></a></div>"#,
        );
        assert_eq!(
            result.images,
            Some(vec!["https://attachments.f95zone.to/full/9.png".to_string()])
        );
    }
}

//! Title grammar: `Name [Version] [Developer]`, search titles and casing.

use serde::{Deserialize, Serialize};

/// Components of a thread title.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleParts {
    /// Item name, the text before the first bracket group.
    pub name: Option<String>,
    /// Contents of the first bracket group.
    pub version: Option<String>,
    /// Contents of the second bracket group.
    pub developer: Option<String>,
}

/// Break a title like `"Corrupted Kingdoms [v0.12.8] [ArcGames]"` into its parts.
///
/// The name is the text before the first `[` minus the one separator
/// character expected there. The developer group is only looked for after a
/// version group. Components that trim to nothing are reported as absent.
#[must_use]
pub fn breakdown_title(title: &str) -> TitleParts {
    let title = title.trim();
    if title.is_empty() {
        return TitleParts::default();
    }

    let Some((start, end)) = find_group(title) else {
        return TitleParts {
            name: Some(title.to_string()),
            ..TitleParts::default()
        };
    };

    let rest = &title[end + 1..];
    let developer = find_group(rest).and_then(|(s, e)| non_empty(&rest[s + 1..e]));

    TitleParts {
        name: non_empty(drop_last_char(&title[..start])),
        version: non_empty(&title[start + 1..end]),
        developer,
    }
}

/// Strip every bracket group from a search result title.
///
/// `"[Flash] [Completed] Corruption of Champions [Fenoxo]"` becomes
/// `"Corruption of Champions"`. Titles without a group are returned as-is.
#[must_use]
pub fn extract_search_result_name(title: &str) -> String {
    let mut current = title.trim().to_string();
    if find_group(&current).is_none() {
        return title.to_string();
    }

    while let Some((start, end)) = find_group(&current) {
        current = if start == 0 {
            current[end + 1..].trim().to_string()
        } else {
            join_words(current[..start].trim(), current[end + 1..].trim())
        };
    }

    current
}

/// Invariant title casing: first letter of each word upper, rest lower.
///
/// Words that are entirely uppercase are treated as acronyms and kept.
#[must_use]
pub fn title_case(input: &str) -> String {
    input
        .split(' ')
        .map(|word| {
            let has_letters = word.chars().any(char::is_alphabetic);
            let all_upper = word
                .chars()
                .filter(|c| c.is_alphabetic())
                .all(char::is_uppercase);
            if has_letters && all_upper {
                return word.to_string();
            }

            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Recover an item id from a thread link such as
/// `https://f95zone.to/threads/some-game.12345/`.
///
/// Returns `None` if the link is not under `base_url`.
#[must_use]
pub fn thread_id_from_link(link: &str, base_url: &str) -> Option<String> {
    let prefix = link.get(..base_url.len())?;
    if !prefix.eq_ignore_ascii_case(base_url) {
        return None;
    }

    let rest = &link[base_url.len()..];
    let rest = rest.strip_suffix('/').unwrap_or(rest);
    let id = rest.split_once('.').map_or(rest, |(_, id)| id);
    non_empty(id)
}

/// Locate the first `[` and the first `]` after it.
fn find_group(s: &str) -> Option<(usize, usize)> {
    let start = s.find('[')?;
    let end = start + s[start..].find(']')?;
    Some((start, end))
}

fn drop_last_char(s: &str) -> &str {
    s.char_indices().last().map_or(s, |(index, _)| &s[..index])
}

fn join_words(left: &str, right: &str) -> String {
    match (left.is_empty(), right.is_empty()) {
        (true, _) => right.to_string(),
        (_, true) => left.to_string(),
        _ => format!("{left} {right}"),
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

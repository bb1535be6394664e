//! Header, cookie and meta-tag extraction for signature matching.

use reqwest::header::HeaderMap;
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::sync::LazyLock;

static META_SELECTOR: LazyLock<Option<Selector>> = LazyLock::new(|| {
    Selector::parse("meta[name][content]")
        .map_err(|e| log::error!("Failed to parse meta selector: {e}"))
        .ok()
});

/// Extracts cookies from `Set-Cookie` response headers.
///
/// Cookie names and values are lower-cased.
pub(crate) fn extract_cookies_from_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|hv| hv.to_str().ok())
        .filter_map(|cookie_str| {
            cookie_str.split(';').next().and_then(|pair| {
                let mut parts = pair.splitn(2, '=');
                match (parts.next(), parts.next()) {
                    (Some(name), Some(value)) if !name.trim().is_empty() => {
                        Some((name.trim().to_lowercase(), value.trim().to_lowercase()))
                    }
                    _ => None,
                }
            })
        })
        .collect()
}

/// Converts HTTP headers to a lowercase map for pattern matching.
///
/// Repeated headers are joined with `, `.
pub(crate) fn normalize_headers_to_map(headers: &HeaderMap) -> HashMap<String, String> {
    let mut map: HashMap<String, String> = HashMap::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else {
            continue;
        };
        let value = value.to_lowercase();
        map.entry(name.as_str().to_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    map
}

/// Returns the normalized content of every `<meta name="generator">` tag.
pub(crate) fn extract_meta_generators(html: &str) -> Vec<String> {
    let Some(selector) = META_SELECTOR.as_ref() else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    document
        .select(selector)
        .filter(|element| {
            element
                .value()
                .attr("name")
                .is_some_and(|name| name.trim().eq_ignore_ascii_case("generator"))
        })
        .filter_map(|element| element.value().attr("content"))
        .map(normalize_generator)
        .filter(|content| !content.is_empty())
        .collect()
}

/// Normalizes a generator string for comparison.
///
/// Lower-cases, treats `-` and `_` as spaces, and collapses whitespace, so
/// `shoplike-engine` and `ShopLike  Engine v3` compare as `shoplike engine`.
pub fn normalize_generator(value: &str) -> String {
    value
        .to_lowercase()
        .replace(['-', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

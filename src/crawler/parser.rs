//! HTML helpers shared by the extractors
//!
//! Everything here is synchronous. `scraper::Html` is not `Send`, so callers
//! parse and extract inside a plain function and only hold owned results
//! across an `.await`.

use regex::Regex;
use scraper::{ElementRef, Selector};
use std::sync::LazyLock;
use url::Url;

static BACKGROUND_IMAGE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"background-image\s*:\s*url\(\s*['"]?([^'")]+?)['"]?\s*\)"#)
        .expect("background-image regex is valid")
});

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only links
/// - Non-HTTP(S) URLs after resolution
pub fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
        Some(absolute_url.to_string())
    } else {
        None
    }
}

/// Extracts the URL of an inline `background-image: url(...)` declaration
pub fn background_image_url(style: &str, base_url: &Url) -> Option<String> {
    let captures = BACKGROUND_IMAGE_PATTERN.captures(style)?;
    resolve_link(captures.get(1)?.as_str(), base_url)
}

/// Returns the element's text with runs of whitespace collapsed
pub fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Returns the first descendant matching `css`
pub fn select_first<'a>(scope: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    let found = scope.select(&selector).next();
    found
}

/// Returns every descendant matching `css`, in document order
pub fn select_all<'a>(scope: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => scope.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

/// Returns the first match of the first selector in `candidates` that matches
///
/// Candidates are tried in order of preference, so a later, looser selector
/// is only consulted when every earlier one misses.
pub fn select_preferred<'a>(scope: ElementRef<'a>, candidates: &[&str]) -> Option<ElementRef<'a>> {
    candidates.iter().find_map(|css| select_first(scope, css))
}

/// Returns every match of the first selector in `candidates` with any match
pub fn select_all_preferred<'a>(scope: ElementRef<'a>, candidates: &[&str]) -> Vec<ElementRef<'a>> {
    candidates
        .iter()
        .map(|css| select_all(scope, css))
        .find(|matches| !matches.is_empty())
        .unwrap_or_default()
}

/// Resolved `attr` of the element, if present and linkable
pub fn resolved_attr(element: ElementRef<'_>, attr: &str, base_url: &Url) -> Option<String> {
    resolve_link(element.value().attr(attr)?, base_url)
}

/// Resolved background image of the element's inline style
pub fn resolved_background(element: ElementRef<'_>, base_url: &Url) -> Option<String> {
    background_image_url(element.value().attr("style")?, base_url)
}

//! Permissive HTML helpers over `scraper`
//!
//! Malformed markup never fails a parse; a missing element is `None`.

use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Parses a selector, `None` when it is invalid
fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// First element matching `css`
pub fn select_first<'a>(document: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let selector = selector(css)?;
    document.select(&selector).next()
}

/// All elements matching `css`, in document order
pub fn select_all<'a>(document: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match selector(css) {
        Some(selector) => document.select(&selector).collect(),
        None => Vec::new(),
    }
}

/// First element matching `css` below `element`
pub fn select_within<'a>(element: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let selector = selector(css)?;
    element.select(&selector).next()
}

/// Trimmed text of an element, `None` when blank
pub fn element_text(element: ElementRef<'_>) -> Option<String> {
    let text = element.text().collect::<String>().trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Trimmed text of the first element matching `css`
pub fn select_text(document: &Html, css: &str) -> Option<String> {
    select_first(document, css).and_then(element_text)
}

/// Attribute value of the first element matching `css`
pub fn select_attr(document: &Html, css: &str, attr: &str) -> Option<String> {
    select_first(document, css)
        .and_then(|element| element.value().attr(attr))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Number of direct child elements, the section length proxy
pub fn child_element_count(element: ElementRef<'_>) -> usize {
    element
        .children()
        .filter(|child| child.value().is_element())
        .count()
}

/// Resolves an href against the page it was found on
///
/// Returns `None` for blank, fragment-only and non-HTTP(S) links.
pub fn resolve_link(href: &str, base_url: &str) -> Option<String> {
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

    let base = Url::parse(base_url).ok()?;
    match base.join(href) {
        Ok(absolute_url) => {
            if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
                Some(absolute_url.to_string())
            } else {
                None
            }
        }
        Err(_) => None,
    }
}

/// Last non-empty path segment of a URL, ignoring query and fragment
pub fn last_path_segment(url: &str) -> Option<String> {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let without_query = without_fragment.split('?').next().unwrap_or(without_fragment);
    without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

/// Leading decimal digits of `text`, `None` when there are none
pub fn leading_number(text: &str) -> Option<i64> {
    let digits: String = text.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Trailing decimal digits of `text`, `None` when there are none
pub fn trailing_number(text: &str) -> Option<i64> {
    let digits: String = text
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits.parse().ok()
}

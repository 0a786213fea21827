//! Text normalization shared by providers and deduplication.

use regex::Regex;
use scraper::Html;
use std::sync::OnceLock;

/// Normalize a title for use as a dedup key: lowercase, punctuation
/// stripped, whitespace collapsed, trimmed.
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strip JATS/HTML markup from an abstract, returning plain text.
///
/// CrossRef ships abstracts as JATS fragments (`<jats:p>`, `<jats:italic>`)
/// and some providers embed plain HTML; both parse as HTML fragments.
pub fn strip_markup(text: &str) -> String {
    if !text.contains('<') {
        return text.trim().to_string();
    }

    let fragment = Html::parse_fragment(text);
    let stripped = fragment
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ");

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether a string parses as an http(s) URL.
///
/// Provider payloads occasionally carry ftp or scheme-less landing pages;
/// those lose their place in the URL preference order.
pub fn is_http_url(candidate: &str) -> bool {
    url::Url::parse(candidate)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Extract the first DOI found in a string (resolver URLs included).
pub fn extract_doi(text: &str) -> Option<String> {
    static DOI_RE: OnceLock<Regex> = OnceLock::new();
    let re = DOI_RE.get_or_init(|| {
        Regex::new(r"10\.\d{4,9}/[-._;()/:a-zA-Z0-9]+").expect("DOI pattern is valid")
    });
    re.find(text).map(|m| m.as_str().to_string())
}

/// Clamp an outgoing query to `max_len` characters on a char boundary.
pub fn clamp_query(query: &str, max_len: usize) -> String {
    let query = query.trim();
    if query.chars().count() <= max_len {
        return query.to_string();
    }
    query.chars().take(max_len).collect::<String>().trim_end().to_string()
}

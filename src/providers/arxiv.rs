//! arXiv search provider implementation.

use async_trait::async_trait;
use chrono::Datelike;
use feed_rs::parser;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use crate::models::{Author, Paper, PaperBuilder};
use crate::providers::{
    ConcurrencyConfig, Provider, ProviderCapabilities, ProviderError, MAX_QUERY_LEN,
};
use crate::utils::{clamp_query, extract_doi};

const ARXIV_API_BASE: &str = "http://export.arxiv.org/api";

/// arXiv search provider
///
/// Uses the arXiv Atom API. arXiv asks automated clients to stay around one
/// request every three seconds, which the declared budget reflects.
#[derive(Debug, Clone)]
pub struct ArxivProvider {
    client: Arc<Client>,
    base_url: String,
}

impl ArxivProvider {
    /// Create a new arXiv provider
    pub fn new() -> Self {
        Self {
            client: Arc::new(
                Client::builder()
                    .user_agent(concat!(
                        env!("CARGO_PKG_NAME"),
                        "/",
                        env!("CARGO_PKG_VERSION")
                    ))
                    .timeout(Duration::from_secs(15))
                    .build()
                    .expect("Failed to create HTTP client"),
            ),
            base_url: ARXIV_API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    fn with_base_url(base_url: impl Into<String>) -> Self {
        let mut provider = Self::new();
        provider.base_url = base_url.into();
        provider
    }

    /// Extract the bare arXiv ID from an Atom entry ID URL
    ///
    /// `http://arxiv.org/abs/2301.12345v2` becomes `2301.12345`.
    fn parse_id(entry_id: &str) -> String {
        let id = match entry_id.find("/abs/") {
            Some(pos) => &entry_id[pos + 5..],
            None => entry_id,
        };
        // Strip the version suffix; the numeric ID may itself contain 'v'
        // only as a version marker after the dot segment.
        match id.rfind('v') {
            Some(pos) if id[pos + 1..].chars().all(|c| c.is_ascii_digit()) && pos > 0 => {
                id[..pos].to_string()
            }
            _ => id.to_string(),
        }
    }

    fn parse_feed(body: &[u8]) -> Result<Vec<Paper>, ProviderError> {
        let feed = parser::parse(body)
            .map_err(|e| ProviderError::Parse(format!("arXiv Atom feed: {e}")))?;

        let papers = feed
            .entries
            .into_iter()
            .filter_map(|entry| {
                // arXiv wraps long titles/abstracts with hard newlines
                let title = entry
                    .title
                    .as_ref()
                    .map(|t| t.content.split_whitespace().collect::<Vec<_>>().join(" "))?;
                if title.is_empty() {
                    return None;
                }

                let external_id = Self::parse_id(&entry.id);

                let authors = entry
                    .authors
                    .iter()
                    .map(|p| Author::new(p.name.clone()))
                    .collect::<Vec<_>>();

                let url = entry
                    .links
                    .iter()
                    .find(|l| l.rel.as_deref() == Some("alternate"))
                    .map(|l| l.href.clone())
                    .unwrap_or_else(|| entry.id.clone());

                let abstract_text = entry
                    .summary
                    .as_ref()
                    .map(|s| s.content.split_whitespace().collect::<Vec<_>>().join(" "))
                    .unwrap_or_default();

                // Entries carry a DOI only as a resolver link
                let doi = entry
                    .links
                    .iter()
                    .find(|l| l.href.contains("doi.org"))
                    .and_then(|l| extract_doi(&l.href))
                    .unwrap_or_default();

                Some(
                    PaperBuilder::new(external_id, title, url, "arxiv")
                        .authors(authors)
                        .abstract_text(abstract_text)
                        .doi(doi)
                        .maybe_year(entry.published.map(|d| d.year()))
                        .build(),
                )
            })
            .collect();

        Ok(papers)
    }
}

impl Default for ArxivProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for ArxivProvider {
    fn id(&self) -> &str {
        "arxiv"
    }

    fn name(&self) -> &str {
        "arXiv"
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::SEARCH
    }

    fn concurrency(&self) -> ConcurrencyConfig {
        ConcurrencyConfig::new(1, 0.34)
    }

    /// The arXiv query grammar reserves Lucene operator characters; strip
    /// them rather than let the API reject the request.
    fn sanitize_query(&self, query: &str) -> String {
        let stripped: String = query
            .chars()
            .map(|c| match c {
                '"' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '~' | ':' | '\\' => ' ',
                _ => c,
            })
            .collect();
        clamp_query(
            &stripped.split_whitespace().collect::<Vec<_>>().join(" "),
            MAX_QUERY_LEN,
        )
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Paper>, ProviderError> {
        let url = format!(
            "{}/query?search_query=all:{}&start=0&max_results={}",
            self.base_url,
            urlencoding::encode(query),
            limit.clamp(1, 100)
        );

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::status(
                status.as_u16(),
                format!("arXiv search failed for '{query}'"),
            ));
        }

        let body = response.bytes().await?;
        Self::parse_feed(&body)
    }
}

//! OpenAlex search provider implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::models::{Author, Paper, PaperBuilder};
use crate::providers::{
    ConcurrencyConfig, Provider, ProviderCapabilities, ProviderError,
};
use crate::utils::is_http_url;

const OPENALEX_API_BASE: &str = "https://api.openalex.org";

/// OpenAlex search provider
///
/// Uses the OpenAlex REST API. Supplying a `mailto` address joins the
/// polite pool with a higher rate tier; without one the provider throttles
/// itself down.
#[derive(Debug, Clone)]
pub struct OpenAlexProvider {
    client: Arc<Client>,
    base_url: String,
    mailto: Option<String>,
}

impl OpenAlexProvider {
    /// Create a new OpenAlex provider
    pub fn new(mailto: Option<String>) -> Self {
        let user_agent = match &mailto {
            Some(email) => format!(
                "{}/{} (mailto:{})",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION"),
                email
            ),
            None => format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        };

        if mailto.is_none() {
            warn!(
                "no OpenAlex mailto configured; staying out of the polite pool at a reduced request rate"
            );
        }

        Self {
            client: Arc::new(
                Client::builder()
                    .user_agent(user_agent)
                    .timeout(Duration::from_secs(15))
                    .build()
                    .expect("Failed to create HTTP client"),
            ),
            base_url: OPENALEX_API_BASE.to_string(),
            mailto,
        }
    }

    #[cfg(test)]
    fn with_base_url(mailto: Option<String>, base_url: impl Into<String>) -> Self {
        let mut provider = Self::new(mailto);
        provider.base_url = base_url.into();
        provider
    }

    /// Add mailto to a request URL if configured (polite pool)
    fn add_mailto_if_present(&self, url: &str) -> String {
        if let Some(ref email) = self.mailto {
            let sep = if url.contains('?') { '&' } else { '?' };
            format!("{}{}mailto={}", url, sep, urlencoding::encode(email))
        } else {
            url.to_string()
        }
    }

    fn parse_paper(&self, work: OAWork) -> Option<Paper> {
        let title = work.display_name?;
        if title.is_empty() {
            return None;
        }

        let external_id = work.id.clone()?;

        let authors = work
            .authorships
            .iter()
            .filter_map(|a| {
                let name = a.author.display_name.clone()?;
                Some(match a.author.id.clone() {
                    Some(id) => Author::with_id(name, id),
                    None => Author::new(name),
                })
            })
            .collect::<Vec<_>>();

        // Landing page first, then open-access URL, then the API URL
        let url = work
            .primary_location
            .as_ref()
            .and_then(|l| l.landing_page_url.clone())
            .filter(|u| is_http_url(u))
            .or_else(|| {
                work.open_access
                    .as_ref()
                    .and_then(|oa| oa.oa_url.clone())
                    .filter(|u| is_http_url(u))
            })
            .unwrap_or_else(|| external_id.clone());

        let venue = work
            .primary_location
            .as_ref()
            .and_then(|l| l.source.as_ref())
            .and_then(|s| s.display_name.clone())
            .unwrap_or_default();

        let abstract_text = work
            .abstract_inverted_index
            .map(|index| reconstruct_abstract(&index))
            .unwrap_or_default();

        Some(
            PaperBuilder::new(external_id, title, url, "openalex")
                .authors(authors)
                .abstract_text(abstract_text)
                .doi(normalize_doi(work.doi.as_deref()))
                .maybe_year(work.publication_year)
                .venue(venue)
                .citation_count(work.cited_by_count.unwrap_or(0).max(0) as u32)
                .build(),
        )
    }
}

/// Rebuild an abstract from OpenAlex's inverted-index form.
///
/// The index maps each word to the positions it occupies; sorting the
/// (position, word) pairs ascending and joining with spaces restores the
/// original text.
fn reconstruct_abstract(index: &HashMap<String, Vec<u32>>) -> String {
    let mut positioned: Vec<(u32, &str)> = index
        .iter()
        .flat_map(|(word, positions)| positions.iter().map(move |&p| (p, word.as_str())))
        .collect();
    positioned.sort_by_key(|&(p, _)| p);
    positioned
        .into_iter()
        .map(|(_, word)| word)
        .collect::<Vec<_>>()
        .join(" ")
}

/// OpenAlex reports DOIs as full `https://doi.org/...` URLs.
fn normalize_doi(doi: Option<&str>) -> String {
    doi.map(|d| {
        d.trim_start_matches("https://doi.org/")
            .trim_start_matches("http://doi.org/")
            .to_string()
    })
    .unwrap_or_default()
}

#[async_trait]
impl Provider for OpenAlexProvider {
    fn id(&self) -> &str {
        "openalex"
    }

    fn name(&self) -> &str {
        "OpenAlex"
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::SEARCH | ProviderCapabilities::DOI_LOOKUP
    }

    fn concurrency(&self) -> ConcurrencyConfig {
        // Polite pool tolerates ~10 req/s; anonymous traffic gets a much
        // smaller share.
        if self.mailto.is_some() {
            ConcurrencyConfig::new(4, 10.0)
        } else {
            ConcurrencyConfig::new(2, 1.0)
        }
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Paper>, ProviderError> {
        let url = format!(
            "{}/works?search={}&per-page={}",
            self.base_url,
            urlencoding::encode(query),
            limit.clamp(1, 200)
        );
        let url = self.add_mailto_if_present(&url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::status(
                status.as_u16(),
                format!("OpenAlex search failed for '{query}'"),
            ));
        }

        let data: OAWorksResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("OpenAlex works response: {e}")))?;

        Ok(data
            .results
            .into_iter()
            .filter_map(|w| self.parse_paper(w))
            .collect())
    }

    async fn lookup_doi(&self, doi: &str) -> Result<Option<Paper>, ProviderError> {
        let url = format!(
            "{}/works/doi:{}",
            self.base_url,
            urlencoding::encode(doi)
        );
        let url = self.add_mailto_if_present(&url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ProviderError::status(
                status.as_u16(),
                format!("OpenAlex DOI lookup failed for '{doi}'"),
            ));
        }

        let work: OAWork = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("OpenAlex work response: {e}")))?;

        Ok(self.parse_paper(work))
    }
}

// ===== OpenAlex API Types =====

#[derive(Debug, Deserialize)]
struct OAWorksResponse {
    #[serde(default)]
    results: Vec<OAWork>,
}

#[derive(Debug, Deserialize)]
struct OAWork {
    id: Option<String>,
    display_name: Option<String>,
    doi: Option<String>,
    publication_year: Option<i32>,
    cited_by_count: Option<i64>,
    #[serde(default)]
    authorships: Vec<OAAuthorship>,
    abstract_inverted_index: Option<HashMap<String, Vec<u32>>>,
    primary_location: Option<OALocation>,
    open_access: Option<OAOpenAccess>,
}

#[derive(Debug, Deserialize)]
struct OAAuthorship {
    author: OAAuthor,
}

#[derive(Debug, Deserialize)]
struct OAAuthor {
    id: Option<String>,
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OALocation {
    landing_page_url: Option<String>,
    source: Option<OASource>,
}

#[derive(Debug, Deserialize)]
struct OASource {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OAOpenAccess {
    oa_url: Option<String>,
}

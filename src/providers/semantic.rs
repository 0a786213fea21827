//! Semantic Scholar search provider implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::models::{Author, Paper, PaperBuilder};
use crate::providers::{
    ConcurrencyConfig, Provider, ProviderCapabilities, ProviderError,
};
use crate::utils::{with_retry, RetryConfig};

const SEMANTIC_API_BASE: &str = "https://api.semanticscholar.org/graph/v1";

const PAPER_FIELDS: &str =
    "externalIds,title,abstract,year,venue,citationCount,url,openAccessPdf,authors";

/// Semantic Scholar search provider
///
/// Uses the Semantic Scholar Graph API. The public tier rate-limits
/// aggressively, so searches retry 429/5xx responses with exponential
/// backoff before giving up.
#[derive(Debug, Clone)]
pub struct SemanticScholarProvider {
    client: Arc<Client>,
    base_url: String,
    api_key: Option<String>,
}

impl SemanticScholarProvider {
    /// Create a new Semantic Scholar provider
    pub fn new(api_key: Option<String>) -> Self {
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
            base_url: SEMANTIC_API_BASE.to_string(),
            api_key,
        }
    }

    #[cfg(test)]
    fn with_base_url(api_key: Option<String>, base_url: impl Into<String>) -> Self {
        let mut provider = Self::new(api_key);
        provider.base_url = base_url.into();
        provider
    }

    /// Add API key header when configured (higher rate tier)
    fn add_api_key_if_present(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(ref key) = self.api_key {
            builder.header("x-api-key", key)
        } else {
            builder
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        context: &str,
    ) -> Result<T, ProviderError> {
        let response = self
            .add_api_key_if_present(self.client.get(url))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::status(
                status.as_u16(),
                format!("Semantic Scholar {context} failed"),
            ));
        }
        response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("Semantic Scholar {context} response: {e}")))
    }

    fn parse_paper(data: S2Paper) -> Option<Paper> {
        let title = data.title.clone()?;
        if title.is_empty() {
            return None;
        }
        let external_id = data.paper_id.clone()?;

        let doi = data
            .external_ids
            .as_ref()
            .and_then(|ids| ids.doi.clone())
            .unwrap_or_default();

        let authors = data
            .authors
            .iter()
            .filter_map(|a| {
                let name = a.name.clone()?;
                Some(match a.author_id.clone() {
                    Some(id) => Author::with_id(name, id),
                    None => Author::new(name),
                })
            })
            .collect::<Vec<_>>();

        // Landing page, open-access PDF, then the S2 canonical page
        let url = data
            .url
            .clone()
            .or_else(|| data.open_access_pdf.as_ref().and_then(|p| p.url.clone()))
            .unwrap_or_else(|| format!("https://www.semanticscholar.org/paper/{external_id}"));

        Some(
            PaperBuilder::new(external_id, title, url, "semantic")
                .authors(authors)
                .abstract_text(data.abstract_text.clone().unwrap_or_default())
                .doi(doi)
                .maybe_year(data.year)
                .venue(data.venue.clone().unwrap_or_default())
                .citation_count(data.citation_count.unwrap_or(0).max(0) as u32)
                .build(),
        )
    }
}

#[async_trait]
impl Provider for SemanticScholarProvider {
    fn id(&self) -> &str {
        "semantic"
    }

    fn name(&self) -> &str {
        "Semantic Scholar"
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::SEARCH
            | ProviderCapabilities::DOI_LOOKUP
            | ProviderCapabilities::ENRICHMENT
    }

    fn concurrency(&self) -> ConcurrencyConfig {
        // The public tier allows ~1 req/s; an API key raises it
        if self.api_key.is_some() {
            ConcurrencyConfig::new(3, 5.0)
        } else {
            ConcurrencyConfig::new(1, 0.9)
        }
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Paper>, ProviderError> {
        let url = format!(
            "{}/paper/search?query={}&limit={}&fields={}",
            self.base_url,
            urlencoding::encode(query),
            limit.clamp(1, 100),
            PAPER_FIELDS
        );

        let data: S2SearchResponse = with_retry(RetryConfig::default(), || {
            self.get_json(&url, "search")
        })
        .await?;

        Ok(data
            .data
            .into_iter()
            .filter_map(Self::parse_paper)
            .collect())
    }

    async fn lookup_doi(&self, doi: &str) -> Result<Option<Paper>, ProviderError> {
        let url = format!(
            "{}/paper/DOI:{}?fields={}",
            self.base_url,
            urlencoding::encode(doi),
            PAPER_FIELDS
        );

        let response = self
            .add_api_key_if_present(self.client.get(&url))
            .send()
            .await?;
        let status = response.status();

        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ProviderError::status(
                status.as_u16(),
                format!("Semantic Scholar DOI lookup failed for '{doi}'"),
            ));
        }

        let data: S2Paper = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("Semantic Scholar paper response: {e}")))?;

        Ok(Self::parse_paper(data))
    }

    async fn enrich(&self, paper: &Paper) -> Result<Paper, ProviderError> {
        // Enrichment only fills fields the original record is missing
        let Some(doi) = paper.doi_lowercase() else {
            return Ok(paper.clone());
        };

        match self.lookup_doi(&doi).await? {
            Some(found) => {
                let mut enriched = paper.clone();
                if enriched.abstract_text.is_empty() {
                    enriched.abstract_text = found.abstract_text;
                }
                if enriched.citation_count.is_none() {
                    enriched.citation_count = found.citation_count;
                }
                if enriched.venue.is_none() {
                    enriched.venue = found.venue;
                }
                Ok(enriched)
            }
            None => Ok(paper.clone()),
        }
    }
}

// ===== Semantic Scholar API Types =====

#[derive(Debug, Deserialize)]
struct S2SearchResponse {
    #[serde(default)]
    data: Vec<S2Paper>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct S2Paper {
    paper_id: Option<String>,
    title: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    year: Option<i32>,
    venue: Option<String>,
    citation_count: Option<i64>,
    url: Option<String>,
    external_ids: Option<S2ExternalIds>,
    open_access_pdf: Option<S2Pdf>,
    #[serde(default)]
    authors: Vec<S2Author>,
}

#[derive(Debug, Deserialize)]
struct S2ExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2Pdf {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct S2Author {
    author_id: Option<String>,
    name: Option<String>,
}

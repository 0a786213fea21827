//! CrossRef search provider implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::models::{Author, Paper, PaperBuilder};
use crate::providers::{
    ConcurrencyConfig, Provider, ProviderCapabilities, ProviderError,
};
use crate::utils::{is_http_url, strip_markup};

const CROSSREF_API_BASE: &str = "https://api.crossref.org";

/// CrossRef search provider
///
/// Uses the CrossRef REST API for metadata search and DOI lookup. A
/// `mailto` address joins the polite pool; anonymous use runs at a reduced
/// request rate.
#[derive(Debug, Clone)]
pub struct CrossRefProvider {
    client: Arc<Client>,
    base_url: String,
    mailto: Option<String>,
}

impl CrossRefProvider {
    /// Create a new CrossRef provider
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
            warn!("no CrossRef mailto configured; using the public pool at a reduced request rate");
        }

        Self {
            client: Arc::new(
                Client::builder()
                    .user_agent(user_agent)
                    .timeout(Duration::from_secs(15))
                    .build()
                    .expect("Failed to create HTTP client"),
            ),
            base_url: CROSSREF_API_BASE.to_string(),
            mailto,
        }
    }

    #[cfg(test)]
    fn with_base_url(mailto: Option<String>, base_url: impl Into<String>) -> Self {
        let mut provider = Self::new(mailto);
        provider.base_url = base_url.into();
        provider
    }

    fn parse_paper(item: CRItem) -> Option<Paper> {
        let title = item.title.as_ref().and_then(|t| t.first()).cloned()?;
        if title.is_empty() {
            return None;
        }

        let doi = item.doi.clone().unwrap_or_default();
        if doi.is_empty() {
            return None;
        }

        let authors = item
            .author
            .iter()
            .filter_map(|a| {
                let name = match (&a.given, &a.family) {
                    (Some(given), Some(family)) => format!("{given} {family}"),
                    (None, Some(family)) => family.clone(),
                    (Some(given), None) => given.clone(),
                    (None, None) => return None,
                };
                Some(match a.orcid.clone() {
                    Some(orcid) => Author::with_id(name, orcid),
                    None => Author::new(name),
                })
            })
            .collect::<Vec<_>>();

        // Publisher landing page first, then the registered URL, then the
        // canonical doi.org link
        let url = item
            .resource
            .as_ref()
            .and_then(|r| r.primary.as_ref())
            .and_then(|p| p.url.clone())
            .filter(|u| is_http_url(u))
            .or_else(|| item.url.clone().filter(|u| is_http_url(u)))
            .unwrap_or_else(|| format!("https://doi.org/{doi}"));

        let venue = item
            .container_title
            .as_ref()
            .and_then(|t| t.first())
            .cloned()
            .unwrap_or_default();

        let abstract_text = item
            .abstract_text
            .as_deref()
            .map(strip_markup)
            .unwrap_or_default();

        let mut builder = PaperBuilder::new(doi.clone(), title, url, "crossref")
            .authors(authors)
            .abstract_text(abstract_text)
            .doi(doi)
            .maybe_year(derive_year(&item))
            .venue(venue);

        if let Some(count) = item.is_referenced_by_count {
            builder = builder.citation_count(count.max(0) as u32);
        }
        if let Some(publisher) = item.publisher.clone() {
            builder = builder.metadata("publisher", serde_json::Value::String(publisher));
        }

        Some(builder.build())
    }
}

/// Year from CrossRef's nested date structures: `issued` first, then the
/// print and online publication dates.
fn derive_year(item: &CRItem) -> Option<i32> {
    [&item.issued, &item.published_print, &item.published_online]
        .into_iter()
        .flatten()
        .find_map(|d| {
            d.date_parts
                .first()
                .and_then(|parts| parts.first())
                .copied()
                .flatten()
        })
}

#[async_trait]
impl Provider for CrossRefProvider {
    fn id(&self) -> &str {
        "crossref"
    }

    fn name(&self) -> &str {
        "CrossRef"
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::SEARCH | ProviderCapabilities::DOI_LOOKUP
    }

    fn concurrency(&self) -> ConcurrencyConfig {
        if self.mailto.is_some() {
            ConcurrencyConfig::new(4, 5.0)
        } else {
            ConcurrencyConfig::new(2, 1.0)
        }
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Paper>, ProviderError> {
        let mut url = format!(
            "{}/works?query={}&rows={}",
            self.base_url,
            urlencoding::encode(query),
            limit.clamp(1, 100)
        );
        if let Some(ref email) = self.mailto {
            url = format!("{}&mailto={}", url, urlencoding::encode(email));
        }

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::status(
                status.as_u16(),
                format!("CrossRef search failed for '{query}'"),
            ));
        }

        let data: CRWorksResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("CrossRef works response: {e}")))?;

        Ok(data
            .message
            .items
            .into_iter()
            .filter_map(Self::parse_paper)
            .collect())
    }

    async fn lookup_doi(&self, doi: &str) -> Result<Option<Paper>, ProviderError> {
        let url = format!("{}/works/{}", self.base_url, urlencoding::encode(doi));

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ProviderError::status(
                status.as_u16(),
                format!("CrossRef DOI lookup failed for '{doi}'"),
            ));
        }

        let data: CRWorkResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("CrossRef work response: {e}")))?;

        Ok(Self::parse_paper(data.message))
    }
}

// ===== CrossRef API Types =====

#[derive(Debug, Deserialize)]
struct CRWorksResponse {
    message: CRWorksMessage,
}

#[derive(Debug, Deserialize)]
struct CRWorksMessage {
    #[serde(default)]
    items: Vec<CRItem>,
}

#[derive(Debug, Deserialize)]
struct CRWorkResponse {
    message: CRItem,
}

#[derive(Debug, Deserialize)]
struct CRItem {
    #[serde(rename = "DOI")]
    doi: Option<String>,
    title: Option<Vec<String>>,
    #[serde(default)]
    author: Vec<CRAuthor>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    issued: Option<CRDate>,
    #[serde(rename = "published-print")]
    published_print: Option<CRDate>,
    #[serde(rename = "published-online")]
    published_online: Option<CRDate>,
    #[serde(rename = "URL")]
    url: Option<String>,
    resource: Option<CRResource>,
    #[serde(rename = "container-title")]
    container_title: Option<Vec<String>>,
    #[serde(rename = "is-referenced-by-count")]
    is_referenced_by_count: Option<i64>,
    publisher: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CRAuthor {
    given: Option<String>,
    family: Option<String>,
    #[serde(rename = "ORCID")]
    orcid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CRDate {
    #[serde(rename = "date-parts", default)]
    date_parts: Vec<Vec<Option<i32>>>,
}

#[derive(Debug, Deserialize)]
struct CRResource {
    primary: Option<CRResourcePrimary>,
}

#[derive(Debug, Deserialize)]
struct CRResourcePrimary {
    #[serde(rename = "URL")]
    url: Option<String>,
}

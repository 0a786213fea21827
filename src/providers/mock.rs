//! Mock provider for testing purposes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::models::{Paper, PaperBuilder};
use crate::providers::{
    ConcurrencyConfig, Provider, ProviderCapabilities, ProviderError,
};

/// A mock provider returning scripted responses.
///
/// Supports per-query scripting, failure injection and call accounting so
/// pipeline and limiter behavior can be asserted deterministically.
#[derive(Debug)]
pub struct MockProvider {
    id: String,
    concurrency: ConcurrencyConfig,
    default_response: Mutex<Vec<Paper>>,
    responses_by_query: Mutex<HashMap<String, Vec<Paper>>>,
    doi_index: Mutex<HashMap<String, Paper>>,
    fail_searches: AtomicBool,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl MockProvider {
    /// Create a mock provider with a generous budget
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            concurrency: ConcurrencyConfig::new(8, 1_000.0),
            default_response: Mutex::new(Vec::new()),
            responses_by_query: Mutex::new(HashMap::new()),
            doi_index: Mutex::new(HashMap::new()),
            fail_searches: AtomicBool::new(false),
            delay: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// Override the declared concurrency budget
    pub fn with_concurrency(mut self, config: ConcurrencyConfig) -> Self {
        self.concurrency = config;
        self
    }

    /// Set the papers returned for any query without a specific script
    pub fn respond_with(&self, papers: Vec<Paper>) {
        *self.default_response.lock().unwrap() = papers;
    }

    /// Script the papers returned for one specific query
    pub fn respond_to(&self, query: &str, papers: Vec<Paper>) {
        self.responses_by_query
            .lock()
            .unwrap()
            .insert(query.to_string(), papers);
    }

    /// Register a paper for DOI lookup
    pub fn index_doi(&self, paper: Paper) {
        if let Some(doi) = paper.doi_lowercase() {
            self.doi_index.lock().unwrap().insert(doi, paper);
        }
    }

    /// Make every search fail with a transport error
    pub fn fail_searches(&self, fail: bool) {
        self.fail_searches.store(fail, Ordering::SeqCst);
    }

    /// Delay every search by the given duration
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Number of search calls received
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        "Mock Provider"
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::SEARCH | ProviderCapabilities::DOI_LOOKUP
    }

    fn concurrency(&self) -> ConcurrencyConfig {
        self.concurrency
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Paper>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_searches.load(Ordering::SeqCst) {
            return Err(ProviderError::status(503, "mock provider unavailable"));
        }

        let scripted = self.responses_by_query.lock().unwrap().get(query).cloned();
        let mut papers = match scripted {
            Some(papers) => papers,
            None => self.default_response.lock().unwrap().clone(),
        };
        papers.truncate(limit);
        Ok(papers)
    }

    async fn lookup_doi(&self, doi: &str) -> Result<Option<Paper>, ProviderError> {
        Ok(self
            .doi_index
            .lock()
            .unwrap()
            .get(&doi.to_lowercase())
            .cloned())
    }
}

/// Helper to build a small test paper.
pub fn make_paper(external_id: &str, title: &str, source: &str) -> Paper {
    PaperBuilder::new(
        external_id,
        title,
        format!("https://example.com/{external_id}"),
        source,
    )
    .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_responses() {
        let provider = MockProvider::new("mock");
        provider.respond_with(vec![make_paper("d1", "Default", "mock")]);
        provider.respond_to("special", vec![make_paper("s1", "Special", "mock")]);

        let default = provider.search("anything", 10).await.unwrap();
        assert_eq!(default[0].external_id, "d1");

        let special = provider.search("special", 10).await.unwrap();
        assert_eq!(special[0].external_id, "s1");

        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let provider = MockProvider::new("mock");
        provider.fail_searches(true);

        let err = provider.search("q", 10).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_doi_lookup_not_found_is_ok_none() {
        let provider = MockProvider::new("mock");
        let paper = PaperBuilder::new("1", "Indexed", "https://example.com/1", "mock")
            .doi("10.1/Indexed")
            .build();
        provider.index_doi(paper);

        assert!(provider.lookup_doi("10.1/indexed").await.unwrap().is_some());
        assert!(provider.lookup_doi("10.1/missing").await.unwrap().is_none());
    }
}

//! Registry for managing search provider plugins.

use std::collections::HashMap;
use std::sync::Arc;

use super::Provider;
use crate::config::Config;

bitflags::bitflags! {
    /// Capabilities a provider declares at construction
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ProviderCapabilities: u32 {
        const SEARCH = 1 << 0;
        const DOI_LOOKUP = 1 << 1;
        const ENRICHMENT = 1 << 2;
    }
}

/// Registry of all available providers
///
/// Constructed once at startup and shared by reference; providers live for
/// the process lifetime.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
    order: Vec<String>,
}

impl ProviderRegistry {
    /// Create an empty registry
    pub fn empty() -> Self {
        Self {
            providers: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Create a registry with every provider enabled by the configuration
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::empty();

        let enabled = |id: &str| config.providers.is_enabled(id);

        if enabled("openalex") {
            registry.register(Arc::new(super::OpenAlexProvider::new(
                config.courtesy.openalex_mailto.clone(),
            )));
        }
        if enabled("crossref") {
            registry.register(Arc::new(super::CrossRefProvider::new(
                config.courtesy.crossref_mailto.clone(),
            )));
        }
        if enabled("semantic") {
            registry.register(Arc::new(super::SemanticScholarProvider::new(
                config.courtesy.semantic_scholar_api_key.clone(),
            )));
        }
        if enabled("arxiv") {
            registry.register(Arc::new(super::ArxivProvider::new()));
        }

        registry
    }

    /// Register a provider; registration order decides fan-out order and
    /// which provider is the baseline
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        let id = provider.id().to_string();
        if !self.providers.contains_key(&id) {
            self.order.push(id.clone());
        }
        self.providers.insert(id, provider);
    }

    /// Get a provider by ID
    pub fn get(&self, id: &str) -> Option<&Arc<dyn Provider>> {
        self.providers.get(id)
    }

    /// All providers in registration order
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn Provider>> {
        self.order.iter().filter_map(|id| self.providers.get(id))
    }

    /// All provider IDs in registration order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    /// Providers declaring a specific capability
    pub fn with_capability(&self, capability: ProviderCapabilities) -> Vec<&Arc<dyn Provider>> {
        self.all()
            .filter(|p| p.capabilities().contains(capability))
            .collect()
    }

    /// Providers that support search
    pub fn searchable(&self) -> Vec<&Arc<dyn Provider>> {
        self.with_capability(ProviderCapabilities::SEARCH)
    }

    /// The first registered searchable provider, used for fallback and
    /// basic comparison searches
    pub fn baseline(&self) -> Option<&Arc<dyn Provider>> {
        self.searchable().into_iter().next()
    }

    /// Check if a provider exists
    pub fn has(&self, id: &str) -> bool {
        self.providers.contains_key(id)
    }

    /// Number of registered providers
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

//! Search provider plugins with extensible trait-based architecture.
//!
//! This module defines the [`Provider`] trait that every external search API
//! adapter implements. New providers are added by implementing the trait and
//! registering them with the [`ProviderRegistry`]. A provider declares its
//! capabilities and its concurrency budget up front; callers branch on the
//! declared [`ProviderCapabilities`], never on runtime type inspection.

mod arxiv;
mod crossref;
mod openalex;
mod registry;
mod semantic;

pub mod mock;

pub use arxiv::ArxivProvider;
pub use crossref::CrossRefProvider;
pub use mock::MockProvider;
pub use openalex::OpenAlexProvider;
pub use registry::{ProviderCapabilities, ProviderRegistry};
pub use semantic::SemanticScholarProvider;

use async_trait::async_trait;

use crate::models::Paper;

/// Fixed request budget a provider declares at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConcurrencyConfig {
    /// Maximum in-flight requests against this provider
    pub max_concurrent: usize,

    /// Sustained request rate the provider tolerates
    pub requests_per_second: f64,
}

impl ConcurrencyConfig {
    /// Create a config, clamping degenerate values to the minimum budget
    pub fn new(max_concurrent: usize, requests_per_second: f64) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            requests_per_second: if requests_per_second > 0.0 {
                requests_per_second
            } else {
                1.0
            },
        }
    }
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            requests_per_second: 1.0,
        }
    }
}

/// Errors that can occur when talking to a provider
///
/// A missing DOI match is not an error: [`Provider::lookup_doi`] returns
/// `Ok(None)` for it.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Network or HTTP failure, with the status code when one was received
    #[error("transport error{}: {message}", status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// Response body could not be parsed (JSON, Atom, HTML)
    #[error("parse error: {0}")]
    Parse(String),

    /// Query rejected before it was sent
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The provider does not implement this operation
    #[error("operation not supported by this provider")]
    Unsupported,
}

impl ProviderError {
    /// Transport error without an HTTP status (connect failure, timeout)
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            status: None,
            message: message.into(),
        }
    }

    /// Transport error carrying an HTTP status code
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Transport {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Whether a retry might succeed: 429, 5xx, or no status at all
    /// (connect failures and timeouts).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { status, .. } => match status {
                Some(429) => true,
                Some(s) => (500..600).contains(s),
                None => true,
            },
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

/// The Provider trait defines the interface for all search adapters.
///
/// # Implementing a New Provider
///
/// 1. Create a struct holding a configured HTTP client
/// 2. Implement `id`, `name`, `capabilities`, `concurrency` and `search`
/// 3. Implement `lookup_doi`/`enrich` when the API supports them, and
///    declare the matching capability flags
/// 4. Register the provider with [`ProviderRegistry`]
#[async_trait]
pub trait Provider: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this provider ("arxiv", "openalex", ...)
    fn id(&self) -> &str;

    /// Human-readable provider name
    fn name(&self) -> &str;

    /// Declared capabilities; never inferred at runtime
    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::SEARCH
    }

    /// Request budget enforced by this provider's limiter
    fn concurrency(&self) -> ConcurrencyConfig {
        ConcurrencyConfig::default()
    }

    /// Rewrite a query into a form this provider's API accepts.
    ///
    /// The default passes the query through unchanged apart from a length
    /// clamp; adapters with stricter grammars strip their reserved
    /// characters here.
    fn sanitize_query(&self, query: &str) -> String {
        crate::utils::clamp_query(query, MAX_QUERY_LEN)
    }

    /// Search for papers matching the query
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Paper>, ProviderError>;

    /// Look up a single paper by DOI; `Ok(None)` means no match
    async fn lookup_doi(&self, _doi: &str) -> Result<Option<Paper>, ProviderError> {
        Err(ProviderError::Unsupported)
    }

    /// Enrich an existing paper with additional provider data
    async fn enrich(&self, _paper: &Paper) -> Result<Paper, ProviderError> {
        Err(ProviderError::Unsupported)
    }
}

/// Upper bound on outgoing query length, shared by all adapters
pub const MAX_QUERY_LEN: usize = 512;

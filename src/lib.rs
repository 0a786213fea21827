//! # Paper Scout
//!
//! Multi-provider academic paper retrieval: fan a query out across several
//! search APIs under per-provider rate budgets, normalize and deduplicate
//! the results, optionally rerank them, and measure retrieval quality
//! against labeled ground truth.
//!
//! ## Architecture
//!
//! - [`models`]: canonical data structures (Paper, search options/results)
//! - [`providers`]: search API adapters behind the [`providers::Provider`] trait
//! - [`limiter`]: per-provider concurrency and rate gates
//! - [`pipeline`]: the enhanced search pipeline and its collaborator traits
//! - [`metrics`]: retrieval-quality metrics and the benchmark harness
//! - [`config`]: configuration management
//! - [`utils`]: retry, text normalization, and other shared helpers

pub mod config;
pub mod limiter;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod providers;
pub mod utils;

// Re-export commonly used types
pub use models::Paper;
pub use pipeline::EnhancedSearchPipeline;
pub use providers::{Provider, ProviderRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

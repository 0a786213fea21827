//! Search request and response models for the enhanced pipeline.

use serde::{Deserialize, Serialize};

use crate::models::Paper;

/// Options controlling a pipeline search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Maximum number of papers in the final result
    pub limit: usize,

    /// Ask the expansion collaborator for query variants
    pub use_expansion: bool,

    /// Ask the reranking collaborator to reorder the merged results
    pub use_reranking: bool,

    /// Maximum number of query variants fanned out (original included)
    pub parallel_queries: usize,

    /// Merge duplicate works by DOI / normalized title
    pub deduplicate_by_doi: bool,

    /// Fan out across every enabled provider instead of the baseline only
    pub multi_provider: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 20,
            use_expansion: true,
            use_reranking: true,
            parallel_queries: 3,
            deduplicate_by_doi: true,
            multi_provider: true,
        }
    }
}

impl SearchOptions {
    /// Options for a plain search: no expansion, no reranking, one provider
    pub fn basic(limit: usize) -> Self {
        Self {
            limit,
            use_expansion: false,
            use_reranking: false,
            parallel_queries: 1,
            deduplicate_by_doi: false,
            multi_provider: false,
        }
    }

    /// Set the result limit
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// Query variants produced by the expansion collaborator
///
/// The original query is always the first variant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryVariants {
    /// Single expanded form of the query (reported in metadata only)
    pub expanded: Option<String>,

    /// Variant query strings, original first
    pub variants: Vec<String>,
}

impl QueryVariants {
    /// Variants containing only the original query
    pub fn original_only(query: &str) -> Self {
        Self {
            expanded: None,
            variants: vec![query.to_string()],
        }
    }
}

/// A paper scored by the reranking collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedPaper {
    /// The paper being scored
    pub paper: Paper,

    /// Relevance score assigned by the reranker
    pub score: f64,

    /// Optional reranker rationale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

/// Provenance and timing for one pipeline search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMetadata {
    /// Query as the caller supplied it
    pub original_query: String,

    /// Expanded query string, when expansion ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expanded_query: Option<String>,

    /// Variant strings fanned out, when expansion ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_variants: Option<Vec<String>>,

    /// Papers collected across all provider/variant pairs before dedup
    pub total_found: usize,

    /// Papers removed as duplicates
    pub deduplicated: usize,

    /// Whether the reranker reordered the results
    pub reranked: bool,

    /// Wall-clock time for the whole search
    pub latency_ms: u64,
}

/// Result of an enhanced pipeline search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancedSearchResult {
    /// Final papers, ordered and truncated
    pub papers: Vec<Paper>,

    /// Scored papers when reranking ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranked_papers: Option<Vec<RankedPaper>>,

    /// Search provenance
    pub metadata: SearchMetadata,
}

/// Overlap and ordering comparison between a basic and an enhanced search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchComparison {
    /// DOIs present in both result sets
    pub overlap_count: usize,

    /// Overlap as a percentage of the basic result's DOI set
    pub overlap_pct: f64,

    /// Papers only the enhanced search surfaced
    pub unique_to_enhanced: usize,

    /// Positions where the two results disagree
    pub rank_changes: usize,
}

/// Report produced by `EnhancedSearchPipeline::compare_search`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareSearchReport {
    /// Plain single-provider search result
    pub basic: Vec<Paper>,

    /// Full pipeline result
    pub enhanced: EnhancedSearchResult,

    /// Overlap/ordering comparison
    pub comparison: SearchComparison,
}

//! Enhanced search pipeline: expansion, fan-out, dedup, rerank, fallback.
//!
//! The pipeline fans a query (and its variants) out across every enabled
//! provider, each call passing through that provider's
//! [`ConcurrencyLimiter`](crate::limiter::ConcurrencyLimiter). A single
//! provider/variant failure never aborts the request: it is logged and
//! contributes an empty list. Only a whole-pipeline failure triggers the
//! baseline fallback, and only a fallback failure reaches the caller.

mod dedup;

pub use dedup::{deduplicate_papers, DedupResult};

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures_util::future::join_all;
use tracing::{debug, info, warn};

use crate::limiter::LimiterRegistry;
use crate::models::{
    CompareSearchReport, EnhancedSearchResult, Paper, QueryVariants, RankedPaper,
    SearchComparison, SearchMetadata, SearchOptions,
};
use crate::providers::{Provider, ProviderError, ProviderRegistry};

/// Error type external collaborators are free to return.
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

/// Query expansion collaborator.
///
/// Implementations live outside this crate; the pipeline only consumes the
/// interface.
#[async_trait]
pub trait QueryExpansion: Send + Sync {
    /// Produce a single expanded form of the query
    async fn expand_query(&self, query: &str) -> Result<String, CollaboratorError>;

    /// Produce up to `count` alternative phrasings of the query
    async fn generate_query_variants(
        &self,
        query: &str,
        count: usize,
    ) -> Result<Vec<String>, CollaboratorError>;
}

/// Reranking collaborator: returns the same papers, reordered and scored.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank_papers(
        &self,
        query: &str,
        papers: &[Paper],
    ) -> Result<Vec<RankedPaper>, CollaboratorError>;
}

/// External paper store contract.
///
/// The pipeline transfers ownership of results to its caller and never
/// persists; callers that do persist go through this interface, which must
/// be idempotent by `(source, external_id)`.
#[async_trait]
pub trait PaperStore: Send + Sync {
    /// Save the paper unless an equal `(source, external_id)` record
    /// exists; returns the store ID either way.
    async fn save_paper_if_not_exists(&self, paper: &Paper) -> Result<String, CollaboratorError>;
}

/// Errors surfaced by the pipeline.
///
/// Internal step failures are not surfaced: they trigger the fallback
/// path. Only caller mistakes and a failed fallback reach the caller.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Caller supplied an unusable query
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// No provider is registered to serve the request
    #[error("no searchable providers are registered")]
    NoProviders,

    /// The query expansion collaborator failed
    #[error("query expansion failed: {0}")]
    Expansion(String),

    /// The reranking collaborator failed
    #[error("reranking failed: {0}")]
    Rerank(String),

    /// The baseline provider itself failed (fallback exhausted)
    #[error("baseline provider search failed: {source}")]
    Baseline {
        #[source]
        source: ProviderError,
    },
}

/// Multi-provider search pipeline with expansion, dedup and reranking.
pub struct EnhancedSearchPipeline {
    registry: Arc<ProviderRegistry>,
    limiters: Arc<LimiterRegistry>,
    expansion: Option<Arc<dyn QueryExpansion>>,
    reranker: Option<Arc<dyn Reranker>>,
}

impl EnhancedSearchPipeline {
    /// Create a pipeline over the given providers
    pub fn new(registry: Arc<ProviderRegistry>, limiters: Arc<LimiterRegistry>) -> Self {
        Self {
            registry,
            limiters,
            expansion: None,
            reranker: None,
        }
    }

    /// Attach a query expansion collaborator
    pub fn with_expansion(mut self, expansion: Arc<dyn QueryExpansion>) -> Self {
        self.expansion = Some(expansion);
        self
    }

    /// Attach a reranking collaborator
    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Run the full pipeline for a query.
    ///
    /// Any failure inside the enhanced path falls back to a plain baseline
    /// search; an error is returned only when the fallback itself fails.
    pub async fn search(
        &self,
        query: &str,
        options: SearchOptions,
    ) -> Result<EnhancedSearchResult, PipelineError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(PipelineError::InvalidQuery("query is empty".to_string()));
        }

        let started = Instant::now();
        match self.run_enhanced(query, &options, started).await {
            Ok(result) => Ok(result),
            Err(error) => {
                warn!(%error, query, "enhanced search failed, falling back to baseline");
                self.fallback(query, &options, started).await
            }
        }
    }

    async fn run_enhanced(
        &self,
        query: &str,
        options: &SearchOptions,
        started: Instant,
    ) -> Result<EnhancedSearchResult, PipelineError> {
        // Step 1: query variants, original always included
        let variants = self.obtain_variants(query, options).await?;

        // Step 2: scatter all (variant x provider) calls before awaiting any
        let providers = self.fan_out_providers(options)?;
        let all_papers = self.scatter_searches(&variants.variants, &providers, options).await;
        let total_found = all_papers.len();

        // Step 3: merge duplicates
        let (papers, removed) = if options.deduplicate_by_doi {
            let outcome = deduplicate_papers(all_papers);
            debug!(
                total = outcome.total_input,
                removed = outcome.removed,
                "deduplicated fan-out results"
            );
            (outcome.papers, outcome.removed)
        } else {
            (all_papers, 0)
        };

        // Step 4: rerank when requested and possible
        let (mut papers, ranked, reranked) = match (&self.reranker, options.use_reranking) {
            (Some(reranker), true) if !papers.is_empty() => {
                let ranked = reranker
                    .rerank_papers(query, &papers)
                    .await
                    .map_err(|e| PipelineError::Rerank(e.to_string()))?;
                let reordered: Vec<Paper> = ranked.iter().map(|r| r.paper.clone()).collect();
                (reordered, Some(ranked), true)
            }
            _ => (papers, None, false),
        };

        // Step 5: truncate papers and the ranked list alike
        papers.truncate(options.limit);
        let ranked = ranked.map(|mut r| {
            r.truncate(options.limit);
            r
        });

        let latency_ms = started.elapsed().as_millis() as u64;
        info!(
            query,
            total_found,
            deduplicated = removed,
            reranked,
            latency_ms,
            "enhanced search complete"
        );

        Ok(EnhancedSearchResult {
            papers,
            ranked_papers: ranked,
            metadata: SearchMetadata {
                original_query: query.to_string(),
                expanded_query: variants.expanded,
                query_variants: if variants.variants.len() > 1 {
                    Some(variants.variants)
                } else {
                    None
                },
                total_found,
                deduplicated: removed,
                reranked,
                latency_ms,
            },
        })
    }

    async fn obtain_variants(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<QueryVariants, PipelineError> {
        if !options.use_expansion {
            return Ok(QueryVariants::original_only(query));
        }
        let Some(expansion) = &self.expansion else {
            return Ok(QueryVariants::original_only(query));
        };

        let expanded = expansion
            .expand_query(query)
            .await
            .map_err(|e| PipelineError::Expansion(e.to_string()))?;

        let max_variants = options.parallel_queries.max(1);
        let generated = expansion
            .generate_query_variants(query, max_variants)
            .await
            .map_err(|e| PipelineError::Expansion(e.to_string()))?;

        let mut variants = vec![query.to_string()];
        for variant in generated {
            if variants.len() >= max_variants {
                break;
            }
            if !variants.contains(&variant) && !variant.trim().is_empty() {
                variants.push(variant);
            }
        }

        Ok(QueryVariants {
            expanded: Some(expanded),
            variants,
        })
    }

    fn fan_out_providers(
        &self,
        options: &SearchOptions,
    ) -> Result<Vec<Arc<dyn Provider>>, PipelineError> {
        let providers: Vec<Arc<dyn Provider>> = if options.multi_provider {
            self.registry.searchable().into_iter().cloned().collect()
        } else {
            self.registry.baseline().cloned().into_iter().collect()
        };

        if providers.is_empty() {
            return Err(PipelineError::NoProviders);
        }
        Ok(providers)
    }

    /// Launch every (variant x provider) search before awaiting any.
    ///
    /// A failing pair is logged and contributes nothing; order of the
    /// concatenation follows the launch order, never completion order.
    async fn scatter_searches(
        &self,
        variants: &[String],
        providers: &[Arc<dyn Provider>],
        options: &SearchOptions,
    ) -> Vec<Paper> {
        let mut calls = Vec::with_capacity(variants.len() * providers.len());

        for variant in variants {
            for provider in providers {
                let provider = Arc::clone(provider);
                let limiter = self
                    .limiters
                    .limiter_for(provider.id(), provider.concurrency());
                let sanitized = provider.sanitize_query(variant);
                let limit = options.limit;
                let variant = variant.clone();

                calls.push(async move {
                    match limiter.execute(|| provider.search(&sanitized, limit)).await {
                        Ok(papers) => {
                            debug!(
                                provider = provider.id(),
                                variant = %variant,
                                count = papers.len(),
                                "provider search succeeded"
                            );
                            papers
                        }
                        Err(error) => {
                            warn!(
                                provider = provider.id(),
                                variant = %variant,
                                %error,
                                "provider search failed, contributing no results"
                            );
                            Vec::new()
                        }
                    }
                });
            }
        }

        join_all(calls).await.into_iter().flatten().collect()
    }

    /// Plain baseline search used when the enhanced path fails outright.
    async fn fallback(
        &self,
        query: &str,
        options: &SearchOptions,
        started: Instant,
    ) -> Result<EnhancedSearchResult, PipelineError> {
        let mut papers = self.basic_search(query, options.limit).await?;
        papers.truncate(options.limit);

        let latency_ms = started.elapsed().as_millis() as u64;
        Ok(EnhancedSearchResult {
            metadata: SearchMetadata {
                original_query: query.to_string(),
                expanded_query: None,
                query_variants: None,
                total_found: papers.len(),
                deduplicated: 0,
                reranked: false,
                latency_ms,
            },
            ranked_papers: None,
            papers,
        })
    }

    /// One plain search against the baseline provider, through its limiter.
    async fn basic_search(&self, query: &str, limit: usize) -> Result<Vec<Paper>, PipelineError> {
        let provider = self.registry.baseline().ok_or(PipelineError::NoProviders)?;
        let limiter = self
            .limiters
            .limiter_for(provider.id(), provider.concurrency());
        let sanitized = provider.sanitize_query(query);

        limiter
            .execute(|| provider.search(&sanitized, limit))
            .await
            .map_err(|source| PipelineError::Baseline { source })
    }

    /// Run a plain baseline search and the full pipeline on the same query
    /// and report how the result sets overlap and reorder.
    pub async fn compare_search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<CompareSearchReport, PipelineError> {
        let basic = self.basic_search(query, limit).await?;
        let enhanced = self
            .search(query, SearchOptions::default().limit(limit))
            .await?;

        let comparison = compare_results(&basic, &enhanced.papers);
        Ok(CompareSearchReport {
            basic,
            enhanced,
            comparison,
        })
    }
}

/// DOI-set overlap and position-wise rank changes between two result lists.
fn compare_results(basic: &[Paper], enhanced: &[Paper]) -> SearchComparison {
    let basic_dois: HashSet<String> = basic.iter().filter_map(Paper::doi_lowercase).collect();
    let enhanced_dois: HashSet<String> =
        enhanced.iter().filter_map(Paper::doi_lowercase).collect();

    let overlap_count = basic_dois.intersection(&enhanced_dois).count();
    let overlap_pct = if basic_dois.is_empty() {
        0.0
    } else {
        overlap_count as f64 / basic_dois.len() as f64 * 100.0
    };
    let unique_to_enhanced = enhanced_dois.difference(&basic_dois).count();

    let rank_changes = basic
        .iter()
        .zip(enhanced.iter())
        .filter(|(b, e)| b.doi_lowercase() != e.doi_lowercase())
        .count();

    SearchComparison {
        overlap_count,
        overlap_pct,
        unique_to_enhanced,
        rank_changes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaperBuilder;
    use crate::providers::mock::{make_paper, MockProvider};

    struct FixedExpansion {
        fail: bool,
    }

    #[async_trait]
    impl QueryExpansion for FixedExpansion {
        async fn expand_query(&self, query: &str) -> Result<String, CollaboratorError> {
            if self.fail {
                return Err("expansion offline".into());
            }
            Ok(format!("{query} research survey"))
        }

        async fn generate_query_variants(
            &self,
            query: &str,
            count: usize,
        ) -> Result<Vec<String>, CollaboratorError> {
            if self.fail {
                return Err("expansion offline".into());
            }
            Ok((0..count + 2).map(|i| format!("{query} v{i}")).collect())
        }
    }

    struct ReversingReranker;

    #[async_trait]
    impl Reranker for ReversingReranker {
        async fn rerank_papers(
            &self,
            _query: &str,
            papers: &[Paper],
        ) -> Result<Vec<RankedPaper>, CollaboratorError> {
            Ok(papers
                .iter()
                .rev()
                .enumerate()
                .map(|(i, p)| RankedPaper {
                    paper: p.clone(),
                    score: 1.0 - i as f64 * 0.1,
                    rationale: None,
                })
                .collect())
        }
    }

    fn pipeline_with(
        providers: Vec<Arc<MockProvider>>,
    ) -> (EnhancedSearchPipeline, Arc<ProviderRegistry>) {
        let mut registry = ProviderRegistry::empty();
        for provider in providers {
            registry.register(provider);
        }
        let registry = Arc::new(registry);
        let pipeline = EnhancedSearchPipeline::new(
            Arc::clone(&registry),
            Arc::new(LimiterRegistry::new()),
        );
        (pipeline, registry)
    }

    fn doi_paper(id: &str, title: &str, doi: &str, source: &str) -> Paper {
        PaperBuilder::new(id, title, format!("https://example.com/{id}"), source)
            .doi(doi)
            .build()
    }

    #[tokio::test]
    async fn test_dedup_scenario_two_providers_two_overlaps() {
        let a = Arc::new(MockProvider::new("prov-a"));
        let b = Arc::new(MockProvider::new("prov-b"));
        a.respond_with(
            (0..5)
                .map(|i| doi_paper(&format!("a{i}"), &format!("A{i}"), &format!("10.1/{i}"), "prov-a"))
                .collect(),
        );
        b.respond_with(
            (3..8)
                .map(|i| doi_paper(&format!("b{i}"), &format!("B{i}"), &format!("10.1/{i}"), "prov-b"))
                .collect(),
        );

        let (pipeline, _) = pipeline_with(vec![a, b]);
        let result = pipeline
            .search(
                "dedup scenario",
                SearchOptions {
                    use_expansion: false,
                    use_reranking: false,
                    ..SearchOptions::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(result.metadata.total_found, 10);
        assert_eq!(result.metadata.deduplicated, 2);
        assert_eq!(result.papers.len(), 8);
    }

    #[tokio::test]
    async fn test_single_provider_failure_degrades_not_aborts() {
        let healthy = Arc::new(MockProvider::new("healthy"));
        let broken = Arc::new(MockProvider::new("broken"));
        healthy.respond_with(vec![make_paper("h1", "Healthy Result", "healthy")]);
        broken.fail_searches(true);

        let (pipeline, _) = pipeline_with(vec![healthy, broken]);
        let result = pipeline
            .search("partial failure", SearchOptions::default())
            .await
            .unwrap();

        assert_eq!(result.papers.len(), 1);
        assert_eq!(result.papers[0].external_id, "h1");
    }

    #[tokio::test]
    async fn test_total_failure_falls_back_then_errors_only_when_exhausted() {
        let broken = Arc::new(MockProvider::new("broken"));
        broken.fail_searches(true);
        let expansion = Arc::new(FixedExpansion { fail: true });

        let (pipeline, _) = pipeline_with(vec![Arc::clone(&broken)]);
        let pipeline = pipeline.with_expansion(expansion);

        // Everything fails: fallback also hits the broken provider
        let err = pipeline
            .search("doomed", SearchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Baseline { .. }));

        // Heal the provider: expansion still fails, fallback now succeeds
        broken.fail_searches(false);
        broken.respond_with(vec![make_paper("f1", "Fallback Result", "broken")]);
        let result = pipeline
            .search("recovered", SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(result.papers.len(), 1);
        assert!(!result.metadata.reranked);
        assert_eq!(result.metadata.deduplicated, 0);
        assert!(result.metadata.query_variants.is_none());
    }

    #[tokio::test]
    async fn test_expansion_variants_include_original_and_cap() {
        let provider = Arc::new(MockProvider::new("counting"));
        provider.respond_with(Vec::new());

        let (pipeline, _) = pipeline_with(vec![Arc::clone(&provider)]);
        let pipeline = pipeline.with_expansion(Arc::new(FixedExpansion { fail: false }));

        let result = pipeline
            .search(
                "variants",
                SearchOptions {
                    parallel_queries: 3,
                    use_reranking: false,
                    ..SearchOptions::default()
                },
            )
            .await
            .unwrap();

        let variants = result.metadata.query_variants.unwrap();
        assert_eq!(variants.len(), 3);
        assert_eq!(variants[0], "variants");
        assert_eq!(
            result.metadata.expanded_query.as_deref(),
            Some("variants research survey")
        );
        // One search per (variant x provider) pair
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_reranker_order_is_adopted() {
        let provider = Arc::new(MockProvider::new("ranked"));
        provider.respond_with(vec![
            doi_paper("1", "First", "10.1/first", "ranked"),
            doi_paper("2", "Second", "10.1/second", "ranked"),
            doi_paper("3", "Third", "10.1/third", "ranked"),
        ]);

        let (pipeline, _) = pipeline_with(vec![provider]);
        let pipeline = pipeline.with_reranker(Arc::new(ReversingReranker));

        let result = pipeline
            .search(
                "rerank",
                SearchOptions {
                    use_expansion: false,
                    ..SearchOptions::default()
                },
            )
            .await
            .unwrap();

        assert!(result.metadata.reranked);
        let order: Vec<&str> = result.papers.iter().map(|p| p.external_id.as_str()).collect();
        assert_eq!(order, vec!["3", "2", "1"]);

        let ranked = result.ranked_papers.unwrap();
        assert_eq!(ranked.len(), 3);
        assert!(ranked[0].score > ranked[2].score);
    }

    #[tokio::test]
    async fn test_truncation_applies_to_papers_and_ranked_list() {
        let provider = Arc::new(MockProvider::new("many"));
        provider.respond_with(
            (0..10)
                .map(|i| doi_paper(&format!("p{i}"), &format!("P{i}"), &format!("10.2/{i}"), "many"))
                .collect(),
        );

        let (pipeline, _) = pipeline_with(vec![provider]);
        let pipeline = pipeline.with_reranker(Arc::new(ReversingReranker));

        let result = pipeline
            .search(
                "truncate",
                SearchOptions {
                    limit: 4,
                    use_expansion: false,
                    ..SearchOptions::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(result.papers.len(), 4);
        assert_eq!(result.ranked_papers.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_empty_query_is_validation_error() {
        let (pipeline, _) = pipeline_with(vec![Arc::new(MockProvider::new("any"))]);
        let err = pipeline
            .search("   ", SearchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn test_multi_provider_false_uses_baseline_only() {
        let first = Arc::new(MockProvider::new("first"));
        let second = Arc::new(MockProvider::new("second"));
        first.respond_with(vec![make_paper("f", "From First", "first")]);
        second.respond_with(vec![make_paper("s", "From Second", "second")]);

        let (pipeline, _) = pipeline_with(vec![Arc::clone(&first), Arc::clone(&second)]);
        let result = pipeline
            .search(
                "single",
                SearchOptions {
                    multi_provider: false,
                    use_expansion: false,
                    use_reranking: false,
                    ..SearchOptions::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(result.papers.len(), 1);
        assert_eq!(first.call_count(), 1);
        assert_eq!(second.call_count(), 0);
    }

    #[tokio::test]
    async fn test_compare_search_reports_overlap_and_rank_changes() {
        let provider = Arc::new(MockProvider::new("cmp"));
        provider.respond_with(vec![
            doi_paper("1", "One", "10.3/one", "cmp"),
            doi_paper("2", "Two", "10.3/two", "cmp"),
        ]);

        let (pipeline, _) = pipeline_with(vec![provider]);
        let pipeline = pipeline.with_reranker(Arc::new(ReversingReranker));

        let report = pipeline.compare_search("compare", 10).await.unwrap();
        assert_eq!(report.basic.len(), 2);
        assert_eq!(report.comparison.overlap_count, 2);
        assert!((report.comparison.overlap_pct - 100.0).abs() < f64::EPSILON);
        assert_eq!(report.comparison.unique_to_enhanced, 0);
        // Reranker reversed a two-element list: both positions changed
        assert_eq!(report.comparison.rank_changes, 2);
    }

    #[test]
    fn test_compare_results_missing_dois_compare_equal() {
        let basic = vec![make_paper("1", "No Doi", "a")];
        let enhanced = vec![make_paper("2", "Also No Doi", "b")];
        let cmp = compare_results(&basic, &enhanced);
        assert_eq!(cmp.rank_changes, 0);
        assert_eq!(cmp.overlap_count, 0);
        assert_eq!(cmp.overlap_pct, 0.0);
    }
}

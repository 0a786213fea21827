//! Benchmark harness comparing baseline and enhanced retrieval quality
//! against a labeled ground-truth set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::metrics::{keyword_coverage, AggregatedMetrics, RetrievalMetrics};
use crate::models::{EnhancedSearchResult, SearchOptions};
use crate::pipeline::{EnhancedSearchPipeline, PipelineError};

/// One labeled query: the DOIs a good retrieval should surface, plus
/// optional keywords expected to appear in titles/abstracts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundTruthCase {
    pub query: String,
    pub relevant_dois: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GroundTruthSet {
    #[serde(rename = "case", default)]
    cases: Vec<GroundTruthCase>,
}

/// Parse a ground-truth set from TOML (`[[case]]` tables).
pub fn parse_ground_truth(toml_text: &str) -> Result<Vec<GroundTruthCase>, toml::de::Error> {
    let set: GroundTruthSet = toml::from_str(toml_text)?;
    Ok(set.cases)
}

/// Per-query benchmark outcome for both pipelines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub query: String,
    pub basic: RetrievalMetrics,
    pub enhanced: RetrievalMetrics,
    pub enhanced_keyword_coverage: f64,
}

/// Full benchmark run: per-query outcomes plus batch aggregates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub generated_at: DateTime<Utc>,
    pub outcomes: Vec<QueryOutcome>,
    pub basic: AggregatedMetrics,
    pub enhanced: AggregatedMetrics,
}

/// Runs the same labeled queries through a plain baseline search and the
/// full pipeline, yielding comparable aggregate metrics.
pub struct BenchmarkHarness<'a> {
    pipeline: &'a EnhancedSearchPipeline,
    limit: usize,
}

impl<'a> BenchmarkHarness<'a> {
    /// Create a harness evaluating the top `limit` results per query
    pub fn new(pipeline: &'a EnhancedSearchPipeline, limit: usize) -> Self {
        Self { pipeline, limit }
    }

    /// Run every case through both pipelines and aggregate.
    pub async fn run(
        &self,
        cases: &[GroundTruthCase],
    ) -> Result<BenchmarkReport, PipelineError> {
        let mut outcomes = Vec::with_capacity(cases.len());

        for case in cases {
            let basic = self
                .pipeline
                .search(&case.query, SearchOptions::basic(self.limit))
                .await?;
            let enhanced = self
                .pipeline
                .search(&case.query, SearchOptions::default().limit(self.limit))
                .await?;

            let outcome = evaluate_case(case, &basic, &enhanced);
            info!(
                query = %case.query,
                basic_recall = outcome.basic.recall,
                enhanced_recall = outcome.enhanced.recall,
                "benchmark case complete"
            );
            outcomes.push(outcome);
        }

        let basic = AggregatedMetrics::aggregate(
            &outcomes.iter().map(|o| o.basic).collect::<Vec<_>>(),
        );
        let enhanced = AggregatedMetrics::aggregate(
            &outcomes.iter().map(|o| o.enhanced).collect::<Vec<_>>(),
        );

        Ok(BenchmarkReport {
            generated_at: Utc::now(),
            outcomes,
            basic,
            enhanced,
        })
    }
}

/// Score one case from two independently produced result sets.
fn evaluate_case(
    case: &GroundTruthCase,
    basic: &EnhancedSearchResult,
    enhanced: &EnhancedSearchResult,
) -> QueryOutcome {
    let basic_ids = retrieved_ids(basic);
    let enhanced_ids = retrieved_ids(enhanced);

    let titles: Vec<String> = enhanced.papers.iter().map(|p| p.title.clone()).collect();
    let abstracts: Vec<String> = enhanced
        .papers
        .iter()
        .map(|p| p.abstract_text.clone())
        .collect();

    QueryOutcome {
        query: case.query.clone(),
        basic: RetrievalMetrics::compute(
            &basic_ids,
            &case.relevant_dois,
            basic.metadata.latency_ms as f64,
        ),
        enhanced: RetrievalMetrics::compute(
            &enhanced_ids,
            &case.relevant_dois,
            enhanced.metadata.latency_ms as f64,
        ),
        enhanced_keyword_coverage: keyword_coverage(&titles, &abstracts, &case.keywords),
    }
}

fn retrieved_ids(result: &EnhancedSearchResult) -> Vec<String> {
    result
        .papers
        .iter()
        .map(|p| p.primary_id().to_string())
        .collect()
}

//! Retrieval-quality metrics.
//!
//! Pure functions over an ordered sequence of retrieved IDs and a set of
//! relevant IDs, compared case-insensitively. None of these functions can
//! fail: degenerate inputs return their defined sentinels (0 or 1), and
//! aggregation depends on those sentinels being exact.

mod benchmark;

pub use benchmark::{
    parse_ground_truth, BenchmarkHarness, BenchmarkReport, GroundTruthCase, QueryOutcome,
};

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

fn lower_set(ids: &[String]) -> HashSet<String> {
    ids.iter().map(|s| s.to_lowercase()).collect()
}

/// Fraction of retrieved items that are relevant; 0 when nothing was
/// retrieved.
pub fn precision(retrieved: &[String], relevant: &[String]) -> f64 {
    if retrieved.is_empty() {
        return 0.0;
    }
    let relevant = lower_set(relevant);
    let hits = retrieved
        .iter()
        .filter(|id| relevant.contains(&id.to_lowercase()))
        .count();
    hits as f64 / retrieved.len() as f64
}

/// Fraction of relevant items that were retrieved; vacuously 1 when
/// nothing is relevant.
pub fn recall(retrieved: &[String], relevant: &[String]) -> f64 {
    if relevant.is_empty() {
        return 1.0;
    }
    let relevant = lower_set(relevant);
    let retrieved = lower_set(retrieved);
    let found = relevant.intersection(&retrieved).count();
    found as f64 / relevant.len() as f64
}

/// Harmonic mean of precision and recall; 0 when both are 0.
pub fn f1_score(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        return 0.0;
    }
    2.0 * precision * recall / (precision + recall)
}

/// Reciprocal rank of the first relevant item (1-indexed); 0 when no
/// retrieved item is relevant, 1 when nothing is relevant.
pub fn mrr(retrieved: &[String], relevant: &[String]) -> f64 {
    if relevant.is_empty() {
        return 1.0;
    }
    let relevant = lower_set(relevant);
    for (i, id) in retrieved.iter().enumerate() {
        if relevant.contains(&id.to_lowercase()) {
            return 1.0 / (i + 1) as f64;
        }
    }
    0.0
}

/// 1 when any retrieved item is relevant, else 0; 1 when nothing is
/// relevant.
pub fn hit_rate(retrieved: &[String], relevant: &[String]) -> f64 {
    if relevant.is_empty() {
        return 1.0;
    }
    let relevant = lower_set(relevant);
    if retrieved
        .iter()
        .any(|id| relevant.contains(&id.to_lowercase()))
    {
        1.0
    } else {
        0.0
    }
}

/// Fraction of keywords appearing (case-insensitive substring) anywhere in
/// the concatenated titles and abstracts; 1 when no keywords are given.
pub fn keyword_coverage(titles: &[String], abstracts: &[String], keywords: &[String]) -> f64 {
    if keywords.is_empty() {
        return 1.0;
    }
    let haystack = titles
        .iter()
        .chain(abstracts.iter())
        .map(|s| s.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    let found = keywords
        .iter()
        .filter(|k| haystack.contains(&k.to_lowercase()))
        .count();
    found as f64 / keywords.len() as f64
}

/// Quality metrics for one query, computed once, immutable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrievalMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub mrr: f64,
    pub hit_rate: f64,
    pub avg_latency_ms: f64,
}

impl RetrievalMetrics {
    /// Compute all metrics for one retrieved/relevant pair.
    pub fn compute(retrieved: &[String], relevant: &[String], latency_ms: f64) -> Self {
        let p = precision(retrieved, relevant);
        let r = recall(retrieved, relevant);
        Self {
            precision: p,
            recall: r,
            f1: f1_score(p, r),
            mrr: mrr(retrieved, relevant),
            hit_rate: hit_rate(retrieved, relevant),
            avg_latency_ms: latency_ms.max(0.0),
        }
    }
}

/// Batch statistics over per-query metrics.
///
/// `f1` is recomputed from the aggregate precision and recall rather than
/// averaged per query: F1 is non-linear, and the mean of per-query F1 is a
/// different (and here unwanted) quantity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub mrr: f64,
    pub hit_rate: f64,
    pub avg_latency_ms: f64,
    pub precision_std_dev: f64,
    pub recall_std_dev: f64,
    pub latency_std_dev: f64,
    pub count: usize,
}

impl AggregatedMetrics {
    /// Aggregate a batch; an empty batch yields all zeros with `count = 0`.
    pub fn aggregate(batch: &[RetrievalMetrics]) -> Self {
        if batch.is_empty() {
            return Self {
                precision: 0.0,
                recall: 0.0,
                f1: 0.0,
                mrr: 0.0,
                hit_rate: 0.0,
                avg_latency_ms: 0.0,
                precision_std_dev: 0.0,
                recall_std_dev: 0.0,
                latency_std_dev: 0.0,
                count: 0,
            };
        }

        let precision = mean(batch.iter().map(|m| m.precision));
        let recall = mean(batch.iter().map(|m| m.recall));
        let latency = mean(batch.iter().map(|m| m.avg_latency_ms));

        Self {
            precision,
            recall,
            f1: f1_score(precision, recall),
            mrr: mean(batch.iter().map(|m| m.mrr)),
            hit_rate: mean(batch.iter().map(|m| m.hit_rate)),
            avg_latency_ms: latency,
            precision_std_dev: population_std_dev(batch.iter().map(|m| m.precision), precision),
            recall_std_dev: population_std_dev(batch.iter().map(|m| m.recall), recall),
            latency_std_dev: population_std_dev(batch.iter().map(|m| m.avg_latency_ms), latency),
            count: batch.len(),
        }
    }
}

fn mean(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let n = values.clone().count();
    if n == 0 {
        return 0.0;
    }
    values.sum::<f64>() / n as f64
}

fn population_std_dev(values: impl Iterator<Item = f64> + Clone, mean: f64) -> f64 {
    let n = values.clone().count();
    if n == 0 {
        return 0.0;
    }
    let variance = values.map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
    variance.sqrt()
}

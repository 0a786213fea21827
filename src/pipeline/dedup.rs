//! Deduplication of papers merged across providers and query variants.

use std::collections::HashMap;

use crate::models::Paper;
use crate::utils::normalize_title;

/// Outcome of a deduplication pass
#[derive(Debug, Clone)]
pub struct DedupResult {
    /// Unique papers, first-occurrence order preserved
    pub papers: Vec<Paper>,
    /// Number of papers before deduplication
    pub total_input: usize,
    /// Number of papers removed as duplicates
    pub removed: usize,
}

/// Merge key for one paper: lowercase DOI when present, else the
/// normalized title.
fn dedup_key(paper: &Paper) -> String {
    paper
        .doi_lowercase()
        .unwrap_or_else(|| normalize_title(&paper.title))
}

/// Count of populated merge-relevant fields.
///
/// The four signals weigh equally; on a key collision the richer record
/// replaces the kept one only when strictly richer.
fn richness(paper: &Paper) -> usize {
    let mut score = 0;
    if !paper.abstract_text.is_empty() {
        score += 1;
    }
    if paper.doi.as_deref().is_some_and(|d| !d.is_empty()) {
        score += 1;
    }
    if paper.citation_count.is_some() {
        score += 1;
    }
    if paper.venue.as_deref().is_some_and(|v| !v.is_empty()) {
        score += 1;
    }
    score
}

/// Merge a flat list of papers into a unique set.
///
/// Pure: same input, same output. Re-running on its own output removes
/// nothing further.
pub fn deduplicate_papers(papers: Vec<Paper>) -> DedupResult {
    let total_input = papers.len();
    let mut kept: Vec<Paper> = Vec::with_capacity(total_input);
    let mut index_by_key: HashMap<String, usize> = HashMap::new();

    for paper in papers {
        let key = dedup_key(&paper);
        match index_by_key.get(&key) {
            Some(&idx) => {
                if richness(&paper) > richness(&kept[idx]) {
                    kept[idx] = paper;
                }
            }
            None => {
                index_by_key.insert(key, kept.len());
                kept.push(paper);
            }
        }
    }

    let removed = total_input - kept.len();
    DedupResult {
        papers: kept,
        total_input,
        removed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaperBuilder;

    fn paper(id: &str, title: &str, source: &str) -> PaperBuilder {
        PaperBuilder::new(id, title, format!("https://example.com/{id}"), source)
    }

    #[test]
    fn test_dedup_by_doi_case_insensitive() {
        let papers = vec![
            paper("1", "Paper One", "arxiv").doi("10.1234/TEST").build(),
            paper("2", "A Different Title", "openalex")
                .doi("10.1234/test")
                .build(),
        ];

        let result = deduplicate_papers(papers);
        assert_eq!(result.papers.len(), 1);
        assert_eq!(result.total_input, 2);
        assert_eq!(result.removed, 1);
        assert_eq!(result.papers[0].external_id, "1");
    }

    #[test]
    fn test_dedup_by_normalized_title_when_doi_missing() {
        let papers = vec![
            paper("1", "Attention Is All You Need", "arxiv").build(),
            paper("2", "attention is all you need!", "semantic").build(),
        ];

        let result = deduplicate_papers(papers);
        assert_eq!(result.papers.len(), 1);
        assert_eq!(result.removed, 1);
    }

    #[test]
    fn test_richer_incoming_replaces_kept() {
        let papers = vec![
            paper("sparse", "Shared Work", "arxiv")
                .doi("10.1/x")
                .build(),
            paper("rich", "Shared Work", "openalex")
                .doi("10.1/x")
                .abstract_text("Full abstract text.")
                .venue("NeurIPS")
                .citation_count(120)
                .build(),
        ];

        let result = deduplicate_papers(papers);
        assert_eq!(result.papers.len(), 1);
        assert_eq!(result.papers[0].external_id, "rich");
        // Replacement keeps the first-occurrence position
        assert_eq!(result.papers[0].venue.as_deref(), Some("NeurIPS"));
    }

    #[test]
    fn test_equal_richness_keeps_existing() {
        let papers = vec![
            paper("first", "Shared Work", "arxiv").doi("10.1/x").build(),
            paper("second", "Shared Work", "openalex")
                .doi("10.1/x")
                .build(),
        ];

        let result = deduplicate_papers(papers);
        assert_eq!(result.papers[0].external_id, "first");
    }

    #[test]
    fn test_doi_and_titleless_key_do_not_collide_across_distinct_works() {
        let papers = vec![
            paper("1", "Work A", "arxiv").doi("10.1/a").build(),
            paper("2", "Work B", "arxiv").doi("10.1/b").build(),
            paper("3", "Work C", "arxiv").build(),
        ];

        let result = deduplicate_papers(papers);
        assert_eq!(result.papers.len(), 3);
        assert_eq!(result.removed, 0);
    }

    #[test]
    fn test_idempotent() {
        let papers = vec![
            paper("1", "Work A", "arxiv").doi("10.1/a").build(),
            paper("2", "Work A again", "openalex").doi("10.1/A").build(),
            paper("3", "Work B", "crossref").build(),
            paper("4", "work b", "semantic").build(),
        ];

        let first = deduplicate_papers(papers);
        assert_eq!(first.papers.len(), 2);

        let second = deduplicate_papers(first.papers.clone());
        assert_eq!(second.papers.len(), first.papers.len());
        assert_eq!(second.removed, 0);
        for (a, b) in first.papers.iter().zip(second.papers.iter()) {
            assert_eq!(a.external_id, b.external_id);
        }
    }

    #[test]
    fn test_preserves_first_occurrence_order() {
        let papers = vec![
            paper("z", "Zulu", "arxiv").build(),
            paper("a", "Alpha", "arxiv").build(),
            paper("m", "Mike", "arxiv").build(),
            paper("a2", "alpha", "openalex").build(),
        ];

        let result = deduplicate_papers(papers);
        let titles: Vec<&str> = result.papers.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Zulu", "Alpha", "Mike"]);
    }

    #[test]
    fn test_empty_input() {
        let result = deduplicate_papers(Vec::new());
        assert!(result.papers.is_empty());
        assert_eq!(result.total_input, 0);
        assert_eq!(result.removed, 0);
    }

    #[test]
    fn test_two_providers_two_overlapping_dois() {
        // Two providers each return 5 papers, 2 DOIs overlap
        let mut papers = Vec::new();
        for i in 0..5 {
            papers.push(
                paper(&format!("a{i}"), &format!("Paper A{i}"), "arxiv")
                    .doi(format!("10.1/{i}"))
                    .build(),
            );
        }
        for i in 3..8 {
            papers.push(
                paper(&format!("b{i}"), &format!("Paper B{i}"), "openalex")
                    .doi(format!("10.1/{i}"))
                    .build(),
            );
        }

        let result = deduplicate_papers(papers);
        assert_eq!(result.total_input, 10);
        assert_eq!(result.papers.len(), 8);
        assert_eq!(result.removed, 2);
    }
}

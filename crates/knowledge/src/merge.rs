//! Fusion of vector and lexical hits into one deduplicated ranking.

use crate::types::Hit;
use citerag_core::{MergeStrategy, RetrievalConfig};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Combines vector and lexical hits.
///
/// Hits are deduplicated by locator `(source_file, page_number)`, keeping
/// the first occurrence with vector hits ahead of lexical ones. With
/// [`MergeStrategy::Raw`] the survivors are sorted on raw score even though
/// vector similarities and BM25 scores are not on one scale.
/// [`MergeStrategy::Rrf`] replaces each score by its reciprocal rank fusion
/// score instead.
#[derive(Debug, Clone, Copy)]
pub struct HybridMerger {
    strategy: MergeStrategy,
    top_k: usize,
}

impl HybridMerger {
    /// Create a merger keeping at most `top_k` hits.
    pub fn new(strategy: MergeStrategy, top_k: usize) -> Self {
        Self { strategy, top_k }
    }

    /// Create a merger from retrieval configuration.
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self::new(config.merge_strategy, config.top_k)
    }

    /// Strategy in use.
    pub fn strategy(&self) -> MergeStrategy {
        self.strategy
    }

    /// Merge both result sets.
    ///
    /// Output is sorted by score descending; equal scores put vector hits
    /// first, then keep arrival order.
    pub fn merge(&self, vector_hits: Vec<Hit>, lexical_hits: Vec<Hit>) -> Vec<Hit> {
        let vector_hits = drop_unscored(vector_hits);
        let lexical_hits = drop_unscored(lexical_hits);

        let mut merged = match self.strategy {
            MergeStrategy::Raw => dedupe(vector_hits.into_iter().chain(lexical_hits)),
            MergeStrategy::Rrf { k } => fuse(vector_hits, lexical_hits, k),
        };

        // Stable: equal keys keep arrival order
        merged.sort_by(compare_hits);
        merged.truncate(self.top_k);

        tracing::debug!(
            strategy = ?self.strategy,
            merged = merged.len(),
            "Merged retrieval results"
        );

        merged
    }
}

fn compare_hits(a: &Hit, b: &Hit) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.origin.priority().cmp(&b.origin.priority()))
}

fn drop_unscored(hits: Vec<Hit>) -> Vec<Hit> {
    hits.into_iter()
        .filter(|hit| {
            let finite = hit.score.is_finite();
            if !finite {
                tracing::warn!(
                    locator = %hit.metadata.label(),
                    origin = %hit.origin,
                    "Dropping hit with non-finite score"
                );
            }
            finite
        })
        .collect()
}

type Locator = (String, u32);

fn locator(hit: &Hit) -> Locator {
    (hit.metadata.source_file.clone(), hit.metadata.page_number)
}

/// Keep the first hit per locator.
fn dedupe(hits: impl Iterator<Item = Hit>) -> Vec<Hit> {
    let mut seen: HashSet<Locator> = HashSet::new();
    hits.filter(|hit| seen.insert(locator(hit))).collect()
}

/// Reciprocal rank fusion: each list adds `1 / (k + rank)` to a locator,
/// with 1-based ranks taken after per-list deduplication.
fn fuse(vector_hits: Vec<Hit>, lexical_hits: Vec<Hit>, k: u32) -> Vec<Hit> {
    let mut fused: Vec<Hit> = Vec::new();
    let mut slots: HashMap<Locator, usize> = HashMap::new();

    for list in [vector_hits, lexical_hits] {
        for (rank, hit) in dedupe(list.into_iter()).into_iter().enumerate() {
            let rrf = 1.0 / (k as f64 + (rank + 1) as f64);
            match slots.get(&locator(&hit)) {
                Some(&slot) => fused[slot].score += rrf,
                None => {
                    slots.insert(locator(&hit), fused.len());
                    fused.push(Hit { score: rrf, ..hit });
                }
            }
        }
    }

    fused
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocMetadata, HitOrigin};

    fn hit(file: &str, page: u32, score: f64, origin: HitOrigin) -> Hit {
        Hit::new(
            format!("{file} page {page} via {origin}"),
            DocMetadata::new(file, page),
            score,
            origin,
        )
    }

    fn labels(hits: &[Hit]) -> Vec<String> {
        hits.iter().map(|h| h.label(true)).collect()
    }

    #[test]
    fn test_raw_merge_sorts_on_raw_scores() {
        let merger = HybridMerger::new(MergeStrategy::Raw, 10);
        let merged = merger.merge(
            vec![hit("a.pdf", 1, 0.82, HitOrigin::Vector), hit("b.pdf", 1, 0.40, HitOrigin::Vector)],
            vec![hit("c.pdf", 2, 3.1, HitOrigin::Lexical), hit("d.pdf", 5, 0.5, HitOrigin::Lexical)],
        );

        assert_eq!(
            labels(&merged),
            vec!["c.pdf p.2 [bm25]", "a.pdf p.1 [vector]", "d.pdf p.5 [bm25]", "b.pdf p.1 [vector]"]
        );
    }

    #[test]
    fn test_dedupe_keeps_vector_hit_even_when_lexical_scores_higher() {
        let merger = HybridMerger::new(MergeStrategy::Raw, 10);
        let merged = merger.merge(
            vec![hit("a.pdf", 3, 0.3, HitOrigin::Vector)],
            vec![hit("a.pdf", 3, 7.5, HitOrigin::Lexical)],
        );

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].origin, HitOrigin::Vector);
        assert_eq!(merged[0].score, 0.3);
    }

    #[test]
    fn test_dedupe_within_one_origin_keeps_first() {
        let merger = HybridMerger::new(MergeStrategy::Raw, 10);
        let first = hit("a.pdf", 1, 0.5, HitOrigin::Lexical);
        let mut second = hit("a.pdf", 1, 0.9, HitOrigin::Lexical);
        second.text = "overlapping chunk".to_string();

        let merged = merger.merge(vec![], vec![first.clone(), second]);
        assert_eq!(merged, vec![first]);
    }

    #[test]
    fn test_equal_scores_prefer_vector_then_arrival() {
        let merger = HybridMerger::new(MergeStrategy::Raw, 10);
        let merged = merger.merge(
            vec![hit("v1.pdf", 1, 1.0, HitOrigin::Vector), hit("v2.pdf", 1, 1.0, HitOrigin::Vector)],
            vec![hit("l1.pdf", 1, 1.0, HitOrigin::Lexical), hit("l2.pdf", 1, 2.0, HitOrigin::Lexical)],
        );

        assert_eq!(
            labels(&merged),
            vec!["l2.pdf p.1 [bm25]", "v1.pdf p.1 [vector]", "v2.pdf p.1 [vector]", "l1.pdf p.1 [bm25]"]
        );
    }

    #[test]
    fn test_truncates_after_sorting() {
        let merger = HybridMerger::new(MergeStrategy::Raw, 2);
        let merged = merger.merge(
            vec![hit("a.pdf", 1, 0.1, HitOrigin::Vector)],
            vec![hit("b.pdf", 1, 5.0, HitOrigin::Lexical), hit("c.pdf", 1, 4.0, HitOrigin::Lexical)],
        );

        assert_eq!(labels(&merged), vec!["b.pdf p.1 [bm25]", "c.pdf p.1 [bm25]"]);
    }

    #[test]
    fn test_non_finite_scores_are_dropped() {
        let merger = HybridMerger::new(MergeStrategy::Raw, 10);
        let merged = merger.merge(
            vec![hit("a.pdf", 1, f64::NAN, HitOrigin::Vector)],
            vec![
                hit("a.pdf", 1, 2.0, HitOrigin::Lexical),
                hit("b.pdf", 1, f64::INFINITY, HitOrigin::Lexical),
            ],
        );

        // The NaN vector hit no longer shadows the lexical one
        assert_eq!(labels(&merged), vec!["a.pdf p.1 [bm25]"]);
    }

    #[test]
    fn test_empty_inputs() {
        let merger = HybridMerger::new(MergeStrategy::Raw, 4);
        assert!(merger.merge(vec![], vec![]).is_empty());
    }

    #[test]
    fn test_rrf_rewards_agreement() {
        let merger = HybridMerger::new(MergeStrategy::rrf(), 10);
        let merged = merger.merge(
            vec![hit("a.pdf", 1, 0.9, HitOrigin::Vector), hit("b.pdf", 1, 0.8, HitOrigin::Vector)],
            vec![hit("b.pdf", 1, 12.0, HitOrigin::Lexical), hit("c.pdf", 1, 9.0, HitOrigin::Lexical)],
        );

        assert_eq!(
            labels(&merged),
            vec!["b.pdf p.1 [vector]", "a.pdf p.1 [vector]", "c.pdf p.1 [bm25]"]
        );

        let expected_b = 1.0 / 62.0 + 1.0 / 61.0;
        assert!((merged[0].score - expected_b).abs() < 1e-12);
        assert!((merged[1].score - 1.0 / 61.0).abs() < 1e-12);
    }

    #[test]
    fn test_rrf_ties_prefer_vector() {
        let merger = HybridMerger::new(MergeStrategy::Rrf { k: 10 }, 10);
        let merged = merger.merge(
            vec![hit("a.pdf", 1, 0.2, HitOrigin::Vector)],
            vec![hit("b.pdf", 1, 30.0, HitOrigin::Lexical)],
        );

        assert_eq!(labels(&merged), vec!["a.pdf p.1 [vector]", "b.pdf p.1 [bm25]"]);
    }
}

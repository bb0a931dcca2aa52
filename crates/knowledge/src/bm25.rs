//! BM25 lexical scoring over the inverted index.
//!
//! The normalized term frequency adds `delta` to the frequency in the
//! numerator, `(f + δ)(k1 + 1) / (f + k1(1 - b + b·dl/avgdl))`. Canonical
//! BM25+ adds `δ` to the whole term weight instead. Existing indexes were
//! ranked with the in-numerator form, so it is kept as is.

use crate::index::LexicalIndex;
use crate::tokenizer::tokenize;
use crate::types::Hit;
use citerag_core::Bm25Params;
use std::collections::HashMap;

/// Inverse document frequency, `ln(1 + (N - df + 0.5) / (df + 0.5))`.
///
/// Never negative, even for tokens present in every document.
pub fn idf(n: usize, df: u32) -> f64 {
    let n = n as f64;
    let df = df as f64;
    (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
}

/// Length-normalized term frequency.
pub fn normalized_tf(f: u32, doc_len: usize, avgdl: f64, params: &Bm25Params) -> f64 {
    let f = f as f64;
    let length_ratio = if avgdl > 0.0 { doc_len as f64 / avgdl } else { 0.0 };
    (f + params.delta) * (params.k1 + 1.0)
        / (f + params.k1 * (1.0 - params.b + params.b * length_ratio))
}

/// Scores documents against a query with BM25.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bm25Scorer {
    params: Bm25Params,
}

impl Bm25Scorer {
    /// Create a scorer with explicit hyperparameters.
    pub fn new(params: Bm25Params) -> Self {
        Self { params }
    }

    /// Hyperparameters in use.
    pub fn params(&self) -> &Bm25Params {
        &self.params
    }

    /// Score every document sharing at least one token with the query.
    ///
    /// Returns document positions mapped to their summed score; only
    /// strictly positive totals are kept. A token repeated in the query
    /// contributes once per occurrence.
    pub fn score(&self, query_tokens: &[String], index: &LexicalIndex) -> HashMap<usize, f64> {
        let n = index.len();
        let avgdl = index.avgdl();
        let mut scores: HashMap<usize, f64> = HashMap::new();

        for token in query_tokens {
            let postings = index.postings(token);
            if postings.is_empty() {
                continue;
            }

            let idf = idf(n, index.df(token));
            for posting in postings {
                let norm = normalized_tf(posting.tf, index.doc_len(posting.doc), avgdl, &self.params);
                *scores.entry(posting.doc).or_insert(0.0) += idf * norm;
            }
        }

        scores.retain(|_, score| *score > 0.0);
        scores
    }

    /// The `top_k` documents for `query`, as `(doc id, score)`.
    ///
    /// Sorted by score descending; equal scores are ordered by document id
    /// so results are stable across runs.
    pub fn rank(&self, query: &str, index: &LexicalIndex, top_k: usize) -> Vec<(usize, f64)> {
        let tokens = tokenize(query);
        let mut ranked: Vec<(usize, f64)> = self.score(&tokens, index).into_iter().collect();

        ranked.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| index.id(a.0).cmp(index.id(b.0)))
        });
        ranked.truncate(top_k);

        tracing::debug!(
            query_tokens = tokens.len(),
            candidates = ranked.len(),
            top_score = ranked.first().map(|(_, s)| *s),
            "BM25 ranking complete"
        );

        ranked
    }

    /// The `top_k` documents for `query` as lexical hits.
    pub fn search(&self, query: &str, index: &LexicalIndex, top_k: usize) -> Vec<Hit> {
        self.rank(query, index, top_k)
            .into_iter()
            .map(|(doc, score)| index.hit(doc, score))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocMetadata, Document, HitOrigin};

    fn doc(id: &str, text: &str) -> Document {
        Document::new(id, text, DocMetadata::new("t.pdf", 1))
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_idf_values() {
        assert!(approx(idf(3, 1), (1.0f64 + 2.5 / 1.5).ln()));
        // Token in every document still scores positive
        assert!(idf(3, 3) > 0.0);
        assert!(idf(10, 1) > idf(10, 5));
    }

    #[test]
    fn test_normalized_tf_at_average_length() {
        let params = Bm25Params::default();
        // dl == avgdl: (1 + 1)(2.5) / (1 + 1.5) = 2.0
        assert!(approx(normalized_tf(1, 4, 4.0, &params), 2.0));
    }

    #[test]
    fn test_only_documents_with_query_tokens_are_scored() {
        let index = LexicalIndex::build(&[
            doc("a", "vector search engines"),
            doc("b", "lexical search engines"),
            doc("c", "cooking pasta recipes"),
        ])
        .unwrap();

        let scores = Bm25Scorer::default().score(&tokenize("lexical search"), &index);
        assert_eq!(scores.len(), 2);
        assert!(scores.contains_key(&0));
        assert!(scores.contains_key(&1));
        assert!(scores[&1] > scores[&0]);
    }

    #[test]
    fn test_no_overlap_yields_nothing() {
        let index = LexicalIndex::build(&[doc("a", "vector search engines")]).unwrap();
        assert!(Bm25Scorer::default().search("pasta", &index, 5).is_empty());
        assert!(Bm25Scorer::default().search("", &index, 5).is_empty());
    }

    #[test]
    fn test_ties_broken_by_id() {
        let index = LexicalIndex::build(&[
            doc("zeta", "shared token here"),
            doc("alpha", "shared token here"),
            doc("mid", "shared token here"),
        ])
        .unwrap();

        let ranked = Bm25Scorer::default().rank("shared", &index, 3);
        let ids: Vec<&str> = ranked.iter().map(|(d, _)| index.id(*d)).collect();
        assert_eq!(ids, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_top_k_truncates() {
        let index = LexicalIndex::build(&[
            doc("1", "graph graph graph"),
            doc("2", "graph graph nodes"),
            doc("3", "graph nodes edges"),
        ])
        .unwrap();

        let hits = Bm25Scorer::default().search("graph", &index, 2);
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.origin == HitOrigin::Lexical));
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn test_repeated_query_token_counts_twice() {
        let index = LexicalIndex::build(&[doc("a", "rust memory"), doc("b", "python")]).unwrap();
        let scorer = Bm25Scorer::default();

        let once = scorer.score(&tokenize("rust"), &index)[&0];
        let twice = scorer.score(&tokenize("rust rust"), &index)[&0];
        assert!(approx(twice, 2.0 * once));
    }

    #[test]
    fn test_monotonic_in_term_frequency() {
        // Same length, increasing occurrences of "kernel"
        let index = LexicalIndex::build(&[
            doc("f1", "kernel alpha beta gamma"),
            doc("f2", "kernel kernel beta gamma"),
            doc("f3", "kernel kernel kernel gamma"),
            doc("f4", "kernel kernel kernel kernel"),
            doc("x", "unrelated words only here"),
        ])
        .unwrap();

        let scores = Bm25Scorer::default().score(&tokenize("kernel"), &index);
        for doc in 1..4 {
            assert!(scores[&doc] >= scores[&(doc - 1)], "f{} < f{}", doc + 1, doc);
        }
    }

    #[test]
    fn test_monotonic_for_any_parameters() {
        let grid = [(0.0, 0.0, 0.0), (1.2, 0.75, 0.0), (1.5, 0.75, 1.0), (2.0, 1.0, 0.5)];
        for (k1, b, delta) in grid {
            let params = Bm25Params { k1, b, delta };
            let mut last = f64::MIN;
            for f in 1..20 {
                let value = normalized_tf(f, 20, 12.5, &params);
                assert!(value >= last - 1e-12, "k1={k1} b={b} delta={delta} f={f}");
                last = value;
            }
        }
    }

    #[test]
    fn test_in_numerator_delta_on_very_short_documents() {
        // k1(1 - b + b·dl/avgdl) = 0.4875 < δ: more occurrences score lower
        let params = Bm25Params::default();
        assert!(normalized_tf(2, 2, 20.0, &params) < normalized_tf(1, 2, 20.0, &params));
    }
}

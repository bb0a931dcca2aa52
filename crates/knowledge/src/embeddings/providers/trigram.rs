//! Offline embedding provider built from character trigrams.

use crate::embeddings::provider::EmbeddingProvider;
use crate::tokenizer::tokenize;
use citerag_core::AppResult;
use std::collections::HashMap;

const STOP_WORDS: &[&str] = &[
    "the", "and", "are", "was", "were", "for", "but", "with", "from", "this", "that", "have",
    "has", "had", "its", "their", "they", "them", "which",
];

/// Deterministic hashed embeddings for offline use.
///
/// Each distinct word adds its character trigrams and the word itself into
/// hashed dimensions, and the vector is scaled to unit length. Texts that
/// share vocabulary land close together; nothing here is semantic.
#[derive(Debug)]
pub struct TrigramProvider {
    dimensions: usize,
}

impl TrigramProvider {
    /// Create a new trigram provider with specified dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];

        let mut word_freq: HashMap<String, u32> = HashMap::new();
        for word in tokenize(text) {
            if !STOP_WORDS.contains(&word.as_str()) {
                *word_freq.entry(word).or_insert(0) += 1;
            }
        }

        for (word, freq) in &word_freq {
            let chars: Vec<char> = word.chars().collect();
            for trigram in chars.windows(3) {
                let slot = self.slot(trigram.iter().map(|&c| c as u64), 37);
                embedding[slot] += (*freq as f32).sqrt();
            }

            let slot = self.slot(word.bytes().map(u64::from), 31);
            embedding[slot] += *freq as f32;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }

    fn slot(&self, units: impl Iterator<Item = u64>, multiplier: u64) -> usize {
        let hash = units.fold(0u64, |acc, unit| acc.wrapping_mul(multiplier).wrapping_add(unit));
        (hash % self.dimensions as u64) as usize
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for TrigramProvider {
    fn provider_name(&self) -> &str {
        "trigram"
    }

    fn model_name(&self) -> &str {
        "trigram-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

//! Embedding capability consumed by the memory system
//!
//! The core never generates embeddings itself; it consumes them through
//! the `Embedder` trait, selected at construction time. `HashEmbedder` is
//! a deterministic local implementation good enough for tests, the CLI,
//! and offline use.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::error::Result;

/// Text-to-vector capability. Implementations must produce vectors of a
/// fixed dimension matching the store they feed.
pub trait Embedder: Send {
    /// Dimensionality of the vectors this embedder produces.
    fn dimension(&self) -> usize;

    /// Embed a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts. The default calls `embed` in sequence;
    /// override for backends with native batching.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Deterministic feature-hashing embedder.
///
/// Character trigrams of the lowercased text are hashed into buckets with
/// a sign bit, and the resulting vector is L2-normalized. Texts sharing
/// many trigrams land near each other; the output for a given text never
/// changes between runs.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Embedder for HashEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];
        let chars: Vec<char> = text.to_lowercase().chars().collect();

        if chars.len() < 3 {
            if !chars.is_empty() {
                accumulate(&mut vector, &chars);
            }
        } else {
            for trigram in chars.windows(3) {
                accumulate(&mut vector, trigram);
            }
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        Ok(vector)
    }
}

fn accumulate(vector: &mut [f32], feature: &[char]) {
    let mut hasher = DefaultHasher::new();
    feature.hash(&mut hasher);
    let hash = hasher.finish();

    let bucket = (hash % vector.len() as u64) as usize;
    let sign = if hash & (1u64 << 63) == 0 { 1.0 } else { -1.0 };
    vector[bucket] += sign;
}

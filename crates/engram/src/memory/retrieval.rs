//! Composite scoring and ranking for retrieval results
//!
//! Raw vector hits are reranked by a weighted combination of similarity,
//! recency, and importance. Ranking is fully deterministic: equal scores
//! fall back to ascending record id, and a hit whose score cannot be
//! computed degrades to raw-distance ordering behind the scored hits
//! instead of failing the query.

use chrono::{DateTime, Utc};

use crate::error::{EngramError, Result};
use crate::memory::types::{DEFAULT_IMPORTANCE, MemoryRecord};

/// Cap on the oversampled candidate pool per partition.
pub const OVERSAMPLE_LIMIT: usize = 20;

/// Candidate pool size for a query asking for `k` results.
pub fn oversample(k: usize) -> usize {
    (2 * k).min(OVERSAMPLE_LIMIT)
}

/// Weights of the three ranking signals. Must be non-negative and sum
/// to 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub similarity: f32,
    pub recency: f32,
    pub importance: f32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            similarity: 0.6,
            recency: 0.2,
            importance: 0.2,
        }
    }
}

impl ScoringWeights {
    pub fn validate(&self) -> Result<()> {
        let weights = [self.similarity, self.recency, self.importance];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(EngramError::Config(
                "scoring weights must be finite and non-negative".to_string(),
            ));
        }
        let sum: f32 = weights.iter().sum();
        if (sum - 1.0).abs() > 1e-3 {
            return Err(EngramError::Config(format!(
                "scoring weights must sum to 1.0, got {sum}"
            )));
        }
        Ok(())
    }
}

/// A retrieved record with its score breakdown.
#[derive(Debug, Clone)]
pub struct RetrievedMemory {
    pub record: MemoryRecord,
    /// Squared Euclidean distance from the query embedding
    pub distance: f32,
    /// Similarity signal, `1 / (1 + distance)`
    pub similarity: f32,
    /// Recency signal, `1 / (1 + age_hours / 24)`
    pub recency: f32,
    /// Weighted composite used for ranking
    pub score: f32,
}

impl RetrievedMemory {
    pub fn new(
        record: MemoryRecord,
        distance: f32,
        weights: &ScoringWeights,
        now: DateTime<Utc>,
    ) -> Self {
        let similarity = similarity_from_distance(distance);
        let recency = recency_score(record.timestamp, now);
        let importance = importance_score(record.importance);
        let score = weights.similarity * similarity
            + weights.recency * recency
            + weights.importance * importance;

        Self {
            record,
            distance,
            similarity,
            recency,
            score,
        }
    }
}

/// Map a raw distance into (0, 1], monotonically decreasing.
pub fn similarity_from_distance(distance: f32) -> f32 {
    if distance.is_finite() && distance >= 0.0 {
        1.0 / (1.0 + distance)
    } else {
        f32::NAN
    }
}

/// Newer records score closer to 1, decaying with age; a day-old record
/// scores 0.5. Future-dated timestamps clamp to age zero.
pub fn recency_score(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> f32 {
    let age_hours = (now - timestamp).num_seconds().max(0) as f32 / 3600.0;
    1.0 / (1.0 + age_hours / 24.0)
}

/// Stored importance, defaulting when the stored value is unusable.
pub fn importance_score(importance: f32) -> f32 {
    if importance.is_finite() {
        importance.clamp(0.0, 1.0)
    } else {
        DEFAULT_IMPORTANCE
    }
}

/// Order results by descending score, ties by ascending record id, and
/// truncate to `k`. Hits with a non-finite score are appended after the
/// scored ones, ordered by ascending raw distance.
pub fn rank(results: Vec<RetrievedMemory>, k: usize) -> Vec<RetrievedMemory> {
    let (mut scored, mut degraded): (Vec<_>, Vec<_>) = results
        .into_iter()
        .partition(|r| r.score.is_finite());

    scored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.record.id.cmp(&b.record.id))
    });
    degraded.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.record.id.cmp(&b.record.id))
    });

    scored.extend(degraded);
    scored.truncate(k);
    scored
}

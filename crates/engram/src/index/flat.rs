//! Exact nearest-neighbor index over memory embeddings
//!
//! A flat linear-scan structure: every query compares against every stored
//! vector with squared Euclidean distance. The index knows nothing about the
//! record store; it is a pure geometric structure keyed by externally
//! assigned ids, with no removal. Eviction is handled by rebuilding a fresh
//! index from the store.

use crate::error::{EngramError, Result};
use crate::memory::types::MemoryId;

/// A single search result: record id plus squared Euclidean distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub id: MemoryId,
    pub distance: f32,
}

/// Exact linear-scan vector index.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimension: usize,
    ids: Vec<MemoryId>,
    vectors: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ids: Vec::new(),
            vectors: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Ids in insertion order.
    pub fn ids(&self) -> &[MemoryId] {
        &self.ids
    }

    /// Add a vector keyed by a record id.
    pub fn add(&mut self, id: MemoryId, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(EngramError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        self.ids.push(id);
        self.vectors.extend_from_slice(vector);
        Ok(())
    }

    /// Return up to `k` hits ordered by ascending distance.
    ///
    /// Ties are broken by insertion order (the sort is stable and vectors
    /// are scanned in the order they were added).
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dimension {
            return Err(EngramError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if k == 0 || self.ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<SearchHit> = self
            .ids
            .iter()
            .enumerate()
            .map(|(position, &id)| {
                let start = position * self.dimension;
                let vector = &self.vectors[start..start + self.dimension];
                SearchHit {
                    id,
                    distance: squared_l2(query, vector),
                }
            })
            .collect();

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        Ok(hits)
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_orders_by_distance() {
        let mut index = FlatIndex::new(2);
        index.add(1, &[0.0, 3.0]).unwrap();
        index.add(2, &[0.0, 1.0]).unwrap();
        index.add(3, &[0.0, 2.0]).unwrap();

        let hits = index.search(&[0.0, 0.0], 3).unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert!((hits[0].distance - 1.0).abs() < 1e-6);
        assert!((hits[1].distance - 4.0).abs() < 1e-6);
        assert!((hits[2].distance - 9.0).abs() < 1e-6);
    }

    #[test]
    fn test_ties_break_by_insertion_order() {
        let mut index = FlatIndex::new(2);
        index.add(9, &[1.0, 0.0]).unwrap();
        index.add(4, &[0.0, 1.0]).unwrap();
        index.add(6, &[-1.0, 0.0]).unwrap();

        let hits = index.search(&[0.0, 0.0], 3).unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![9, 4, 6], "equidistant hits keep insertion order");
    }

    #[test]
    fn test_search_truncates_to_k() {
        let mut index = FlatIndex::new(1);
        for i in 0..10 {
            index.add(i, &[i as f32]).unwrap();
        }

        let hits = index.search(&[0.0], 3).unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn test_search_with_k_larger_than_index() {
        let mut index = FlatIndex::new(1);
        index.add(1, &[1.0]).unwrap();

        let hits = index.search(&[0.0], 10).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_empty_index_returns_no_hits() {
        let index = FlatIndex::new(3);
        let hits = index.search(&[0.0, 0.0, 0.0], 5).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_add_rejects_wrong_dimension() {
        let mut index = FlatIndex::new(3);
        let err = index.add(1, &[0.0, 0.0]).unwrap_err();
        assert!(matches!(
            err,
            crate::error::EngramError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert!(index.is_empty());
    }

    #[test]
    fn test_search_rejects_wrong_dimension() {
        let mut index = FlatIndex::new(3);
        index.add(1, &[0.0, 0.0, 0.0]).unwrap();
        assert!(index.search(&[0.0], 1).is_err());
    }
}

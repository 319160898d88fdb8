//! Test utilities for engram
//!
//! Helpers for integration tests that need to manipulate record ages or
//! craft predictable embeddings.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::memory::system::MemorySystem;
use crate::memory::types::MemoryId;
use crate::storage::sqlite::SqliteStore;

/// Rewrite a record's last-accessed time, bypassing the normal
/// touch-on-read path. Only useful for aging records in tests.
pub fn backdate_last_accessed(
    store: &mut SqliteStore,
    id: MemoryId,
    at: DateTime<Utc>,
) -> Result<()> {
    store.set_last_accessed(id, at)
}

/// Rewrite a record's creation time for recency-scoring tests.
pub fn backdate_timestamp(store: &mut SqliteStore, id: MemoryId, at: DateTime<Utc>) -> Result<()> {
    store.set_timestamp(id, at)
}

/// Same as [`backdate_last_accessed`], going through a system facade.
pub fn backdate_system_last_accessed(
    system: &mut MemorySystem,
    id: MemoryId,
    at: DateTime<Utc>,
) -> Result<()> {
    system.store_mut().set_last_accessed(id, at)
}

/// Same as [`backdate_timestamp`], going through a system facade.
pub fn backdate_system_timestamp(
    system: &mut MemorySystem,
    id: MemoryId,
    at: DateTime<Utc>,
) -> Result<()> {
    system.store_mut().set_timestamp(id, at)
}

/// A unit vector along one axis. Distances between basis embeddings are
/// exact, which makes ranking assertions precise.
pub fn basis_embedding(dimension: usize, axis: usize) -> Vec<f32> {
    let mut vector = vec![0.0; dimension];
    vector[axis % dimension] = 1.0;
    vector
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basis_embedding() {
        let vector = basis_embedding(4, 1);
        assert_eq!(vector, vec![0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_basis_embedding_wraps_axis() {
        let vector = basis_embedding(3, 4);
        assert_eq!(vector, vec![0.0, 1.0, 0.0]);
    }
}

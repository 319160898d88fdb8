//! Index snapshots and store/index synchronization
//!
//! The live index is an immutable snapshot behind an atomically swapped
//! reference. Readers always observe a complete snapshot, either the one
//! from before a rebuild or the one after it. `rebuild` enforces the
//! invariant that the indexed id set equals the store's set of active
//! (embedding-present) record ids.

use std::collections::BTreeSet;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::Result;
use crate::index::flat::{FlatIndex, SearchHit};
use crate::memory::types::{MemoryId, MemoryType};
use crate::storage::sqlite::SqliteStore;

/// The two search pools the memory space is split into.
///
/// Long-term records get their own pool; everything else shares the
/// short-term pool. Queries search both and merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    ShortTerm,
    LongTerm,
}

impl Partition {
    pub const ALL: [Partition; 2] = [Partition::ShortTerm, Partition::LongTerm];

    pub fn of(memory_type: MemoryType) -> Self {
        match memory_type {
            MemoryType::LongTerm => Partition::LongTerm,
            _ => Partition::ShortTerm,
        }
    }
}

/// One generation of the index: a flat index per partition.
#[derive(Debug, Clone)]
pub struct IndexSet {
    generation: u64,
    short_term: FlatIndex,
    long_term: FlatIndex,
}

impl IndexSet {
    fn new(dimension: usize, generation: u64) -> Self {
        Self {
            generation,
            short_term: FlatIndex::new(dimension),
            long_term: FlatIndex::new(dimension),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn partition(&self, partition: Partition) -> &FlatIndex {
        match partition {
            Partition::ShortTerm => &self.short_term,
            Partition::LongTerm => &self.long_term,
        }
    }

    fn add(&mut self, memory_type: MemoryType, id: MemoryId, vector: &[f32]) -> Result<()> {
        match Partition::of(memory_type) {
            Partition::ShortTerm => self.short_term.add(id, vector),
            Partition::LongTerm => self.long_term.add(id, vector),
        }
    }

    pub fn len(&self) -> usize {
        self.short_term.len() + self.long_term.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All indexed ids, across both partitions.
    pub fn ids(&self) -> BTreeSet<MemoryId> {
        self.short_term
            .ids()
            .iter()
            .chain(self.long_term.ids().iter())
            .copied()
            .collect()
    }

    /// Search every partition and collect the raw hits.
    pub fn search_all(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let mut hits = Vec::new();
        for partition in Partition::ALL {
            hits.extend(self.partition(partition).search(query, k)?);
        }
        Ok(hits)
    }
}

/// Maintains the live index snapshot and keeps it consistent with the store.
pub struct IndexSynchronizer {
    live: RwLock<Arc<IndexSet>>,
    dimension: usize,
}

impl IndexSynchronizer {
    pub fn new(dimension: usize) -> Self {
        Self {
            live: RwLock::new(Arc::new(IndexSet::new(dimension, 0))),
            dimension,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// The current snapshot. Holders keep a consistent view even across a
    /// concurrent rebuild.
    pub fn snapshot(&self) -> Arc<IndexSet> {
        Arc::clone(&self.read_live())
    }

    /// Add a freshly inserted record to the live index.
    ///
    /// Copy-on-write: outstanding snapshots are unaffected.
    pub fn insert(&self, memory_type: MemoryType, id: MemoryId, vector: &[f32]) -> Result<()> {
        let mut guard = self.write_live();
        Arc::make_mut(&mut *guard).add(memory_type, id, vector)
    }

    /// Rebuild the index from the store's active records and swap it in.
    ///
    /// Records are inserted in ascending id order so two rebuilds over the
    /// same store contents produce identical indexes. Returns the number of
    /// indexed entries.
    pub fn rebuild(&self, store: &SqliteStore) -> Result<usize> {
        let mut records = store.list_active()?;
        records.sort_by_key(|record| record.id);

        let generation = self.read_live().generation() + 1;
        let mut next = IndexSet::new(self.dimension, generation);
        for record in &records {
            if let Some(embedding) = &record.embedding {
                next.add(record.memory_type, record.id, embedding)?;
            }
        }

        let entries = next.len();
        *self.write_live() = Arc::new(next);
        tracing::debug!(generation, entries, "rebuilt vector index");
        Ok(entries)
    }

    fn read_live(&self) -> RwLockReadGuard<'_, Arc<IndexSet>> {
        match self.live.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_live(&self) -> RwLockWriteGuard<'_, Arc<IndexSet>> {
        match self.live.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_of_memory_type() {
        assert_eq!(Partition::of(MemoryType::LongTerm), Partition::LongTerm);
        assert_eq!(Partition::of(MemoryType::ShortTerm), Partition::ShortTerm);
        assert_eq!(Partition::of(MemoryType::Episodic), Partition::ShortTerm);
        assert_eq!(Partition::of(MemoryType::Reflective), Partition::ShortTerm);
    }

    #[test]
    fn test_insert_routes_to_partition() {
        let sync = IndexSynchronizer::new(2);
        sync.insert(MemoryType::LongTerm, 1, &[0.0, 0.0]).unwrap();
        sync.insert(MemoryType::Episodic, 2, &[1.0, 1.0]).unwrap();

        let snapshot = sync.snapshot();
        assert_eq!(snapshot.partition(Partition::LongTerm).len(), 1);
        assert_eq!(snapshot.partition(Partition::ShortTerm).len(), 1);
        assert_eq!(snapshot.ids().len(), 2);
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_inserts() {
        let sync = IndexSynchronizer::new(1);
        sync.insert(MemoryType::ShortTerm, 1, &[0.5]).unwrap();

        let before = sync.snapshot();
        sync.insert(MemoryType::ShortTerm, 2, &[0.7]).unwrap();

        assert_eq!(before.len(), 1, "existing snapshot must not change");
        assert_eq!(sync.snapshot().len(), 2);
    }

    #[test]
    fn test_search_all_merges_partitions() {
        let sync = IndexSynchronizer::new(1);
        sync.insert(MemoryType::LongTerm, 1, &[0.1]).unwrap();
        sync.insert(MemoryType::ShortTerm, 2, &[0.2]).unwrap();

        let hits = sync.snapshot().search_all(&[0.0], 5).unwrap();
        let ids: BTreeSet<_> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, BTreeSet::from([1, 2]));
    }
}

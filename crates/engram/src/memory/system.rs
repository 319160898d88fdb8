//! The memory system facade
//!
//! Composes the record store, the index synchronizer, the compression
//! manager, and the reranker behind the operation set consumed by the
//! orchestration layer: store, retrieve, compress, list, profiles.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use serde_json::{Map, Value};

use crate::config::EngramConfig;
use crate::embedding::Embedder;
use crate::error::{EngramError, Result};
use crate::index::sync::IndexSynchronizer;
use crate::memory::retrieval::{RetrievedMemory, ScoringWeights, oversample, rank};
use crate::memory::types::{
    CompressionLogEntry, MemoryDraft, MemoryId, MemoryRecord, MemoryType, UserProfile,
};
use crate::storage::eviction::{CompressionReport, Compressor};
use crate::storage::sqlite::SqliteStore;

/// Counts reported by [`MemorySystem::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemStats {
    pub total_records: usize,
    pub active_records: usize,
    pub tombstoned_records: usize,
    pub indexed_entries: usize,
    pub index_generation: u64,
}

/// Hybrid memory system: durable record store plus derived vector index.
pub struct MemorySystem {
    store: SqliteStore,
    index: IndexSynchronizer,
    weights: ScoringWeights,
    inactivity_window: Duration,
    embedder: Option<Box<dyn Embedder>>,
}

impl MemorySystem {
    /// Open the system at the configured location, creating the store if
    /// needed and rebuilding the index from whatever it already holds.
    pub fn open(config: EngramConfig) -> Result<Self> {
        config.validate()?;
        let store = SqliteStore::open(&config.storage.db_path(), config.storage.dimension)?;
        Self::from_store(store, &config)
    }

    /// In-memory system, used by tests and throwaway sessions.
    pub fn open_in_memory(config: EngramConfig) -> Result<Self> {
        config.validate()?;
        let store = SqliteStore::open_in_memory(config.storage.dimension)?;
        Self::from_store(store, &config)
    }

    fn from_store(store: SqliteStore, config: &EngramConfig) -> Result<Self> {
        let index = IndexSynchronizer::new(store.dimension());
        index.rebuild(&store)?;
        Ok(Self {
            store,
            index,
            weights: config.retrieval.weights(),
            inactivity_window: Duration::days(config.compression.inactivity_days),
            embedder: None,
        })
    }

    /// Attach the embedding capability used by the text ingestion paths.
    /// Selected once, at construction.
    pub fn with_embedder(mut self, embedder: Box<dyn Embedder>) -> Result<Self> {
        if embedder.dimension() != self.store.dimension() {
            return Err(EngramError::DimensionMismatch {
                expected: self.store.dimension(),
                actual: embedder.dimension(),
            });
        }
        self.embedder = Some(embedder);
        Ok(self)
    }

    pub fn dimension(&self) -> usize {
        self.store.dimension()
    }

    /// Store a new memory. When the draft carries no embedding the
    /// configured embedder generates one from the content.
    pub fn store(&mut self, mut draft: MemoryDraft) -> Result<MemoryId> {
        if draft.embedding.is_none() {
            let embedder = self.embedder.as_ref().ok_or_else(|| {
                EngramError::Embedding(
                    "no embedding supplied and no embedder configured".to_string(),
                )
            })?;
            draft.embedding = Some(embedder.embed(&draft.content)?);
        }

        let id = self.store.insert(&draft)?;
        if let Some(embedding) = &draft.embedding {
            self.index.insert(draft.memory_type, id, embedding)?;
        }
        Ok(id)
    }

    /// Store plain text with default draft settings.
    pub fn store_text(&mut self, content: &str, memory_type: MemoryType) -> Result<MemoryId> {
        self.store(MemoryDraft::new(content, memory_type))
    }

    /// Retrieve the `k` most relevant memories for a query embedding.
    ///
    /// Oversamples each partition, merges the raw hits, filters by type if
    /// requested, reranks by the composite score, truncates to `k`, and
    /// refreshes last-accessed for everything returned. An empty store
    /// yields an empty result, not an error.
    pub fn retrieve(
        &mut self,
        query_embedding: &[f32],
        k: usize,
        type_filter: Option<MemoryType>,
    ) -> Result<Vec<RetrievedMemory>> {
        if query_embedding.len() != self.store.dimension() {
            return Err(EngramError::DimensionMismatch {
                expected: self.store.dimension(),
                actual: query_embedding.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let snapshot = self.index.snapshot();
        let hits = snapshot.search_all(query_embedding, oversample(k))?;
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<MemoryId> = hits.iter().map(|hit| hit.id).collect();
        let mut records: HashMap<MemoryId, MemoryRecord> = self
            .store
            .get_many(&ids)?
            .into_iter()
            .map(|record| (record.id, record))
            .collect();

        let now = Utc::now();
        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            let Some(record) = records.remove(&hit.id) else {
                tracing::warn!(id = hit.id, "indexed id missing from store, skipping hit");
                continue;
            };
            if let Some(filter) = type_filter {
                if record.memory_type != filter {
                    continue;
                }
            }
            results.push(RetrievedMemory::new(
                record,
                hit.distance,
                &self.weights,
                now,
            ));
        }

        let results = rank(results, k);

        let returned: Vec<MemoryId> = results.iter().map(|r| r.record.id).collect();
        self.store.touch(&returned)?;

        tracing::debug!(
            requested = k,
            returned = results.len(),
            "retrieved memories"
        );
        Ok(results)
    }

    /// Embed a text query through the configured embedder and retrieve.
    pub fn retrieve_text(
        &mut self,
        query: &str,
        k: usize,
        type_filter: Option<MemoryType>,
    ) -> Result<Vec<RetrievedMemory>> {
        let embedder = self.embedder.as_ref().ok_or_else(|| {
            EngramError::Embedding("no embedder configured for text queries".to_string())
        })?;
        let query_embedding = embedder.embed(query)?;
        self.retrieve(&query_embedding, k, type_filter)
    }

    /// Tombstone low-value records and resynchronize the index.
    pub fn compress(&mut self, threshold: f32) -> Result<CompressionReport> {
        Compressor::new(&mut self.store, &self.index)
            .with_inactivity_window(self.inactivity_window)
            .compress(threshold)
    }

    /// All non-tombstoned records, most recently accessed first.
    pub fn list_active(&self) -> Result<Vec<MemoryRecord>> {
        self.store.list_active()
    }

    pub fn get(&self, id: MemoryId) -> Result<Option<MemoryRecord>> {
        self.store.get(id)
    }

    pub fn update_importance(&mut self, id: MemoryId, value: f32) -> Result<()> {
        self.store.update_importance(id, value)
    }

    pub fn update_user_profile(
        &mut self,
        user_id: &str,
        preferences: &Map<String, Value>,
    ) -> Result<()> {
        self.store.upsert_profile(user_id, preferences)
    }

    pub fn get_user_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        self.store.get_profile(user_id)
    }

    pub fn compression_log(&self) -> Result<Vec<CompressionLogEntry>> {
        self.store.compression_log()
    }

    /// Force a full index rebuild from the store. Returns the number of
    /// indexed entries.
    pub fn rebuild_index(&self) -> Result<usize> {
        self.index.rebuild(&self.store)
    }

    pub fn stats(&self) -> Result<SystemStats> {
        let total_records = self.store.count_total()?;
        let active_records = self.store.count_active()?;
        let snapshot = self.index.snapshot();
        Ok(SystemStats {
            total_records,
            active_records,
            tombstoned_records: total_records - active_records,
            indexed_entries: snapshot.len(),
            index_generation: snapshot.generation(),
        })
    }

    /// The index synchronizer, exposed for invariant checks.
    pub fn index(&self) -> &IndexSynchronizer {
        &self.index
    }

    pub(crate) fn store_mut(&mut self) -> &mut SqliteStore {
        &mut self.store
    }
}

//! Importance/age based compression of the memory store
//!
//! Low-value records are tombstoned in place rather than deleted: their
//! content is replaced by a sentinel, their embedding is cleared, and an
//! audit entry records the reason. After a pass that evicted anything the
//! vector index is rebuilt exactly once.

use chrono::Duration;

use crate::error::Result;
use crate::index::sync::IndexSynchronizer;
use crate::memory::types::EvictionReason;
use crate::storage::sqlite::SqliteStore;

/// Default inactivity window after which unaccessed records become
/// eviction candidates.
pub const DEFAULT_INACTIVITY_DAYS: i64 = 30;

/// Outcome of a compression pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompressionReport {
    /// Total records tombstoned in this pass
    pub evicted: usize,
    /// Evicted because importance fell below the threshold
    pub low_importance: usize,
    /// Evicted because they sat unaccessed past the inactivity window
    pub inactive: usize,
}

/// Applies the eviction policy and keeps the index synchronized afterwards.
pub struct Compressor<'a> {
    store: &'a mut SqliteStore,
    index: &'a IndexSynchronizer,
    inactivity_window: Duration,
}

impl<'a> Compressor<'a> {
    pub fn new(store: &'a mut SqliteStore, index: &'a IndexSynchronizer) -> Self {
        Self {
            store,
            index,
            inactivity_window: Duration::days(DEFAULT_INACTIVITY_DAYS),
        }
    }

    pub fn with_inactivity_window(mut self, window: Duration) -> Self {
        self.inactivity_window = window;
        self
    }

    /// Tombstone every eviction candidate and rebuild the index if any
    /// record was evicted.
    ///
    /// The importance test wins over the inactivity test when both apply.
    /// Repeating a pass with the same threshold evicts nothing further,
    /// because candidate selection excludes tombstoned records.
    pub fn compress(&mut self, threshold: f32) -> Result<CompressionReport> {
        let candidates = self
            .store
            .select_eviction_candidates(threshold, self.inactivity_window)?;

        let mut report = CompressionReport::default();
        for record in &candidates {
            let reason = if record.importance < threshold {
                EvictionReason::LowImportance
            } else {
                EvictionReason::Inactive
            };
            self.store.tombstone(record.id, reason)?;
            match reason {
                EvictionReason::LowImportance => report.low_importance += 1,
                EvictionReason::Inactive => report.inactive += 1,
            }
            report.evicted += 1;
        }

        if report.evicted > 0 {
            self.index.rebuild(self.store)?;
            tracing::info!(
                evicted = report.evicted,
                low_importance = report.low_importance,
                inactive = report.inactive,
                threshold,
                "compression pass complete"
            );
        }

        Ok(report)
    }
}

//! Integration tests for compression/eviction through the facade

use chrono::{Duration, Utc};

use engram::config::EngramConfig;
use engram::memory::types::{EvictionReason, MemoryDraft, MemoryType};
use engram::memory::MemorySystem;
use engram::testing::{backdate_system_last_accessed, basis_embedding};

const DIM: usize = 4;

fn test_system() -> MemorySystem {
    let mut config = EngramConfig::default();
    config.storage.dimension = DIM;
    MemorySystem::open_in_memory(config).unwrap()
}

fn draft(content: &str, importance: f32, axis: usize) -> MemoryDraft {
    MemoryDraft::new(content, MemoryType::ShortTerm)
        .with_importance(importance)
        .with_embedding(basis_embedding(DIM, axis))
}

#[test]
fn test_compress_tombstones_low_importance_record() {
    let mut system = test_system();
    let id = system.store(draft("weak memory", 0.5, 0)).unwrap();

    let report = system.compress(0.8).unwrap();
    assert_eq!(report.evicted, 1);
    assert_eq!(report.low_importance, 1);

    let log = system.compression_log().unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].memory_id, id);
    assert_eq!(log[0].reason, EvictionReason::LowImportance);

    let active = system.list_active().unwrap();
    assert!(
        active.iter().all(|r| r.id != id),
        "tombstoned record must not appear in list_active"
    );

    let record = system.get(id).unwrap().expect("record still exists");
    assert!(record.is_tombstoned());
}

#[test]
fn test_compress_is_idempotent() {
    let mut system = test_system();
    system.store(draft("a", 0.2, 0)).unwrap();
    system.store(draft("b", 0.3, 1)).unwrap();
    system.store(draft("c", 0.9, 2)).unwrap();

    let first = system.compress(0.5).unwrap();
    assert_eq!(first.evicted, 2);

    let second = system.compress(0.5).unwrap();
    assert_eq!(second.evicted, 0, "same threshold evicts nothing new");
    assert_eq!(system.compression_log().unwrap().len(), 2);
}

#[test]
fn test_compress_without_candidates_skips_rebuild() {
    let mut system = test_system();
    system.store(draft("sturdy", 0.9, 0)).unwrap();

    let generation_before = system.stats().unwrap().index_generation;
    let report = system.compress(0.5).unwrap();

    assert_eq!(report.evicted, 0);
    assert_eq!(
        system.stats().unwrap().index_generation,
        generation_before,
        "a no-op pass must not rebuild the index"
    );
}

#[test]
fn test_compress_evicts_inactive_records() {
    let mut system = test_system();
    let dormant = system.store(draft("dormant", 0.9, 0)).unwrap();
    system.store(draft("active", 0.9, 1)).unwrap();

    backdate_system_last_accessed(&mut system, dormant, Utc::now() - Duration::days(45)).unwrap();

    let report = system.compress(0.5).unwrap();
    assert_eq!(report.evicted, 1);
    assert_eq!(report.inactive, 1);
    assert_eq!(report.low_importance, 0);

    let log = system.compression_log().unwrap();
    assert_eq!(log[0].memory_id, dormant);
    assert_eq!(log[0].reason, EvictionReason::Inactive);
}

#[test]
fn test_importance_reason_wins_when_both_apply() {
    let mut system = test_system();
    let id = system.store(draft("old and weak", 0.1, 0)).unwrap();
    backdate_system_last_accessed(&mut system, id, Utc::now() - Duration::days(60)).unwrap();

    system.compress(0.5).unwrap();

    let log = system.compression_log().unwrap();
    assert_eq!(log[0].reason, EvictionReason::LowImportance);
}

#[test]
fn test_compress_restores_bijection() {
    let mut system = test_system();
    let keep_a = system.store(draft("keep a", 0.9, 0)).unwrap();
    system.store(draft("drop", 0.1, 1)).unwrap();
    let keep_b = system.store(draft("keep b", 0.9, 2)).unwrap();

    system.compress(0.5).unwrap();

    let indexed = system.index().snapshot().ids();
    let active: std::collections::BTreeSet<_> = system
        .list_active()
        .unwrap()
        .iter()
        .map(|r| r.id)
        .collect();

    assert_eq!(indexed, active);
    assert_eq!(active, std::collections::BTreeSet::from([keep_a, keep_b]));
}

#[test]
fn test_tombstoned_records_are_not_retrievable() {
    let mut system = test_system();
    let query = basis_embedding(DIM, 0);
    let id = system.store(draft("ephemeral", 0.2, 0)).unwrap();

    system.compress(0.8).unwrap();

    let results = system.retrieve(&query, 5, None).unwrap();
    assert!(results.iter().all(|r| r.record.id != id));
}

#[test]
fn test_stats_reflect_compression() {
    let mut system = test_system();
    system.store(draft("a", 0.2, 0)).unwrap();
    system.store(draft("b", 0.9, 1)).unwrap();

    system.compress(0.5).unwrap();

    let stats = system.stats().unwrap();
    assert_eq!(stats.total_records, 2);
    assert_eq!(stats.active_records, 1);
    assert_eq!(stats.tombstoned_records, 1);
    assert_eq!(stats.indexed_entries, 1);
}

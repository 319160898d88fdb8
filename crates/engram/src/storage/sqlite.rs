//! SQLite-backed record store
//!
//! The store is the single source of truth for memory records, user
//! profiles, and the compression audit log. Every mutation is atomic per
//! call; eviction never deletes rows, it tombstones them in place. The
//! vector index is derived from this store and can always be rebuilt from
//! `list_active`.

use std::path::Path;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter, types::Value as SqlValue};
use serde_json::{Map, Value};

use crate::error::{EngramError, Result};
use crate::memory::types::{
    CompressionLogEntry, EvictionReason, MemoryDraft, MemoryId, MemoryRecord, MemoryType,
    TOMBSTONE_SENTINEL, UserProfile, clamp_importance,
};

const RECORD_COLUMNS: &str =
    "id, content, type, timestamp, importance, metadata, tags, embedding, last_accessed, access_count";

pub struct SqliteStore {
    conn: Connection,
    dimension: usize,
}

impl SqliteStore {
    /// Open (or create) a store at the given path.
    pub fn open(path: &Path, dimension: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| EngramError::Storage(format!("failed to open {}: {e}", path.display())))?;
        let store = Self { conn, dimension };
        store.init_schema()?;
        tracing::info!(path = %path.display(), dimension, "opened record store");
        Ok(store)
    }

    /// In-memory store, used by tests and throwaway sessions.
    pub fn open_in_memory(dimension: usize) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| EngramError::Storage(format!("failed to open in-memory store: {e}")))?;
        let store = Self { conn, dimension };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS memories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL DEFAULT 'default',
                content TEXT NOT NULL,
                type TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                importance REAL NOT NULL,
                metadata TEXT NOT NULL,
                tags TEXT NOT NULL,
                embedding BLOB,
                last_accessed TEXT NOT NULL,
                access_count INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_memories_last_accessed
                ON memories(last_accessed);
            CREATE TABLE IF NOT EXISTS compression_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                memory_id INTEGER NOT NULL REFERENCES memories(id),
                reason TEXT NOT NULL,
                compressed_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS user_profiles (
                user_id TEXT PRIMARY KEY,
                preferences TEXT NOT NULL,
                last_interaction TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// The embedding dimension every insert is validated against.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Insert a new record and return its store-assigned id.
    ///
    /// The embedding dimension is validated before anything is written, so
    /// a rejected insert leaves no partial row behind.
    pub fn insert(&mut self, draft: &MemoryDraft) -> Result<MemoryId> {
        let embedding = draft
            .embedding
            .as_ref()
            .ok_or_else(|| EngramError::Embedding("memory draft has no embedding".to_string()))?;
        if embedding.len() != self.dimension {
            return Err(EngramError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        let now = format_timestamp(&Utc::now());
        let metadata = serde_json::to_string(&draft.metadata)?;
        let tags = serde_json::to_string(&draft.tags)?;

        self.conn.execute(
            "INSERT INTO memories
                (user_id, content, type, timestamp, importance, metadata, tags, embedding, last_accessed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?4)",
            params![
                draft.user_id,
                draft.content,
                draft.memory_type.as_str(),
                now,
                clamp_importance(draft.importance) as f64,
                metadata,
                tags,
                embedding_to_blob(embedding),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        tracing::debug!(id, memory_type = %draft.memory_type, "inserted memory");
        Ok(id)
    }

    /// Fetch a record by id.
    pub fn get(&self, id: MemoryId) -> Result<Option<MemoryRecord>> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM memories WHERE id = ?1");
        let raw = self
            .conn
            .query_row(&sql, [id], RawRecord::from_row)
            .optional()?;
        raw.map(RawRecord::decode).transpose()
    }

    /// Fetch several records at once. Missing ids are silently skipped;
    /// the result order is unspecified.
    pub fn get_many(&self, ids: &[MemoryId]) -> Result<Vec<MemoryRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = placeholders(ids.len());
        let sql = format!("SELECT {RECORD_COLUMNS} FROM memories WHERE id IN ({placeholders})");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(ids.iter().copied()), RawRecord::from_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.decode()?);
        }
        Ok(records)
    }

    /// Update a record's importance, clamped to [0.0, 1.0].
    pub fn update_importance(&mut self, id: MemoryId, value: f32) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE memories SET importance = ?1 WHERE id = ?2",
            params![clamp_importance(value) as f64, id],
        )?;
        if updated == 0 {
            return Err(EngramError::NotFound(id));
        }
        Ok(())
    }

    /// Refresh last-accessed (and bump the access counter) for a batch of
    /// records in one statement.
    pub fn touch(&mut self, ids: &[MemoryId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let placeholders = placeholders(ids.len());
        let sql = format!(
            "UPDATE memories
                SET last_accessed = ?1, access_count = access_count + 1
              WHERE id IN ({placeholders})"
        );
        let mut values: Vec<SqlValue> = Vec::with_capacity(ids.len() + 1);
        values.push(SqlValue::Text(format_timestamp(&Utc::now())));
        values.extend(ids.iter().map(|&id| SqlValue::Integer(id)));
        self.conn.execute(&sql, params_from_iter(values))?;
        Ok(())
    }

    /// Records eligible for eviction: importance below the threshold, or
    /// last accessed before the inactivity cutoff. Already-tombstoned
    /// records are never selected.
    pub fn select_eviction_candidates(
        &self,
        threshold: f32,
        inactivity_window: Duration,
    ) -> Result<Vec<MemoryRecord>> {
        let cutoff = format_timestamp(&(Utc::now() - inactivity_window));
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM memories
              WHERE embedding IS NOT NULL
                AND (importance < ?1 OR last_accessed < ?2)
              ORDER BY id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![threshold as f64, cutoff], RawRecord::from_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.decode()?);
        }
        Ok(records)
    }

    /// Replace a record's content with the tombstone sentinel, clear its
    /// embedding, and append a compression log entry, all in one
    /// transaction. Tombstoning is one-way: calling this on an already
    /// tombstoned record is a no-op and appends no second log entry.
    pub fn tombstone(&mut self, id: MemoryId, reason: EvictionReason) -> Result<()> {
        let tx = self.conn.transaction()?;

        let exists = tx
            .query_row("SELECT 1 FROM memories WHERE id = ?1", [id], |_| Ok(()))
            .optional()?
            .is_some();
        if !exists {
            return Err(EngramError::NotFound(id));
        }

        let updated = tx.execute(
            "UPDATE memories SET content = ?1, embedding = NULL
              WHERE id = ?2 AND embedding IS NOT NULL",
            params![TOMBSTONE_SENTINEL, id],
        )?;
        if updated > 0 {
            tx.execute(
                "INSERT INTO compression_history (memory_id, reason, compressed_at)
                 VALUES (?1, ?2, ?3)",
                params![id, reason.as_str(), format_timestamp(&Utc::now())],
            )?;
            tracing::debug!(id, reason = %reason, "tombstoned memory");
        }

        tx.commit()?;
        Ok(())
    }

    /// All non-tombstoned records, most recently accessed first.
    pub fn list_active(&self) -> Result<Vec<MemoryRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM memories
              WHERE embedding IS NOT NULL
              ORDER BY last_accessed DESC, id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], RawRecord::from_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.decode()?);
        }
        Ok(records)
    }

    pub fn count_total(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn count_active(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM memories WHERE embedding IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// The compression audit log, in append order.
    pub fn compression_log(&self) -> Result<Vec<CompressionLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT memory_id, reason, compressed_at FROM compression_history ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (memory_id, reason, compressed_at) = row?;
            entries.push(CompressionLogEntry {
                memory_id,
                reason: EvictionReason::parse(&reason)?,
                compressed_at: parse_timestamp(&compressed_at)?,
            });
        }
        Ok(entries)
    }

    /// Replace a user's preferences wholesale and refresh the interaction
    /// timestamp.
    pub fn upsert_profile(&mut self, user_id: &str, preferences: &Map<String, Value>) -> Result<()> {
        let preferences = serde_json::to_string(preferences)?;
        self.conn.execute(
            "INSERT INTO user_profiles (user_id, preferences, last_interaction)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET
                preferences = excluded.preferences,
                last_interaction = excluded.last_interaction",
            params![user_id, preferences, format_timestamp(&Utc::now())],
        )?;
        Ok(())
    }

    /// Fetch a user profile. A user that has never been seen yields `None`,
    /// which is distinct from a stored profile with an empty preference map.
    pub fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let row = self
            .conn
            .query_row(
                "SELECT preferences, last_interaction FROM user_profiles WHERE user_id = ?1",
                [user_id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        match row {
            Some((preferences, last_interaction)) => Ok(Some(UserProfile {
                user_id: user_id.to_string(),
                preferences: serde_json::from_str(&preferences)?,
                last_interaction: parse_timestamp(&last_interaction)?,
            })),
            None => Ok(None),
        }
    }

    pub(crate) fn set_last_accessed(&mut self, id: MemoryId, at: DateTime<Utc>) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE memories SET last_accessed = ?1 WHERE id = ?2",
            params![format_timestamp(&at), id],
        )?;
        if updated == 0 {
            return Err(EngramError::NotFound(id));
        }
        Ok(())
    }

    pub(crate) fn set_timestamp(&mut self, id: MemoryId, at: DateTime<Utc>) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE memories SET timestamp = ?1 WHERE id = ?2",
            params![format_timestamp(&at), id],
        )?;
        if updated == 0 {
            return Err(EngramError::NotFound(id));
        }
        Ok(())
    }
}

/// Row as it comes out of SQLite, before type-level decoding.
struct RawRecord {
    id: i64,
    content: String,
    memory_type: String,
    timestamp: String,
    importance: f64,
    metadata: String,
    tags: String,
    embedding: Option<Vec<u8>>,
    last_accessed: String,
    access_count: i64,
}

impl RawRecord {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            content: row.get(1)?,
            memory_type: row.get(2)?,
            timestamp: row.get(3)?,
            importance: row.get(4)?,
            metadata: row.get(5)?,
            tags: row.get(6)?,
            embedding: row.get(7)?,
            last_accessed: row.get(8)?,
            access_count: row.get(9)?,
        })
    }

    fn decode(self) -> Result<MemoryRecord> {
        Ok(MemoryRecord {
            id: self.id,
            content: self.content,
            memory_type: MemoryType::parse(&self.memory_type)?,
            timestamp: parse_timestamp(&self.timestamp)?,
            importance: self.importance as f32,
            embedding: self.embedding.as_deref().map(blob_to_embedding).transpose()?,
            metadata: serde_json::from_str(&self.metadata)?,
            tags: serde_json::from_str(&self.tags)?,
            last_accessed: parse_timestamp(&self.last_accessed)?,
            access_count: self.access_count as u32,
        })
    }
}

/// Fixed-width RFC 3339 with microseconds, so lexicographic order in SQL
/// matches chronological order.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| EngramError::Storage(format!("malformed timestamp {value:?}: {e}")))
}

fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn blob_to_embedding(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(EngramError::Storage(format!(
            "embedding blob length {} is not a multiple of 4",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

fn placeholders(count: usize) -> String {
    let mut out = String::with_capacity(count * 2);
    for i in 0..count {
        if i > 0 {
            out.push(',');
        }
        out.push('?');
    }
    out
}

//! Memory types for the Engram system
//!
//! Defines core data structures for storing and retrieving memories,
//! including the main MemoryRecord struct, user profiles, and the
//! compression audit log.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{EngramError, Result};

/// Store-assigned record identifier, strictly increasing across inserts.
pub type MemoryId = i64;

/// Content sentinel written in place of an evicted record's text.
pub const TOMBSTONE_SENTINEL: &str = "[COMPRESSED]";

/// Importance assigned to records whose caller did not specify one.
pub const DEFAULT_IMPORTANCE: f32 = 0.5;

/// A single memory record stored in the Engram system.
///
/// Records are created through the write path, mutated only by importance
/// updates and last-accessed refreshes, and terminally transformed into
/// tombstones by the compression manager. They are never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique identifier assigned by the record store
    pub id: MemoryId,
    /// The content of the memory, or the tombstone sentinel after eviction
    pub content: String,
    /// Classification of what kind of memory this is
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    /// When this memory was created (immutable)
    pub timestamp: DateTime<Utc>,
    /// Importance score, clamped to [0.0, 1.0] on every write
    pub importance: f32,
    /// Vector embedding of the content; absent after eviction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Additional metadata, opaque to the core
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Tags for categorizing memories
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// When this memory was last accessed
    pub last_accessed: DateTime<Utc>,
    /// How many times this memory has been accessed
    #[serde(default)]
    pub access_count: u32,
}

impl MemoryRecord {
    /// Whether this record has been evicted and replaced by the sentinel.
    pub fn is_tombstoned(&self) -> bool {
        self.content == TOMBSTONE_SENTINEL
    }
}

/// Clamp an importance value into [0.0, 1.0].
///
/// Non-finite input falls back to the default rather than propagating
/// NaN into the store.
pub fn clamp_importance(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        DEFAULT_IMPORTANCE
    }
}

/// Classification of memory types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryType {
    /// Recent interactions and immediate context
    ShortTerm,
    /// Important information and key facts
    LongTerm,
    /// Key insights and takeaways from conversations
    Episodic,
    /// Self-improvement insights and learning
    Reflective,
}

impl MemoryType {
    pub const ALL: [MemoryType; 4] = [
        MemoryType::ShortTerm,
        MemoryType::LongTerm,
        MemoryType::Episodic,
        MemoryType::Reflective,
    ];

    /// The canonical string tag for this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::ShortTerm => "short_term",
            MemoryType::LongTerm => "long_term",
            MemoryType::Episodic => "episodic",
            MemoryType::Reflective => "reflective",
        }
    }

    /// Parse a string tag, case-insensitively.
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "short_term" => Ok(MemoryType::ShortTerm),
            "long_term" => Ok(MemoryType::LongTerm),
            "episodic" => Ok(MemoryType::Episodic),
            "reflective" => Ok(MemoryType::Reflective),
            _ => Err(EngramError::InvalidMemoryType(value.to_string())),
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryType {
    type Err = EngramError;

    fn from_str(s: &str) -> Result<Self> {
        MemoryType::parse(s)
    }
}

impl Serialize for MemoryType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MemoryType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        MemoryType::parse(&value).map_err(serde::de::Error::custom)
    }
}

/// Insert-side value for a new memory record.
///
/// The store assigns the id and stamps creation/access times; the draft
/// carries everything the caller controls. When `embedding` is absent the
/// facade generates one through its configured embedder.
#[derive(Debug, Clone)]
pub struct MemoryDraft {
    pub content: String,
    pub memory_type: MemoryType,
    pub importance: f32,
    pub embedding: Option<Vec<f32>>,
    pub metadata: Map<String, Value>,
    pub tags: BTreeSet<String>,
    pub user_id: String,
}

impl MemoryDraft {
    pub fn new(content: impl Into<String>, memory_type: MemoryType) -> Self {
        Self {
            content: content.into(),
            memory_type,
            importance: DEFAULT_IMPORTANCE,
            embedding: None,
            metadata: Map::new(),
            tags: BTreeSet::new(),
            user_id: "default".to_string(),
        }
    }

    pub fn with_importance(mut self, importance: f32) -> Self {
        self.importance = importance;
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }
}

/// A per-user preference profile.
///
/// Preferences are replaced wholesale on write. A missing profile is a
/// typed absence (`Option<UserProfile>`), distinct from a present profile
/// with an empty preference map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub preferences: Map<String, Value>,
    pub last_interaction: DateTime<Utc>,
}

/// Why a memory was evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// Importance fell below the compression threshold
    LowImportance,
    /// Not accessed within the inactivity window
    Inactive,
}

impl EvictionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionReason::LowImportance => "low_importance",
            EvictionReason::Inactive => "inactive",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "low_importance" => Ok(EvictionReason::LowImportance),
            "inactive" => Ok(EvictionReason::Inactive),
            _ => Err(EngramError::Storage(format!(
                "unknown eviction reason: {value}"
            ))),
        }
    }
}

impl fmt::Display for EvictionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EvictionReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EvictionReason {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        EvictionReason::parse(&value).map_err(serde::de::Error::custom)
    }
}

/// Audit entry recording why a memory was tombstoned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionLogEntry {
    pub memory_id: MemoryId,
    pub reason: EvictionReason,
    pub compressed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_record() -> MemoryRecord {
        let mut metadata = Map::new();
        metadata.insert("source".to_string(), Value::String("chat".to_string()));
        MemoryRecord {
            id: 7,
            content: "The user prefers dark roast coffee".to_string(),
            memory_type: MemoryType::LongTerm,
            timestamp: Utc::now(),
            importance: 0.8,
            embedding: Some(vec![0.25; 8]),
            metadata,
            tags: ["coffee".to_string()].into_iter().collect(),
            last_accessed: Utc::now(),
            access_count: 3,
        }
    }

    #[test]
    fn test_record_roundtrip() {
        let record = test_record();

        let json = serde_json::to_string(&record).expect("failed to serialize record");
        let deserialized: MemoryRecord =
            serde_json::from_str(&json).expect("failed to deserialize record");

        assert_eq!(record.id, deserialized.id);
        assert_eq!(record.content, deserialized.content);
        assert_eq!(record.memory_type, deserialized.memory_type);
        assert_eq!(record.timestamp, deserialized.timestamp);
        assert_eq!(record.metadata, deserialized.metadata);
        assert_eq!(record.tags, deserialized.tags);

        let original = record.embedding.as_ref().unwrap();
        let restored = deserialized.embedding.as_ref().unwrap();
        assert_eq!(original.len(), restored.len());
        for (a, b) in original.iter().zip(restored.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_absent_embedding_is_omitted() {
        let mut record = test_record();
        record.embedding = None;

        let json = serde_json::to_string(&record).expect("failed to serialize record");
        assert!(
            !json.contains("embedding"),
            "absent embedding must be omitted, not serialized as a vector: {json}"
        );

        let deserialized: MemoryRecord =
            serde_json::from_str(&json).expect("failed to deserialize record");
        assert!(deserialized.embedding.is_none());
    }

    #[test]
    fn test_type_serializes_to_string_tag() {
        let json = serde_json::to_string(&MemoryType::ShortTerm).unwrap();
        assert_eq!(json, "\"short_term\"");
    }

    #[test]
    fn test_type_parse_case_insensitive() {
        assert_eq!(MemoryType::parse("LONG_TERM").unwrap(), MemoryType::LongTerm);
        assert_eq!(MemoryType::parse("Episodic").unwrap(), MemoryType::Episodic);
        assert_eq!(
            MemoryType::parse("reflective").unwrap(),
            MemoryType::Reflective
        );
    }

    #[test]
    fn test_type_parse_invalid_names_value() {
        let err = MemoryType::parse("working").unwrap_err();
        assert!(matches!(err, EngramError::InvalidMemoryType(ref v) if v == "working"));
        assert!(err.to_string().contains("working"));
    }

    #[test]
    fn test_all_type_tags_roundtrip() {
        for memory_type in MemoryType::ALL {
            let json = serde_json::to_string(&memory_type).unwrap();
            let restored: MemoryType = serde_json::from_str(&json).unwrap();
            assert_eq!(memory_type, restored);
        }
    }

    #[test]
    fn test_clamp_importance() {
        assert_eq!(clamp_importance(0.5), 0.5);
        assert_eq!(clamp_importance(1.5), 1.0);
        assert_eq!(clamp_importance(-0.5), 0.0);
        assert_eq!(clamp_importance(f32::NAN), DEFAULT_IMPORTANCE);
    }

    #[test]
    fn test_tombstone_detection() {
        let mut record = test_record();
        assert!(!record.is_tombstoned());

        record.content = TOMBSTONE_SENTINEL.to_string();
        assert!(record.is_tombstoned());
    }

    #[test]
    fn test_draft_defaults() {
        let draft = MemoryDraft::new("note", MemoryType::ShortTerm);
        assert_eq!(draft.importance, DEFAULT_IMPORTANCE);
        assert!(draft.embedding.is_none());
        assert!(draft.metadata.is_empty());
        assert!(draft.tags.is_empty());
        assert_eq!(draft.user_id, "default");
    }

    #[test]
    fn test_eviction_reason_tags() {
        assert_eq!(EvictionReason::LowImportance.as_str(), "low_importance");
        assert_eq!(EvictionReason::Inactive.as_str(), "inactive");
        assert_eq!(
            EvictionReason::parse("inactive").unwrap(),
            EvictionReason::Inactive
        );
        assert!(EvictionReason::parse("evicted").is_err());
    }
}

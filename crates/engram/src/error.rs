//! Error types for Engram

use thiserror::Error;

use crate::memory::types::MemoryId;

/// Main error type for Engram operations
#[derive(Error, Debug)]
pub enum EngramError {
    /// Record store errors (SQLite, file system, etc.)
    #[error("storage error: {0}")]
    Storage(String),

    /// An embedding did not match the configured index dimension
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A memory type tag did not match any known type
    #[error("invalid memory type: {0}")]
    InvalidMemoryType(String),

    /// A record id that does not exist in the store
    #[error("memory {0} not found")]
    NotFound(MemoryId),

    /// Embedding generation errors
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for EngramError {
    fn from(e: rusqlite::Error) -> Self {
        EngramError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for EngramError {
    fn from(e: serde_json::Error) -> Self {
        EngramError::Serialization(e.to_string())
    }
}

/// Result type alias for Engram operations
pub type Result<T> = std::result::Result<T, EngramError>;

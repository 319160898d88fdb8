//! Durable record storage and the eviction policy

pub mod eviction;
pub mod sqlite;

pub use eviction::{CompressionReport, Compressor};
pub use sqlite::SqliteStore;

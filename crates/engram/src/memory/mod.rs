//! Memory records, retrieval scoring, and the system facade

pub mod retrieval;
pub mod system;
pub mod types;

pub use retrieval::{RetrievedMemory, ScoringWeights};
pub use system::{MemorySystem, SystemStats};
pub use types::{MemoryDraft, MemoryId, MemoryRecord, MemoryType, UserProfile};

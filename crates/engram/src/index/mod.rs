//! Vector indexing: exact search and store synchronization

pub mod flat;
pub mod sync;

pub use flat::{FlatIndex, SearchHit};
pub use sync::{IndexSet, IndexSynchronizer, Partition};

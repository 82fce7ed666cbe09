//! Point index backends: an in-process index and a LanceDB table, plus the
//! Lance-backed persistent embedding cache store.

pub mod cache;
pub mod lance;
pub mod memory;
pub mod schema;
pub mod table;

pub use cache::LanceCacheStore;
pub use lance::LanceIndex;
pub use memory::{cosine_similarity, MemoryIndex};

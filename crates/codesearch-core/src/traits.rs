use std::sync::Arc;

use crate::error::Result;
use crate::types::{CacheKey, IndexedPoint, ScoredPoint};

/// External embedding model boundary: `embed(model_name, text) -> vector`.
pub trait EmbeddingProvider: Send + Sync {
    /// Short label used in logs (e.g. `ollama`, `hash`).
    fn name(&self) -> &str;
    fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>>;
}

/// A collection of vectors with payloads supporting both retrieval signals.
///
/// `vector_search` and `keyword_search` fail with `Error::IndexNotReady` until
/// `create_or_reset` has run.
pub trait PointIndex: Send + Sync {
    /// Drop any previous contents and create an empty collection of `dimension`.
    fn create_or_reset(&mut self, dimension: usize) -> Result<()>;
    /// Write points; a reused id overwrites the earlier point.
    fn upsert_batch(&mut self, points: &[IndexedPoint]) -> Result<()>;
    /// Up to `k` nearest points by cosine similarity, best first.
    fn vector_search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredPoint>>;
    /// Up to `k` points whose text contains `query`, in backend order.
    fn keyword_search(&self, query: &str, k: usize) -> Result<Vec<ScoredPoint>>;
    fn is_ready(&self) -> bool;
    fn dimension(&self) -> Option<usize>;
    fn len(&self) -> Result<usize>;
}

impl<T: PointIndex + ?Sized> PointIndex for Box<T> {
    fn create_or_reset(&mut self, dimension: usize) -> Result<()> { (**self).create_or_reset(dimension) }
    fn upsert_batch(&mut self, points: &[IndexedPoint]) -> Result<()> { (**self).upsert_batch(points) }
    fn vector_search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredPoint>> { (**self).vector_search(query, k) }
    fn keyword_search(&self, query: &str, k: usize) -> Result<Vec<ScoredPoint>> { (**self).keyword_search(query, k) }
    fn is_ready(&self) -> bool { (**self).is_ready() }
    fn dimension(&self) -> Option<usize> { (**self).dimension() }
    fn len(&self) -> Result<usize> { (**self).len() }
}

/// Backing storage for the embedding cache.
///
/// `get` only returns a vector stored under the exact key, model included.
/// `put` replaces whatever was stored for the same text and bucket.
pub trait CacheStore: Send {
    fn get(&mut self, key: &CacheKey) -> Result<Option<Arc<[f32]>>>;
    fn put(&mut self, key: CacheKey, vector: Arc<[f32]>) -> Result<()>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool { self.len() == 0 }
}

use codesearch_core::traits::PointIndex;
use codesearch_core::types::{IndexedPoint, ScoredPoint};
use codesearch_core::Result;
use codesearch_text::TantivyKeywordIndex;

/// Routes the keyword signal to a BM25 index while `inner` keeps vectors.
pub struct KeywordOverlay<I> {
    inner: I,
    keyword: TantivyKeywordIndex,
}

impl<I: PointIndex> KeywordOverlay<I> {
    pub fn new(inner: I, keyword: TantivyKeywordIndex) -> Self { Self { inner, keyword } }
}

impl<I: PointIndex> PointIndex for KeywordOverlay<I> {
    fn create_or_reset(&mut self, dimension: usize) -> Result<()> {
        self.inner.create_or_reset(dimension)?;
        self.keyword.reset()
    }

    fn upsert_batch(&mut self, points: &[IndexedPoint]) -> Result<()> {
        self.inner.upsert_batch(points)?;
        self.keyword.index_points(points)
    }

    fn vector_search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredPoint>> { self.inner.vector_search(query, k) }

    fn keyword_search(&self, query: &str, k: usize) -> Result<Vec<ScoredPoint>> { self.keyword.search(query, k) }

    fn is_ready(&self) -> bool { self.inner.is_ready() && self.keyword.is_ready() }

    fn dimension(&self) -> Option<usize> { self.inner.dimension() }

    fn len(&self) -> Result<usize> { self.inner.len() }
}

use std::collections::BTreeMap;

use codesearch_core::traits::PointIndex;
use codesearch_core::types::{IndexedPoint, PointId, ScoredPoint};
use codesearch_core::{Error, Result};

/// In-process point index with exact cosine search.
///
/// Points are kept ordered by id, which is also the keyword scan order.
#[derive(Default)]
pub struct MemoryIndex {
    dimension: Option<usize>,
    points: BTreeMap<PointId, IndexedPoint>,
}

impl MemoryIndex {
    pub fn new() -> Self { Self::default() }

    fn require_ready(&self) -> Result<usize> {
        self.dimension.ok_or_else(|| Error::IndexNotReady("collection has not been created".into()))
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut na, mut nb) = (0f32, 0f32, 0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 { return 0.0; }
    dot / (na.sqrt() * nb.sqrt())
}

impl PointIndex for MemoryIndex {
    fn create_or_reset(&mut self, dimension: usize) -> Result<()> {
        self.points.clear();
        self.dimension = Some(dimension);
        Ok(())
    }

    fn upsert_batch(&mut self, points: &[IndexedPoint]) -> Result<()> {
        let expected = self.require_ready()?;
        if let Some(bad) = points.iter().find(|p| p.vector.len() != expected) {
            return Err(Error::DimensionMismatch { expected, actual: bad.vector.len() });
        }
        for p in points {
            self.points.insert(p.id, p.clone());
        }
        Ok(())
    }

    fn vector_search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredPoint>> {
        let expected = self.require_ready()?;
        if query.len() != expected {
            return Err(Error::DimensionMismatch { expected, actual: query.len() });
        }
        let mut scored: Vec<ScoredPoint> = self
            .points
            .values()
            .map(|p| ScoredPoint { id: p.id, score: cosine_similarity(query, &p.vector), payload: p.payload.clone() })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.id.cmp(&b.id)));
        scored.truncate(k);
        Ok(scored)
    }

    fn keyword_search(&self, query: &str, k: usize) -> Result<Vec<ScoredPoint>> {
        self.require_ready()?;
        Ok(self
            .points
            .values()
            .filter(|p| p.payload.text.contains(query))
            .take(k)
            .map(|p| ScoredPoint { id: p.id, score: 0.0, payload: p.payload.clone() })
            .collect())
    }

    fn is_ready(&self) -> bool { self.dimension.is_some() }

    fn dimension(&self) -> Option<usize> { self.dimension }

    fn len(&self) -> Result<usize> { Ok(self.points.len()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_orthogonal_and_zero_vectors() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}

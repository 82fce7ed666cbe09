use std::hash::{Hash, Hasher};

use twox_hash::XxHash64;

use codesearch_core::traits::EmbeddingProvider;
use codesearch_core::Result;

/// Deterministic bag-of-tokens embedder for tests and offline runs.
///
/// Every whitespace token is hashed into one of `dim` buckets; the result is
/// L2-normalised. The model name seeds the hash so buckets mapped to
/// different models yield different vectors.
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } }

    pub fn dim(&self) -> usize { self.dim }
}

impl EmbeddingProvider for HashEmbedder {
    fn name(&self) -> &str { "hash" }

    fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        let seed = {
            let mut hasher = XxHash64::with_seed(0);
            model.hash(&mut hasher);
            hasher.finish()
        };
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(seed);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        Ok(v)
    }
}

//! Content-addressed embedding cache.
//!
//! Vectors are keyed by the blake3 hash of the exact text, its language
//! bucket and the bucket's model. Concurrent requests for the same key are
//! coalesced: one caller runs the provider while the others wait on a
//! per-key gate and then read the stored vector.
//!
//! A stored vector is only served once the model's dimension is known in
//! this process and the vector matches it. The first request per model
//! always goes to the provider, so vectors left behind by an earlier run
//! are never trusted blindly.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use anyhow::anyhow;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, warn};

use codesearch_core::config::ModelMap;
use codesearch_core::traits::{CacheStore, EmbeddingProvider};
use codesearch_core::types::{CacheKey, LanguageBucket};
use codesearch_core::{Error, Result};

pub fn content_hash(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub provider_calls: u64,
}

/// Unbounded in-process store.
#[derive(Default)]
pub struct MemoryStore {
    entries: HashMap<CacheKey, Arc<[f32]>>,
}

impl CacheStore for MemoryStore {
    fn get(&mut self, key: &CacheKey) -> Result<Option<Arc<[f32]>>> { Ok(self.entries.get(key).cloned()) }

    fn put(&mut self, key: CacheKey, vector: Arc<[f32]>) -> Result<()> {
        self.entries.insert(key, vector);
        Ok(())
    }

    fn len(&self) -> usize { self.entries.len() }
}

/// Bounded store evicting the least recently used vector.
pub struct LruStore {
    entries: LruCache<CacheKey, Arc<[f32]>>,
}

impl LruStore {
    pub fn new(capacity: NonZeroUsize) -> Self { Self { entries: LruCache::new(capacity) } }
}

impl CacheStore for LruStore {
    fn get(&mut self, key: &CacheKey) -> Result<Option<Arc<[f32]>>> { Ok(self.entries.get(key).cloned()) }

    fn put(&mut self, key: CacheKey, vector: Arc<[f32]>) -> Result<()> {
        self.entries.put(key, vector);
        Ok(())
    }

    fn len(&self) -> usize { self.entries.len() }
}

/// `0` means unbounded.
pub fn store_for_capacity(capacity: usize) -> Box<dyn CacheStore> {
    match NonZeroUsize::new(capacity) {
        Some(cap) => Box::new(LruStore::new(cap)),
        None => Box::new(MemoryStore::default()),
    }
}

pub struct EmbeddingCache {
    provider: Arc<dyn EmbeddingProvider>,
    models: ModelMap,
    store: Mutex<Box<dyn CacheStore>>,
    inflight: Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
    dimensions: Mutex<HashMap<String, usize>>,
    stats: Mutex<CacheStats>,
}

impl EmbeddingCache {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, models: ModelMap) -> Self {
        Self::with_store(provider, models, Box::new(MemoryStore::default()))
    }

    pub fn with_store(provider: Arc<dyn EmbeddingProvider>, models: ModelMap, store: Box<dyn CacheStore>) -> Self {
        Self {
            provider,
            models,
            store: Mutex::new(store),
            inflight: Mutex::new(HashMap::new()),
            dimensions: Mutex::new(HashMap::new()),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    pub fn model_for(&self, bucket: LanguageBucket) -> &str { self.models.model_for(bucket) }

    pub fn stats(&self) -> CacheStats { *self.stats.lock() }

    pub fn len(&self) -> usize { self.store.lock().len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Return the vector for `text` under `bucket`, calling the provider at
    /// most once per distinct key. Failures are not cached.
    pub fn embed(&self, text: &str, bucket: LanguageBucket) -> Result<Arc<[f32]>> {
        let model = self.models.model_for(bucket);
        let key = CacheKey { content_hash: content_hash(text), bucket, model: model.to_string() };
        if let Some(v) = self.lookup(&key)? { return Ok(v); }

        let gate = {
            let mut inflight = self.inflight.lock();
            Arc::clone(inflight.entry(key.clone()).or_insert_with(|| Arc::new(Mutex::new(()))))
        };
        let result = {
            let _held = gate.lock();
            match self.lookup(&key) {
                Ok(Some(v)) => Ok(v),
                Ok(None) => self.fetch(key.clone(), model, text),
                Err(e) => Err(e),
            }
        };

        let mut inflight = self.inflight.lock();
        let last_holder = inflight.get(&key).is_some_and(|g| Arc::ptr_eq(g, &gate)) && Arc::strong_count(&gate) == 2;
        if last_holder { inflight.remove(&key); }
        result
    }

    fn lookup(&self, key: &CacheKey) -> Result<Option<Arc<[f32]>>> {
        let model = key.model.as_str();
        let Some(v) = self.store.lock().get(key)? else { return Ok(None) };
        let Some(&expected) = self.dimensions.lock().get(model) else {
            debug!(model, "model dimension not yet confirmed; refetching stored vector");
            return Ok(None);
        };
        if v.len() != expected {
            warn!(model, expected, actual = v.len(), "cached vector has unexpected dimension; treating as miss");
            return Ok(None);
        }
        self.stats.lock().hits += 1;
        Ok(Some(v))
    }

    fn fetch(&self, key: CacheKey, model: &str, text: &str) -> Result<Arc<[f32]>> {
        {
            let mut stats = self.stats.lock();
            stats.misses += 1;
            stats.provider_calls += 1;
        }
        debug!(provider = self.provider.name(), model, bucket = %key.bucket, "embedding cache miss");
        let vector = self.provider.embed(model, text).map_err(|e| match e {
            Error::EmbeddingProvider { .. } => e,
            other => Error::provider(model, other),
        })?;
        if vector.is_empty() {
            return Err(Error::provider(model, anyhow!("provider returned an empty vector")));
        }
        {
            let mut dims = self.dimensions.lock();
            let expected = *dims.entry(model.to_string()).or_insert(vector.len());
            if expected != vector.len() {
                return Err(Error::provider(
                    model,
                    anyhow!("provider returned {} dimensions, earlier vectors had {}", vector.len(), expected),
                ));
            }
        }
        let vector: Arc<[f32]> = Arc::from(vector);
        self.store.lock().put(key, Arc::clone(&vector))?;
        Ok(vector)
    }
}

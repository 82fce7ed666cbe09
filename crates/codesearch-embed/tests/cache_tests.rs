use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use anyhow::anyhow;
use proptest::prelude::*;

use codesearch_core::config::ModelMap;
use codesearch_core::traits::{CacheStore, EmbeddingProvider};
use codesearch_core::types::{CacheKey, LanguageBucket};
use codesearch_core::{Error, Result};
use codesearch_embed::{content_hash, EmbeddingCache, HashEmbedder, MemoryStore};

/// Counts provider calls and optionally sleeps to widen race windows.
struct CountingProvider {
    inner: HashEmbedder,
    calls: AtomicUsize,
    delay: Duration,
}

impl CountingProvider {
    fn new(delay: Duration) -> Self { Self { inner: HashEmbedder::new(16), calls: AtomicUsize::new(0), delay } }
    fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

impl EmbeddingProvider for CountingProvider {
    fn name(&self) -> &str { "counting" }
    fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.delay);
        self.inner.embed(model, text)
    }
}

struct FailingProvider;

impl EmbeddingProvider for FailingProvider {
    fn name(&self) -> &str { "failing" }
    fn embed(&self, model: &str, _text: &str) -> Result<Vec<f32>> {
        Err(Error::provider(model, anyhow!("connection refused")))
    }
}

struct EmptyProvider;

impl EmbeddingProvider for EmptyProvider {
    fn name(&self) -> &str { "empty" }
    fn embed(&self, _model: &str, _text: &str) -> Result<Vec<f32>> { Ok(Vec::new()) }
}

fn models() -> ModelMap {
    ModelMap { code: "code-model".into(), markup: "markup-model".into(), default: "default-model".into() }
}

#[test]
fn second_lookup_is_a_hit() {
    let provider = Arc::new(CountingProvider::new(Duration::ZERO));
    let cache = EmbeddingCache::new(provider.clone(), models());
    let a = cache.embed("class Foo {}", LanguageBucket::Code).unwrap();
    let b = cache.embed("class Foo {}", LanguageBucket::Code).unwrap();
    assert_eq!(a, b);
    assert_eq!(provider.calls(), 1);
    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses, stats.provider_calls), (1, 1, 1));
}

#[test]
fn bucket_is_part_of_the_key() {
    let provider = Arc::new(CountingProvider::new(Duration::ZERO));
    let cache = EmbeddingCache::new(provider.clone(), models());
    let code = cache.embed("same text", LanguageBucket::Code).unwrap();
    let markup = cache.embed("same text", LanguageBucket::Markup).unwrap();
    assert_eq!(provider.calls(), 2);
    assert_ne!(code, markup, "different buckets use different models");
    assert_eq!(cache.len(), 2);
}

#[test]
fn concurrent_requests_for_one_key_call_provider_once() {
    let provider = Arc::new(CountingProvider::new(Duration::from_millis(50)));
    let cache = Arc::new(EmbeddingCache::new(provider.clone(), models()));
    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.embed("public void Run()", LanguageBucket::Code).unwrap()
            })
        })
        .collect();
    let vectors: Vec<Arc<[f32]>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(provider.calls(), 1);
    assert!(vectors.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn provider_failures_propagate_and_are_not_cached() {
    let cache = EmbeddingCache::new(Arc::new(FailingProvider), models());
    for _ in 0..2 {
        let err = cache.embed("x", LanguageBucket::Markup).unwrap_err();
        assert!(matches!(err, Error::EmbeddingProvider { ref model, .. } if model == "markup-model"));
    }
    assert!(cache.is_empty());
    assert_eq!(cache.stats().provider_calls, 2);
}

#[test]
fn empty_vectors_are_provider_errors() {
    let cache = EmbeddingCache::new(Arc::new(EmptyProvider), models());
    let err = cache.embed("x", LanguageBucket::Default).unwrap_err();
    assert!(matches!(err, Error::EmbeddingProvider { .. }));
    assert!(cache.is_empty());
}

fn stored(text: &str, model: &str, vector: Vec<f32>) -> (CacheKey, Arc<[f32]>) {
    let key = CacheKey { content_hash: content_hash(text), bucket: LanguageBucket::Code, model: model.into() };
    (key, Arc::from(vector))
}

#[test]
fn stored_vector_with_wrong_dimension_is_refetched() {
    let provider = Arc::new(CountingProvider::new(Duration::ZERO));
    let mut store = MemoryStore::default();
    let (key, v) = stored("stale", "code-model", vec![1.0; 3]);
    store.put(key, v).unwrap();
    let cache = EmbeddingCache::with_store(provider.clone(), models(), Box::new(store));

    cache.embed("fresh", LanguageBucket::Code).unwrap();
    let v = cache.embed("stale", LanguageBucket::Code).unwrap();
    assert_eq!(v.len(), 16);
    assert_eq!(provider.calls(), 2);
}

#[test]
fn stale_entry_is_not_served_as_first_lookup_of_a_new_cache() {
    let expected = HashEmbedder::new(16).embed("code-model", "stale").unwrap();
    for producer in ["old-model", "code-model"] {
        let provider = Arc::new(CountingProvider::new(Duration::ZERO));
        let mut store = MemoryStore::default();
        let (key, v) = stored("stale", producer, vec![1.0; 3]);
        store.put(key, v).unwrap();
        let cache = EmbeddingCache::with_store(provider.clone(), models(), Box::new(store));

        let v = cache.embed("stale", LanguageBucket::Code).unwrap();
        assert_eq!(&v[..], &expected[..], "stored by {producer}");
        assert_eq!(provider.calls(), 1);
        // Once the width is confirmed the refreshed entry is served.
        cache.embed("stale", LanguageBucket::Code).unwrap();
        assert_eq!(provider.calls(), 1);
    }
}

#[test]
fn matching_stored_vectors_hit_once_the_model_is_confirmed() {
    let provider = Arc::new(CountingProvider::new(Duration::ZERO));
    let mut store = MemoryStore::default();
    let warm = HashEmbedder::new(16).embed("code-model", "warm").unwrap();
    let (key, v) = stored("warm", "code-model", warm.clone());
    store.put(key, v).unwrap();
    let cache = EmbeddingCache::with_store(provider.clone(), models(), Box::new(store));

    cache.embed("first", LanguageBucket::Code).unwrap();
    let v = cache.embed("warm", LanguageBucket::Code).unwrap();
    assert_eq!(&v[..], &warm[..]);
    assert_eq!(provider.calls(), 1);
    assert_eq!(cache.stats().hits, 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn repeated_texts_hit_after_first_call(texts in prop::collection::vec("[a-z ]{0,12}", 1..20)) {
        let provider = Arc::new(CountingProvider::new(Duration::ZERO));
        let cache = EmbeddingCache::new(provider.clone(), models());
        for t in texts.iter().chain(texts.iter()) {
            cache.embed(t, LanguageBucket::Code).unwrap();
        }
        let distinct: std::collections::HashSet<&String> = texts.iter().collect();
        prop_assert_eq!(provider.calls(), distinct.len());
        prop_assert_eq!(cache.len(), distinct.len());
    }
}

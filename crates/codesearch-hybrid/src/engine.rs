//! The search façade: full-rebuild indexing from a merged corpus and hybrid
//! (vector + keyword) retrieval over the result.

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use codesearch_core::config::{IndexBackend, KeywordBackend, SearchSettings, Settings};
use codesearch_core::corpus::read_corpus;
use codesearch_core::traits::{CacheStore, PointIndex};
use codesearch_core::types::{IndexedPoint, LanguageBucket, PointPayload, SearchResult};
use codesearch_core::{Chunker, Error, Result};
use codesearch_embed::{provider_from_settings, store_for_capacity, EmbeddingCache};
use codesearch_text::TantivyKeywordIndex;
use codesearch_vector::{LanceCacheStore, LanceIndex, MemoryIndex};

use crate::fusion::{fuse, FusionConfig};
use crate::overlay::KeywordOverlay;

const DIMENSION_PROBE: &str = "test";
const UPSERT_BATCH: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexReport {
    pub chunks: usize,
    pub dimension: usize,
}

type ProgressFn = dyn Fn(usize, usize) + Send + Sync;

pub struct CodeSearch<I: PointIndex> {
    index: RwLock<I>,
    cache: EmbeddingCache,
    chunker: Chunker,
    settings: SearchSettings,
    progress: Option<Arc<ProgressFn>>,
}

impl CodeSearch<Box<dyn PointIndex>> {
    /// Wire provider, cache store and index backend from configuration.
    /// Relative paths resolve against `base`.
    pub fn from_settings(settings: &Settings, base: &Path) -> Result<Self> {
        let provider = provider_from_settings(&settings.embedding)?;
        let index_dir = settings.data.index_dir(base);
        let store: Box<dyn CacheStore> = if settings.embedding.persistent_cache {
            Box::new(LanceCacheStore::open(&index_dir.join("cache"), "embedding_cache")?)
        } else {
            store_for_capacity(settings.embedding.cache_capacity)
        };
        let cache = EmbeddingCache::with_store(provider, settings.embedding.models.clone(), store);

        let vectors: Box<dyn PointIndex> = match settings.index.backend {
            IndexBackend::Memory => Box::new(MemoryIndex::new()),
            IndexBackend::Lance => Box::new(LanceIndex::open(&index_dir.join("lance"), &settings.index.collection)?),
        };
        let index: Box<dyn PointIndex> = match (settings.index.keyword, settings.index.backend) {
            (KeywordBackend::Scan, _) => vectors,
            (KeywordBackend::Tantivy, IndexBackend::Memory) => {
                Box::new(KeywordOverlay::new(vectors, TantivyKeywordIndex::in_ram()?))
            }
            (KeywordBackend::Tantivy, IndexBackend::Lance) => {
                Box::new(KeywordOverlay::new(vectors, TantivyKeywordIndex::in_dir(index_dir.join("keyword"))?))
            }
        };
        info!(backend = ?settings.index.backend, keyword = ?settings.index.keyword, dir = %index_dir.display(), "search backends ready");
        Self::new(index, cache, settings.search.clone())
    }
}

impl<I: PointIndex> CodeSearch<I> {
    /// Fails with `InvalidConfig` when `settings` would make searches
    /// silently empty or skewed.
    pub fn new(index: I, cache: EmbeddingCache, settings: SearchSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self { index: RwLock::new(index), cache, chunker: Chunker::new(), settings, progress: None })
    }

    /// Called with `(embedded, total)` after every chunk embedding.
    pub fn with_progress(mut self, progress: impl Fn(usize, usize) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }

    pub fn cache(&self) -> &EmbeddingCache { &self.cache }

    pub fn is_indexed(&self) -> bool { self.index.read().is_ready() }

    pub fn point_count(&self) -> Result<usize> { self.index.read().len() }

    /// Rebuild the index from the corpus at `source_path`.
    ///
    /// Every chunk is embedded before the collection is touched, so a missing
    /// file or a provider failure leaves the previous index intact.
    pub fn load_and_index_data(&self, source_path: &Path) -> Result<IndexReport> {
        let content = read_corpus(source_path)?;
        let chunks = self.chunker.chunk(&content);
        info!(path = %source_path.display(), chunks = chunks.len(), "indexing corpus");

        let total = chunks.len();
        let source = source_path.display().to_string();
        let mut points = Vec::with_capacity(total);
        for (i, chunk) in chunks.into_iter().enumerate() {
            let vector = self.cache.embed(&chunk.text, chunk.bucket)?;
            points.push(IndexedPoint {
                id: i as u64,
                vector: vector.to_vec(),
                payload: PointPayload {
                    text: chunk.text,
                    source: source.clone(),
                    lang: chunk.bucket,
                    file: chunk.origin,
                    start_line: chunk.start_line,
                    end_line: chunk.end_line,
                },
            });
            if let Some(progress) = &self.progress { progress(i + 1, total); }
        }

        let dimension = match points.first() {
            Some(p) => p.vector.len(),
            None => self.cache.embed(DIMENSION_PROBE, LanguageBucket::Default)?.len(),
        };

        let mut index = self.index.write();
        index.create_or_reset(dimension)?;
        for batch in points.chunks(UPSERT_BATCH) {
            index.upsert_batch(batch)?;
        }
        let stats = self.cache.stats();
        info!(points = points.len(), dimension, cache_hits = stats.hits, provider_calls = stats.provider_calls, "index rebuilt");
        Ok(IndexReport { chunks: points.len(), dimension })
    }

    /// Hybrid search. `top_k == 0` uses the configured default.
    pub fn search_code(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Err(Error::InvalidQuery("query must be a non-empty string".into()));
        }
        let top_k = if top_k == 0 { self.settings.top_k } else { top_k };
        let candidates = top_k.saturating_mul(self.settings.candidate_multiplier);

        let index = self.index.read();
        if !index.is_ready() {
            return Err(Error::IndexNotReady("no indexing pass has completed".into()));
        }
        let query_vector = self.cache.embed(query, LanguageBucket::Default)?;
        let vector_hits = index.vector_search(&query_vector, candidates)?;
        let keyword_hits = index.keyword_search(query, candidates)?;
        debug!(query, vector = vector_hits.len(), keyword = keyword_hits.len(), "candidates retrieved");

        let fused = fuse(&vector_hits, &keyword_hits, &FusionConfig::from(&self.settings), top_k);
        Ok(fused.into_iter().map(|p| SearchResult::from_payload(p.id, p.score, p.payload)).collect())
    }
}

//! Embedding providers and the content-addressed embedding cache.

pub mod cache;
pub mod hash;
pub mod ollama;

#[cfg(feature = "local-model")]
pub mod local;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use codesearch_core::config::{EmbeddingSettings, ProviderKind};
use codesearch_core::traits::EmbeddingProvider;
use codesearch_core::Result;

pub use cache::{content_hash, store_for_capacity, CacheStats, EmbeddingCache, LruStore, MemoryStore};
pub use hash::HashEmbedder;
pub use ollama::OllamaProvider;
#[cfg(feature = "local-model")]
pub use local::LocalModelProvider;

/// Build the configured provider. `APP_USE_FAKE_EMBEDDINGS=1` forces the
/// hash embedder regardless of configuration.
pub fn provider_from_settings(settings: &EmbeddingSettings) -> Result<Arc<dyn EmbeddingProvider>> {
    let use_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let kind = if use_fake { ProviderKind::Hash } else { settings.provider };
    info!(provider = ?kind, "selecting embedding provider");
    match kind {
        ProviderKind::Hash => Ok(Arc::new(HashEmbedder::new(settings.hash_dim))),
        ProviderKind::Ollama => {
            Ok(Arc::new(OllamaProvider::new(&settings.base_url, Duration::from_secs(settings.timeout_secs))?))
        }
        #[cfg(feature = "local-model")]
        ProviderKind::Local => Ok(Arc::new(LocalModelProvider::new())),
        #[cfg(not(feature = "local-model"))]
        ProviderKind::Local => {
            Err(codesearch_core::Error::InvalidConfig("embedding.provider = \"local\" requires the `local-model` feature".into()))
        }
    }
}

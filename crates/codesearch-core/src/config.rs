//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (`__` separates nested keys, e.g. `APP_SEARCH__TOP_K=5`).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::LanguageBucket;

pub struct Config {
    figment: Figment,
    env_name: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment, env_name })
    }

    /// Wrap an explicit figment (defaults are still layered underneath).
    pub fn from_figment(figment: Figment) -> Self {
        let figment = Figment::from(Serialized::defaults(Settings::default())).merge(figment);
        Self { figment, env_name: "custom".to_string() }
    }

    pub fn env_name(&self) -> &str { &self.env_name }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    /// Extract and validate the typed settings.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub index: IndexSettings,
    pub embedding: EmbeddingSettings,
    pub search: SearchSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub corpus_path: String,
    pub index_dir: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self { corpus_path: "merged_code.txt".to_string(), index_dir: "data/index".to_string() }
    }
}

impl DataSettings {
    pub fn corpus_path(&self, base: &Path) -> PathBuf { resolve_path(base, &self.corpus_path) }
    pub fn index_dir(&self, base: &Path) -> PathBuf { resolve_path(base, &self.index_dir) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    Memory,
    Lance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeywordBackend {
    /// Substring filter over the stored chunk text.
    Scan,
    Tantivy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub backend: IndexBackend,
    pub keyword: KeywordBackend,
    pub collection: String,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self { backend: IndexBackend::Memory, keyword: KeywordBackend::Scan, collection: "code_search".to_string() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Ollama,
    Hash,
    Local,
}

/// Embedding model per language bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelMap {
    pub code: String,
    pub markup: String,
    pub default: String,
}

impl Default for ModelMap {
    fn default() -> Self {
        let model = "nomic-embed-text".to_string();
        Self { code: model.clone(), markup: model.clone(), default: model }
    }
}

impl ModelMap {
    pub fn model_for(&self, bucket: LanguageBucket) -> &str {
        match bucket {
            LanguageBucket::Code => &self.code,
            LanguageBucket::Markup => &self.markup,
            LanguageBucket::Default => &self.default,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: ProviderKind,
    pub base_url: String,
    pub timeout_secs: u64,
    pub models: ModelMap,
    /// 0 keeps every vector; anything else bounds the cache with LRU eviction.
    pub cache_capacity: usize,
    pub persistent_cache: bool,
    pub hash_dim: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Ollama,
            base_url: "http://localhost:11434".to_string(),
            timeout_secs: 60,
            models: ModelMap::default(),
            cache_capacity: 0,
            persistent_cache: false,
            hash_dim: 384,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub top_k: usize,
    pub vector_weight: f32,
    /// Clamp negative position-decay contributions to zero.
    pub clamp_negative: bool,
    /// Each signal is asked for `top_k * candidate_multiplier` candidates.
    pub candidate_multiplier: usize,
    pub decay_step: f32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { top_k: 3, vector_weight: 0.7, clamp_negative: false, candidate_multiplier: 2, decay_step: 0.1 }
    }
}

impl SearchSettings {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.vector_weight) {
            return Err(Error::InvalidConfig(format!("search.vector_weight must be within [0, 1], got {}", self.vector_weight)));
        }
        if self.top_k == 0 { return Err(Error::InvalidConfig("search.top_k must be at least 1".into())); }
        if self.candidate_multiplier == 0 {
            return Err(Error::InvalidConfig("search.candidate_multiplier must be at least 1".into()));
        }
        if self.decay_step.is_nan() || self.decay_step < 0.0 {
            return Err(Error::InvalidConfig(format!("search.decay_step must be non-negative, got {}", self.decay_step)));
        }
        Ok(())
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.search.validate()?;
        if self.embedding.hash_dim == 0 { return Err(Error::InvalidConfig("embedding.hash_dim must be at least 1".into())); }
        if self.index.collection.trim().is_empty() { return Err(Error::InvalidConfig("index.collection must not be empty".into())); }
        Ok(())
    }
}

/// Expand `~` and `$VAR`/`${VAR}` in a configured path and anchor it at
/// `base` when relative. A reference to an unset variable keeps the path as
/// written.
pub fn resolve_path(base: &Path, raw: &str) -> PathBuf {
    let path = match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(raw),
    };
    if path.is_relative() { base.join(path) } else { path }
}

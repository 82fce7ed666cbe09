//! In-process XLM-RoBERTa embeddings via candle.
//!
//! Each model name maps to a directory holding `tokenizer.json`,
//! `config.json` and `pytorch_model.bin`. Models load lazily on first use.
//! Input is truncated to `MAX_TOKENS`; a single unpadded sequence is run per
//! call, so pooling is a plain mean over tokens followed by L2 normalisation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use parking_lot::Mutex;
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use codesearch_core::traits::EmbeddingProvider;
use codesearch_core::{Error, Result};

const MAX_TOKENS: usize = 256;
const SLOW_EMBED_MS: u128 = 100;

struct LoadedModel {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
}

pub struct LocalModelProvider {
    device: Device,
    root: Option<PathBuf>,
    models: Mutex<HashMap<String, Arc<LoadedModel>>>,
}

impl Default for LocalModelProvider {
    fn default() -> Self { Self::new() }
}

impl LocalModelProvider {
    /// Models are looked up under `APP_MODEL_DIR` (or `MODEL_DIR`) when set,
    /// otherwise under `models/` or `../models/`.
    pub fn new() -> Self {
        let root = ["APP_MODEL_DIR", "MODEL_DIR"].iter().find_map(|var| std::env::var_os(var)).map(PathBuf::from);
        Self::with_root(root)
    }

    pub fn with_root(root: Option<PathBuf>) -> Self {
        Self { device: pick_device(), root, models: Mutex::new(HashMap::new()) }
    }

    fn loaded(&self, name: &str) -> Result<Arc<LoadedModel>> {
        let mut models = self.models.lock();
        if let Some(m) = models.get(name) { return Ok(Arc::clone(m)); }
        let dir = model_dir(self.root.as_deref(), name)?;
        let loaded = Arc::new(load_model(name, &dir, &self.device)?);
        models.insert(name.to_string(), Arc::clone(&loaded));
        Ok(loaded)
    }

    fn embed_with(&self, name: &str, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let m = self.loaded(name)?;
        let candle = |e: candle_core::Error| Error::provider(name, e);

        let enc = m.tokenizer.encode(text, true).map_err(|e| Error::provider(name, anyhow!("tokenization failed: {e}")))?;
        let ids: Vec<u32> = enc.get_ids().iter().copied().take(MAX_TOKENS).collect();
        if ids.is_empty() {
            return Err(Error::provider(name, anyhow!("tokenizer produced no tokens")));
        }
        let len = ids.len();
        let input_ids = Tensor::from_vec(ids, (1, len), &self.device).map_err(candle)?;
        let attention_mask = Tensor::ones((1, len), DType::U32, &self.device).map_err(candle)?;
        let token_type_ids = Tensor::zeros((1, len), DType::U32, &self.device).map_err(candle)?;

        let hidden = m
            .model
            .forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)
            .map_err(candle)?;
        let v = mean_l2(&hidden).map_err(candle)?;

        let elapsed = start.elapsed().as_millis();
        if elapsed > SLOW_EMBED_MS { warn!(model = name, tokens = len, elapsed_ms = elapsed as u64, "slow embedding"); }
        Ok(v)
    }
}

impl EmbeddingProvider for LocalModelProvider {
    fn name(&self) -> &str { "local" }

    fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>> { self.embed_with(model, text) }
}

fn pick_device() -> Device {
    #[cfg(feature = "metal")]
    {
        match Device::new_metal(0) {
            Ok(dev) => {
                info!("local embeddings on Metal");
                return dev;
            }
            Err(e) => warn!(error = %e, "Metal unavailable, falling back to CPU"),
        }
    }
    info!("local embeddings on CPU");
    Device::Cpu
}

/// `[1, T, H]` hidden states to a unit-length `H` vector.
fn mean_l2(hidden: &Tensor) -> candle_core::Result<Vec<f32>> {
    let mut v: Vec<f32> = hidden.squeeze(0)?.mean(0)?.to_dtype(DType::F32)?.to_device(&Device::Cpu)?.to_vec1()?;
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    Ok(v)
}

fn load_model(name: &str, dir: &Path, device: &Device) -> Result<LoadedModel> {
    info!(model = name, dir = %dir.display(), "loading embedding model");
    let tokenizer_path = dir.join("tokenizer.json");
    let tokenizer = Tokenizer::from_file(&tokenizer_path)
        .map_err(|e| Error::provider(name, anyhow!("loading {}: {e}", tokenizer_path.display())))?;
    let raw = std::fs::read_to_string(dir.join("config.json"))?;
    let config: XLMRobertaConfig = serde_json::from_str(&raw).map_err(|e| Error::provider(name, e))?;
    let weights: HashMap<String, Tensor> = candle_core::pickle::read_all(dir.join("pytorch_model.bin"))
        .map_err(|e| Error::provider(name, e))?
        .into_iter()
        .collect();
    let vb = VarBuilder::from_tensors(weights, DType::F32, device);
    let model = XLMRobertaModel::new(&config, vb).map_err(|e| Error::provider(name, e))?;
    debug!(model = name, "embedding model ready");
    Ok(LoadedModel { model, tokenizer })
}

/// `<root>/<name>` when a root is configured, else `models/<name>` relative
/// to the working directory or its parent.
fn model_dir(root: Option<&Path>, name: &str) -> Result<PathBuf> {
    let candidates: Vec<PathBuf> = match root {
        Some(root) => vec![root.join(name)],
        None => vec![Path::new("models").join(name), Path::new("../models").join(name)],
    };
    candidates
        .into_iter()
        .find(|p| p.is_dir())
        .ok_or_else(|| Error::provider(name, anyhow!("no model directory for '{name}'")))
}

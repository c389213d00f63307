//! Sentence embedders behind the `docqa_core::traits::Embedder` seam.
//!
//! `BertEmbedder` runs a BERT-family encoder (e.g. `BAAI/bge-large-en-v1.5`,
//! `sentence-transformers/all-MiniLM-L6-v2`) from local files with candle and
//! returns mean-pooled, L2-normalized vectors. `FakeEmbedder` hashes tokens
//! and is selected with a `fake` / `fake:<dim>` model id or
//! `APP_USE_FAKE_EMBEDDINGS=1`.
use anyhow::{anyhow, Context};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;

use docqa_core::config::EmbeddingSettings;
use docqa_core::traits::Embedder;
use docqa_core::{Error, Result};

mod device;
mod fake;
mod pool;
mod tokenize;

pub use device::select_device;
pub use fake::FakeEmbedder;
pub use pool::masked_mean_l2;
pub use tokenize::tokenize_on_device;

const FAKE_DEFAULT_DIM: usize = 384;

pub struct BertEmbedder { model: BertModel, tokenizer: Tokenizer, device: Device, model_id: String, dim: usize, max_len: usize }

impl BertEmbedder {
    pub fn load(model_id: &str, model_dir: &Path, max_len: usize) -> anyhow::Result<Self> {
        let device = select_device();
        tracing::info!(model = model_id, dir = %model_dir.display(), "loading embedding model");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config_path = model_dir.join("config.json");
        let config: BertConfig = serde_json::from_str(&std::fs::read_to_string(&config_path).with_context(|| format!("reading {}", config_path.display()))?)?;
        let vb = load_weights(model_dir, &device)?;
        let model = BertModel::load(vb, &config)?;
        let max_len = max_len.min(config.max_position_embeddings);
        tracing::info!(model = model_id, dim = config.hidden_size, max_len, "embedding model loaded");
        Ok(Self { model, tokenizer, device, model_id: model_id.to_string(), dim: config.hidden_size, max_len })
    }

    fn embed_one(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize_on_device(&self.tokenizer, text, self.max_len, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let emb = pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_dtype(DType::F32)?.to_vec1::<f32>()?;
        if emb.len() != self.dim { return Err(anyhow!("model produced {} dims, expected {}", emb.len(), self.dim)); }
        if start.elapsed().as_millis() > 100 { tracing::debug!(elapsed_ms = start.elapsed().as_millis() as u64, "slow embedding"); }
        Ok(emb)
    }
}

impl Embedder for BertEmbedder {
    fn model_id(&self) -> &str { &self.model_id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts
            .iter()
            .map(|t| {
                if t.trim().is_empty() { return Err(Error::EmptyInput); }
                self.embed_one(t).map_err(|e| Error::EmbeddingUnavailable(format!("{e:#}")))
            })
            .collect()
    }
}

fn load_weights(model_dir: &Path, device: &Device) -> anyhow::Result<VarBuilder<'static>> {
    let safetensors = model_dir.join("model.safetensors");
    let tensors: std::collections::HashMap<String, Tensor> = if safetensors.exists() {
        candle_core::safetensors::load(&safetensors, device)?
    } else {
        let weights_path = model_dir.join("pytorch_model.bin");
        candle_core::pickle::read_all(&weights_path)
            .with_context(|| format!("reading {}", weights_path.display()))?
            .into_iter()
            .collect()
    };
    Ok(VarBuilder::from_tensors(tensors, DType::F32, device))
}

/// How to obtain the embedder used at serving and indexing time.
#[derive(Debug, Clone)]
pub struct EmbedderOptions {
    pub model_id: String,
    pub model_dir: Option<PathBuf>,
    pub max_len: usize,
}

impl EmbedderOptions {
    pub fn new(model_id: impl Into<String>) -> Self { Self { model_id: model_id.into(), model_dir: None, max_len: 512 } }

    pub fn from_settings(settings: &EmbeddingSettings) -> Self {
        Self { model_id: settings.model.clone(), model_dir: settings.model_dir.clone(), max_len: settings.max_len }
    }
}

/// Construct the embedder named by `opts`. Any initialization failure is
/// reported as `EmbeddingUnavailable`.
pub fn load_embedder(opts: &EmbedderOptions) -> Result<Arc<dyn Embedder>> {
    if let Some(dim) = fake_dim(&opts.model_id)? {
        tracing::info!(dim, "using FakeEmbedder");
        return Ok(Arc::new(FakeEmbedder::new(dim)));
    }
    let dir = resolve_model_dir(&opts.model_id, opts.model_dir.as_deref())
        .map_err(|e| Error::EmbeddingUnavailable(format!("{e:#}")))?;
    let model = BertEmbedder::load(&opts.model_id, &dir, opts.max_len)
        .map_err(|e| Error::EmbeddingUnavailable(format!("{}: {e:#}", opts.model_id)))?;
    Ok(Arc::new(model))
}

fn fake_dim(model_id: &str) -> Result<Option<usize>> {
    let use_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
    match model_id.strip_prefix("fake") {
        Some("") => Ok(Some(FAKE_DEFAULT_DIM)),
        Some(rest) => match rest.strip_prefix(':').and_then(|d| d.parse::<usize>().ok()) {
            Some(dim) if dim > 0 => Ok(Some(dim)),
            _ => Err(Error::EmbeddingUnavailable(format!("invalid fake model id '{model_id}'"))),
        },
        None if use_fake => Ok(Some(FAKE_DEFAULT_DIM)),
        None => Ok(None),
    }
}

fn resolve_model_dir(model_id: &str, explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    if let Some(p) = explicit { if p.exists() { return Ok(p.to_path_buf()); } return Err(anyhow!("model dir {} does not exist", p.display())); }
    if let Ok(dir) = std::env::var("APP_MODEL_DIR") { let p = PathBuf::from(&dir); if p.exists() { tracing::info!("Using APP_MODEL_DIR: {}", p.display()); return Ok(p); } }
    let name = model_id.rsplit('/').next().unwrap_or(model_id);
    for root in ["models", "../models"] {
        let p = Path::new(root).join(name);
        if p.exists() { tracing::info!("Using model dir: {}", p.display()); return Ok(p); }
    }
    Err(anyhow!("Could not locate model directory for {}", model_id))
}

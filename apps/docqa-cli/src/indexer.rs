use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::PathBuf;

use docqa_core::config::Settings;
use docqa_core::data_processor::{ChunkingConfig, DataProcessor};
use docqa_embed::{load_embedder, EmbedderOptions};
use docqa_vector::build_corpus;

const EMBED_BATCH_SIZE: usize = 32;

#[derive(Debug, Clone, Serialize)]
pub struct IndexSummary {
    pub num_chunks: usize,
    pub dim: usize,
    pub embedding_model_id: String,
    pub index_path: PathBuf,
    pub metadata_path: PathBuf,
}

/// Chunk every document under `ingest.source_dir`, embed the chunks and
/// write both index artifacts, replacing any previous ones.
pub fn build_index(settings: &Settings, show_progress: bool) -> Result<IndexSummary> {
    let source_dir = &settings.ingest.source_dir;
    if !source_dir.is_dir() {
        bail!("source directory {} does not exist", source_dir.display());
    }
    let processor = DataProcessor::new(ChunkingConfig {
        chunk_size: settings.ingest.chunk_size,
        chunk_overlap: settings.ingest.chunk_overlap,
    });
    let chunks = processor.process_directory(source_dir)?;
    if chunks.is_empty() {
        bail!("no .txt or .md documents with text found under {}", source_dir.display());
    }

    let embedder = load_embedder(&EmbedderOptions::from_settings(&settings.embedding))?;
    let corpus = build_corpus(chunks, embedder.as_ref(), EMBED_BATCH_SIZE, show_progress)?;

    let index_path = settings.index.index_path();
    let metadata_path = settings.index.metadata_path();
    corpus
        .persist(&index_path, &metadata_path)
        .with_context(|| format!("writing index to {}", settings.index.dir.display()))?;
    tracing::info!(chunks = corpus.num_chunks(), index = %index_path.display(), "index written");

    Ok(IndexSummary {
        num_chunks: corpus.num_chunks(),
        dim: corpus.dim(),
        embedding_model_id: embedder.model_id().to_string(),
        index_path,
        metadata_path,
    })
}

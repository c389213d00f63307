use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use docqa_core::traits::Embedder;
use docqa_core::types::{Chunk, RetrievalResult};
use docqa_core::{Error, Result};

use crate::index::VectorIndex;

/// Vectors and their chunk metadata, row `i` of the index describing
/// `chunks[i]`.
///
/// Built from `(vector, chunk)` pairs the two sides cannot diverge. Restored
/// artifacts may still disagree in length; rows without metadata are then
/// skipped at search time rather than mapped to the wrong chunk.
#[derive(Debug, Clone)]
pub struct IndexedCorpus {
    index: VectorIndex,
    chunks: Vec<Chunk>,
}

impl IndexedCorpus {
    pub fn from_pairs(pairs: Vec<(Vec<f32>, Chunk)>) -> Result<Self> {
        let (vectors, chunks): (Vec<Vec<f32>>, Vec<Chunk>) = pairs.into_iter().unzip();
        let index = VectorIndex::build(&vectors)?;
        Ok(Self { index, chunks })
    }

    /// Pair an index and a metadata list that were stored separately.
    pub fn from_artifacts(index: VectorIndex, chunks: Vec<Chunk>) -> Self {
        if index.len() != chunks.len() {
            tracing::warn!(
                num_vectors = index.len(),
                num_chunks = chunks.len(),
                "index and metadata lengths differ; rows without metadata will be skipped"
            );
        }
        Self { index, chunks }
    }

    pub fn index(&self) -> &VectorIndex { &self.index }
    pub fn chunks(&self) -> &[Chunk] { &self.chunks }
    pub fn num_vectors(&self) -> usize { self.index.len() }
    pub fn num_chunks(&self) -> usize { self.chunks.len() }
    pub fn dim(&self) -> usize { self.index.dim() }
    pub fn chunk(&self, row: usize) -> Option<&Chunk> { self.chunks.get(row) }

    /// Top-`k` chunks for an already-embedded query.
    ///
    /// A row index with no metadata entry is dropped, so the result may be
    /// shorter than `k`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievalResult>> {
        let hits = self.index.search(query, k)?;
        let mut results = Vec::with_capacity(hits.len());
        for (row, score) in hits {
            match self.chunk(row) {
                Some(chunk) => results.push(RetrievalResult { chunk: chunk.clone(), similarity_score: score }),
                None => tracing::debug!(row, num_chunks = self.chunks.len(), "skipping row without metadata"),
            }
        }
        Ok(results)
    }

    pub fn persist(&self, index_path: &Path, metadata_path: &Path) -> Result<()> {
        for p in [index_path, metadata_path] {
            if let Some(parent) = p.parent().filter(|d| !d.as_os_str().is_empty()) { fs::create_dir_all(parent)?; }
        }
        // Stage both files; rename only once both are written.
        let index_tmp = staging_path(index_path);
        let metadata_tmp = staging_path(metadata_path);
        let staged = self.index.persist(&index_tmp).and_then(|()| write_metadata(&self.chunks, &metadata_tmp));
        if let Err(e) = staged {
            let _ = fs::remove_file(&index_tmp);
            let _ = fs::remove_file(&metadata_tmp);
            return Err(e);
        }
        fs::rename(&index_tmp, index_path)?;
        fs::rename(&metadata_tmp, metadata_path)?;
        tracing::info!(
            index = %index_path.display(),
            metadata = %metadata_path.display(),
            rows = self.num_vectors(),
            "corpus persisted"
        );
        Ok(())
    }

    /// Read both artifacts. Every failure is reported as `IndexLoadFailure`.
    pub fn restore(index_path: &Path, metadata_path: &Path) -> Result<Self> {
        if !index_path.exists() {
            return Err(Error::IndexLoadFailure(format!("index not found at {}", index_path.display())));
        }
        if !metadata_path.exists() {
            return Err(Error::IndexLoadFailure(format!("metadata not found at {}", metadata_path.display())));
        }
        let index = VectorIndex::restore(index_path).map_err(|e| as_load_failure(e, index_path))?;
        tracing::info!(rows = index.len(), dim = index.dim(), "vector index loaded");
        let file = File::open(metadata_path).map_err(|e| as_load_failure(e.into(), metadata_path))?;
        let chunks: Vec<Chunk> = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::IndexLoadFailure(format!("{}: {}", metadata_path.display(), e)))?;
        tracing::info!(chunks = chunks.len(), "chunk metadata loaded");
        Ok(Self::from_artifacts(index, chunks))
    }
}

fn write_metadata(chunks: &[Chunk], path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, chunks)?;
    writer.flush()?;
    Ok(())
}

/// `<path>.tmp`, next to the final file so the rename stays on one filesystem.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn as_load_failure(e: Error, path: &Path) -> Error {
    match e {
        Error::IndexLoadFailure(_) => e,
        other => Error::IndexLoadFailure(format!("{}: {}", path.display(), other)),
    }
}

/// Embed `chunks` in batches of `batch_size` and pair each vector with its
/// chunk. Empty chunks are dropped before embedding.
pub fn build_corpus(chunks: Vec<Chunk>, embedder: &dyn Embedder, batch_size: usize, show_progress: bool) -> Result<IndexedCorpus> {
    let chunks: Vec<Chunk> = chunks.into_iter().filter(|c| !c.text.trim().is_empty()).collect();
    let pb = if show_progress { ProgressBar::new(chunks.len() as u64) } else { ProgressBar::hidden() };
    if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}") {
        pb.set_style(style.progress_chars("#>-"));
    }
    let mut pairs = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed_batch(&texts)?;
        if vectors.len() != batch.len() {
            return Err(Error::EmbeddingUnavailable(format!("embedder returned {} vectors for {} texts", vectors.len(), batch.len())));
        }
        pairs.extend(vectors.into_iter().zip(batch.iter().cloned()));
        pb.inc(batch.len() as u64);
    }
    pb.finish_with_message("embedded");
    tracing::info!(chunks = pairs.len(), model = embedder.model_id(), dim = embedder.dim(), "corpus embedded");
    IndexedCorpus::from_pairs(pairs)
}

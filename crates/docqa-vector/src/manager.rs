use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use docqa_core::traits::Embedder;
use docqa_core::types::RetrievalResult;
use docqa_core::{Error, Result};
use docqa_embed::{load_embedder, EmbedderOptions};

use crate::corpus::IndexedCorpus;

const UNLOADED: u8 = 0;
const LOADING: u8 = 1;
const READY: u8 = 2;
const FAILED: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loading,
    Ready,
    Failed,
}

/// Health payload. Serializes to `{loaded: true, ...counts}` when ready and
/// `{loaded: false, message}` otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum IndexStatus {
    Ready {
        loaded: bool,
        num_vectors: usize,
        num_chunks: usize,
        embedding_model_id: String,
        k_neighbors: usize,
    },
    NotReady {
        loaded: bool,
        message: String,
    },
}

impl IndexStatus {
    pub fn is_loaded(&self) -> bool { matches!(self, IndexStatus::Ready { .. }) }
}

struct Loaded {
    corpus: IndexedCorpus,
    embedder: Arc<dyn Embedder>,
}

/// Owns the corpus and embedder behind a one-shot load gate.
///
/// The manager moves `Unloaded -> Loading -> Ready | Failed` exactly once;
/// a failed load is terminal for the process. Once ready, the loaded state
/// is immutable and `search` reads it without locking, so one instance can
/// be shared (`Arc<IndexManager>`) across concurrent request handlers.
pub struct IndexManager {
    state: AtomicU8,
    loaded: OnceLock<Loaded>,
    failure: OnceLock<String>,
    k_neighbors: usize,
}

impl IndexManager {
    pub fn new(k_neighbors: usize) -> Self {
        Self { state: AtomicU8::new(UNLOADED), loaded: OnceLock::new(), failure: OnceLock::new(), k_neighbors }
    }

    pub fn state(&self) -> LoadState {
        match self.state.load(Ordering::Acquire) {
            UNLOADED => LoadState::Unloaded,
            LOADING => LoadState::Loading,
            READY => LoadState::Ready,
            _ => LoadState::Failed,
        }
    }

    pub fn is_loaded(&self) -> bool { self.state() == LoadState::Ready }
    pub fn k_neighbors(&self) -> usize { self.k_neighbors }

    /// Read the persisted index and metadata, then load the embedder.
    ///
    /// Nothing becomes searchable unless every step succeeds.
    pub fn load(&self, index_path: &Path, metadata_path: &Path, embedder: &EmbedderOptions) -> Result<()> {
        self.run_load(|| {
            tracing::info!(index = %index_path.display(), "loading index");
            let corpus = IndexedCorpus::restore(index_path, metadata_path)?;
            tracing::info!(model = %embedder.model_id, "loading embedding model");
            let embedder = load_embedder(embedder)?;
            Ok(Loaded { corpus, embedder })
        })
    }

    /// Activate an already-built corpus, e.g. one produced in-process.
    pub fn activate(&self, corpus: IndexedCorpus, embedder: Arc<dyn Embedder>) -> Result<()> {
        self.run_load(|| Ok(Loaded { corpus, embedder }))
    }

    fn run_load(&self, load: impl FnOnce() -> Result<Loaded>) -> Result<()> {
        if self.state.compare_exchange(UNLOADED, LOADING, Ordering::AcqRel, Ordering::Acquire).is_err() {
            return Err(Error::IndexLoadFailure(format!(
                "load already attempted (state {:?}); restart the process to reload", self.state()
            )));
        }
        match load() {
            Ok(loaded) => {
                if loaded.corpus.num_vectors() > 0 && loaded.corpus.dim() != loaded.embedder.dim() {
                    tracing::warn!(
                        index_dim = loaded.corpus.dim(),
                        embedder_dim = loaded.embedder.dim(),
                        "embedding dimension differs from index dimension; searches will fail"
                    );
                }
                tracing::info!(
                    num_vectors = loaded.corpus.num_vectors(),
                    num_chunks = loaded.corpus.num_chunks(),
                    model = loaded.embedder.model_id(),
                    "index loaded and ready"
                );
                let _ = self.loaded.set(loaded);
                self.state.store(READY, Ordering::Release);
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load index");
                let _ = self.failure.set(e.to_string());
                self.state.store(FAILED, Ordering::Release);
                Err(e)
            }
        }
    }

    /// Embed `query` and return up to `k` chunks, most similar first.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievalResult>> {
        let loaded = self.ready()?;
        let query_vec = loaded.embedder.embed(query)?;
        let results = loaded.corpus.search(&query_vec, k)?;
        tracing::debug!(k, returned = results.len(), "search complete");
        Ok(results)
    }

    pub fn status(&self) -> IndexStatus {
        match (self.state(), self.loaded.get()) {
            (LoadState::Ready, Some(loaded)) => IndexStatus::Ready {
                loaded: true,
                num_vectors: loaded.corpus.num_vectors(),
                num_chunks: loaded.corpus.num_chunks(),
                embedding_model_id: loaded.embedder.model_id().to_string(),
                k_neighbors: self.k_neighbors,
            },
            (LoadState::Failed, _) => IndexStatus::NotReady {
                loaded: false,
                message: format!("index failed to load: {}", self.failure.get().map_or("unknown error", String::as_str)),
            },
            (LoadState::Loading, _) => IndexStatus::NotReady { loaded: false, message: "index is loading".to_string() },
            _ => IndexStatus::NotReady { loaded: false, message: "index not loaded".to_string() },
        }
    }

    fn ready(&self) -> Result<&Loaded> {
        if self.state() != LoadState::Ready { return Err(Error::NotReady); }
        self.loaded.get().ok_or(Error::NotReady)
    }
}

use anyhow::{Context, Result};
use std::sync::Arc;

use docqa_core::config::Settings;
use docqa_core::Error;
use docqa_embed::EmbedderOptions;
use docqa_relay::{AskRequest, FrameStream, GenerationBackend, OpenAiCompatibleBackend, PromptAssembler, StreamRelay};
use docqa_vector::IndexManager;

/// Question answering over a loaded index.
///
/// `ask` refuses with `Error::NotReady` before doing any retrieval work when
/// the index is not loaded. Otherwise it retrieves the top `k_neighbors`
/// chunks on a blocking thread and hands them to the relay; failures after
/// that point arrive as an error frame inside the returned stream.
pub struct QaPipeline {
    manager: Arc<IndexManager>,
    relay: StreamRelay,
    model: String,
    default_temperature: f32,
}

impl QaPipeline {
    pub fn new(manager: Arc<IndexManager>, relay: StreamRelay, model: impl Into<String>, default_temperature: f32) -> Self {
        Self { manager, relay, model: model.into(), default_temperature }
    }

    /// Pipeline backed by the configured OpenAI-compatible endpoint.
    pub fn from_settings(settings: &Settings, manager: Arc<IndexManager>) -> Result<Self> {
        let backend: Arc<dyn GenerationBackend> = Arc::new(OpenAiCompatibleBackend::from_settings(&settings.generation)?);
        Ok(Self::with_backend(settings, manager, backend))
    }

    pub fn with_backend(settings: &Settings, manager: Arc<IndexManager>, backend: Arc<dyn GenerationBackend>) -> Self {
        let relay = StreamRelay::new(backend, PromptAssembler::from_settings(&settings.prompt));
        Self::new(manager, relay, settings.generation.model.clone(), settings.generation.temperature)
    }

    pub fn manager(&self) -> &Arc<IndexManager> { &self.manager }

    /// Load the persisted index named by `settings`. A failure is logged and
    /// leaves the manager in its failed state; the status surface reports it.
    pub async fn load_index(&self, settings: &Settings) -> Result<()> {
        let manager = Arc::clone(&self.manager);
        let index_path = settings.index.index_path();
        let metadata_path = settings.index.metadata_path();
        let options = EmbedderOptions::from_settings(&settings.embedding);
        tokio::task::spawn_blocking(move || manager.load(&index_path, &metadata_path, &options))
            .await
            .context("index load task panicked")??;
        Ok(())
    }

    pub async fn ask(&self, request: AskRequest) -> Result<FrameStream> {
        if !self.manager.is_loaded() {
            return Err(Error::NotReady.into());
        }
        request.validate()?;
        let temperature = request.temperature_or(self.default_temperature);

        let manager = Arc::clone(&self.manager);
        let question = request.question.clone();
        let k = manager.k_neighbors();
        let chunks = tokio::task::spawn_blocking(move || manager.search(&question, k))
            .await
            .context("retrieval task panicked")??;
        tracing::info!(retrieved = chunks.len(), history = request.history.len(), "context retrieved");

        Ok(self.relay.stream(&request.question, &chunks, &self.model, temperature, &request.history))
    }

    /// `{status: "ok", index: {...}}`, available whatever the load state.
    pub fn health(&self) -> serde_json::Value {
        serde_json::json!({ "status": "ok", "index": self.manager.status() })
    }
}

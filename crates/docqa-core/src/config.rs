//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (nested keys split on `__`, e.g. `APP_GENERATION__MODEL`). `GROQ_API_KEY`
//! is accepted as an alias for `generation.api_key`.
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::PromptTemplate;

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    /// Load config files found in `base_dir`; relative paths in the settings
    /// are resolved against it.
    pub fn load_from(base_dir: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file(base_dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(base_dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(base_dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(base_dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment
            .merge(Env::raw().filter_map(|key| {
                key.as_str().eq_ignore_ascii_case("GROQ_API_KEY").then(|| "generation.api_key".into())
            }))
            .merge(Env::prefixed("APP_").split("__"));

        tracing::debug!(env = %env_name, base_dir = %base_dir.display(), "configuration sources merged");
        Ok(Self::from_figment(figment, base_dir))
    }

    pub fn from_figment(figment: Figment, base_dir: &Path) -> Self {
        Self { figment, base_dir: base_dir.to_path_buf() }
    }

    /// Extract, path-resolve and validate the typed settings.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.index.dir = resolve_with_base(&self.base_dir, settings.index.dir.to_string_lossy());
        settings.ingest.source_dir = resolve_with_base(&self.base_dir, settings.ingest.source_dir.to_string_lossy());
        if let Some(dir) = settings.embedding.model_dir.take() {
            settings.embedding.model_dir = Some(resolve_with_base(&self.base_dir, dir.to_string_lossy()));
        }
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub index: IndexSettings,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
    pub prompt: PromptSettings,
    pub ingest: IngestSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub dir: PathBuf,
    pub index_file: String,
    pub metadata_file: String,
    pub k_neighbors: usize,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./faiss_index"),
            index_file: "index.bin".to_string(),
            metadata_file: "index.json".to_string(),
            k_neighbors: 5,
        }
    }
}

impl IndexSettings {
    pub fn index_path(&self) -> PathBuf { self.dir.join(&self.index_file) }
    pub fn metadata_path(&self) -> PathBuf { self.dir.join(&self.metadata_file) }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model: String,
    pub model_dir: Option<PathBuf>,
    pub max_len: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { model: "BAAI/bge-large-en-v1.5".to_string(), model_dir: None, max_len: 512 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub api_key: Option<String>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            temperature: 0.7,
            max_tokens: 1024,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    pub template: PromptTemplate,
    pub assistant_name: String,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self { template: PromptTemplate::default(), assistant_name: "Barfield AI".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub source_dir: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self { source_dir: PathBuf::from("./source_docs"), chunk_size: 1000, chunk_overlap: 200 }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(Error::InvalidConfig(format!(
                "generation.temperature must be within [0.0, 2.0], got {}",
                self.generation.temperature
            )));
        }
        if self.index.k_neighbors == 0 {
            return Err(Error::InvalidConfig("index.k_neighbors must be at least 1".to_string()));
        }
        if self.ingest.chunk_size == 0 || self.ingest.chunk_overlap >= self.ingest.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "ingest.chunk_overlap ({}) must be smaller than ingest.chunk_size ({})",
                self.ingest.chunk_overlap, self.ingest.chunk_size
            )));
        }
        if self.embedding.max_len == 0 {
            return Err(Error::InvalidConfig("embedding.max_len must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Vector index has not been built")]
    NotBuilt,

    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Index is not ready")]
    NotReady,

    #[error("Embedding model unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Input text is empty")]
    EmptyInput,

    #[error("Failed to load index: {0}")]
    IndexLoadFailure(String),

    #[error("Generation backend failed: {0}")]
    BackendFailure(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

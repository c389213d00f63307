use crate::error::{Error, Result};

/// Maps text to a fixed-dimension, L2-normalized vector.
///
/// Implementations must be deterministic for a fixed model and input and
/// must be safe to share across request handlers once constructed.
pub trait Embedder: Send + Sync {
    /// Identifier of the loaded model (e.g. `BAAI/bge-large-en-v1.5`).
    fn model_id(&self) -> &str;
    /// Embedding dimensionality (D).
    fn dim(&self) -> usize;
    /// Maximum token length fed to the model.
    fn max_len(&self) -> usize;
    /// Compute normalized embeddings for a batch of non-empty texts.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(Error::EmptyInput);
        }
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| Error::EmbeddingUnavailable("model returned no embedding".to_string()))
    }
}

/// Scale `v` to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

use std::hash::{Hash, Hasher};

use docqa_core::traits::{l2_normalize, Embedder};
use docqa_core::Result;
use twox_hash::XxHash64;

/// Deterministic hashing embedder for tests and development.
///
/// Each whitespace token is hashed into one of `dim` buckets; texts sharing
/// tokens therefore land close to each other.
pub struct FakeEmbedder { dim: usize, model_id: String }

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim, model_id: format!("fake:{dim}") } }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i % 3) as f32 * 0.01;
        }
        l2_normalize(&mut v);
        v
    }
}

impl Embedder for FakeEmbedder {
    fn model_id(&self) -> &str { &self.model_id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

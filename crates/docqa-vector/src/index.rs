use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use docqa_core::{Error, Result};

pub const FORMAT_VERSION: u32 = 1;

/// Flat exact-search index over L2-normalized vectors, stored row-major.
///
/// Scores are raw inner products; with normalized inputs this is cosine
/// similarity. No approximation or quantization is applied.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    dim: usize,
    data: Vec<f32>,
    built: bool,
}

#[derive(Deserialize)]
struct IndexFile {
    format_version: u32,
    dim: u32,
    rows: u64,
    data: Vec<f32>,
}

/// Write-side view of `IndexFile`; same encoding, borrows the payload.
#[derive(Serialize)]
struct IndexFileRef<'a> {
    format_version: u32,
    dim: u32,
    rows: u64,
    data: &'a [f32],
}

impl VectorIndex {
    /// An index with no rows that rejects searches with `NotBuilt`.
    pub fn new() -> Self { Self::default() }

    /// Store `vectors` for exact comparison. Every row must have the same,
    /// non-zero length. An empty input builds an empty index.
    pub fn build(vectors: &[Vec<f32>]) -> Result<Self> {
        let dim = vectors.first().map_or(0, Vec::len);
        if !vectors.is_empty() && dim == 0 {
            return Err(Error::DimensionMismatch { expected: 1, found: 0 });
        }
        let mut data = Vec::with_capacity(vectors.len() * dim);
        for row in vectors {
            if row.len() != dim {
                return Err(Error::DimensionMismatch { expected: dim, found: row.len() });
            }
            data.extend_from_slice(row);
        }
        Ok(Self { dim, data, built: true })
    }

    pub fn is_built(&self) -> bool { self.built }
    pub fn dim(&self) -> usize { self.dim }
    pub fn len(&self) -> usize { if self.dim == 0 { 0 } else { self.data.len() / self.dim } }
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn row(&self, i: usize) -> Option<&[f32]> {
        if i >= self.len() { return None; }
        self.data.get(i * self.dim..(i + 1) * self.dim)
    }

    /// Top-`k` rows by inner product with `query`, best first.
    ///
    /// Ties are broken by ascending row index so repeated searches return the
    /// same ordering. `k > len()` returns every row.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if !self.built { return Err(Error::NotBuilt); }
        if self.is_empty() || k == 0 { return Ok(Vec::new()); }
        if query.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, found: query.len() });
        }

        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dim)
            .map(|row| row.iter().zip(query).map(|(a, b)| a * b).sum::<f32>())
            .enumerate()
            .collect();

        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, rank_order);
            scored.truncate(k);
        }
        scored.sort_by(rank_order);
        Ok(scored)
    }

    pub fn persist(&self, path: &Path) -> Result<()> {
        if !self.built { return Err(Error::NotBuilt); }
        let dim = u32::try_from(self.dim).map_err(|_| Error::Serialization(format!("dimension {} too large", self.dim)))?;
        let file = IndexFileRef { format_version: FORMAT_VERSION, dim, rows: self.len() as u64, data: &self.data };
        let mut writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(&mut writer, &file).map_err(|e| Error::Serialization(e.to_string()))?;
        writer.flush()?;
        tracing::debug!(path = %path.display(), rows = self.len(), dim = self.dim, "vector index persisted");
        Ok(())
    }

    pub fn restore(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let file: IndexFile = bincode::deserialize_from(reader)
            .map_err(|e| Error::IndexLoadFailure(format!("{}: {}", path.display(), e)))?;
        if file.format_version != FORMAT_VERSION {
            return Err(Error::IndexLoadFailure(format!(
                "{}: unsupported index format version {}", path.display(), file.format_version
            )));
        }
        let dim = file.dim as usize;
        let expected = usize::try_from(file.rows).ok().and_then(|rows| rows.checked_mul(dim));
        if expected != Some(file.data.len()) || (dim == 0 && file.rows > 0) {
            return Err(Error::IndexLoadFailure(format!(
                "{}: header declares {} rows of dim {} but payload has {} values",
                path.display(), file.rows, dim, file.data.len()
            )));
        }
        Ok(Self { dim, data: file.data, built: true })
    }
}

fn rank_order(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then(a.0.cmp(&b.0))
}

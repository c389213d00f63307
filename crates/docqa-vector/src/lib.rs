//! Exact inner-product retrieval over a pre-built corpus.
//!
//! - `index`: flat `VectorIndex` with deterministic top-k and binary persistence
//! - `corpus`: `IndexedCorpus`, vectors and chunk metadata kept row-aligned
//! - `manager`: `IndexManager`, the load/ready gate used by request handlers

pub mod corpus;
pub mod index;
pub mod manager;

pub use corpus::{build_corpus, IndexedCorpus};
pub use index::VectorIndex;
pub use manager::{IndexManager, IndexStatus, LoadState};

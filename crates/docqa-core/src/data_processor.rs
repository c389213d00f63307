//! Offline text loading and chunking for the indexer.
//!
//! Documents are split with a recursive character splitter: try paragraph
//! breaks first, then line breaks, then spaces, then single characters, and
//! greedily merge the pieces back into chunks of at most `chunk_size`
//! characters, carrying up to `chunk_overlap` characters into the next chunk.
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::Chunk;

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];
const EXTENSIONS: [&str; 2] = ["txt", "md"];

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 1000, chunk_overlap: 200 }
    }
}

#[derive(Default)]
pub struct DataProcessor {
    chunking_config: ChunkingConfig,
}

impl DataProcessor {
    pub fn new(chunking_config: ChunkingConfig) -> Self { Self { chunking_config } }

    pub fn process_directory(&self, data_dir: &Path) -> Result<Vec<Chunk>> {
        let files = self.list_source_files(data_dir);
        if files.is_empty() {
            tracing::warn!(dir = %data_dir.display(), "no source documents found");
            return Ok(vec![]);
        }
        let mut all_chunks = Vec::new();
        for (file_index, file_path) in files.iter().enumerate() {
            tracing::info!("Processing file {}/{}: {}", file_index + 1, files.len(), file_path.display());
            let content = self.read_file_content(file_path)?;
            let source = self.source_name(file_path);
            let chunks = self.split_document(&content, &source);
            tracing::debug!(source = %source, chunks = chunks.len(), "document split");
            all_chunks.extend(chunks);
        }
        tracing::info!("Processed {} files into {} chunks", files.len(), all_chunks.len());
        Ok(all_chunks)
    }

    /// Split one document into chunks numbered from 0 in reading order.
    pub fn split_document(&self, content: &str, source: &str) -> Vec<Chunk> {
        self.split_text(content)
            .into_iter()
            .enumerate()
            .map(|(chunk_id, text)| Chunk::new(text, source, chunk_id))
            .collect()
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &SEPARATORS)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let (position, separator) = separators
            .iter()
            .enumerate()
            .find(|(_, sep)| sep.is_empty() || text.contains(**sep))
            .map_or((separators.len(), ""), |(i, sep)| (i, *sep));
        let remaining = separators.get(position + 1..).unwrap_or(&[]);

        let pieces: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator).map(str::to_string).collect()
        };

        let mut chunks = Vec::new();
        let mut fitting = Vec::new();
        for piece in pieces {
            if char_len(&piece) < self.chunking_config.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                chunks.extend(self.merge_pieces(&fitting, separator));
                fitting.clear();
            }
            if remaining.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split_recursive(&piece, remaining));
            }
        }
        if !fitting.is_empty() {
            chunks.extend(self.merge_pieces(&fitting, separator));
        }
        chunks
    }

    fn merge_pieces(&self, pieces: &[String], separator: &str) -> Vec<String> {
        let ChunkingConfig { chunk_size, chunk_overlap } = self.chunking_config;
        let sep_len = char_len(separator);
        let mut merged = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            let joiner = if window.is_empty() { 0 } else { sep_len };
            if total + len + joiner > chunk_size && !window.is_empty() {
                push_trimmed(&mut merged, &window, separator);
                // Drop from the front until the carried-over tail fits the overlap.
                while total > chunk_overlap || (total > 0 && total + len + sep_len > chunk_size) {
                    let Some(front) = window.pop_front() else { break };
                    total -= char_len(front) + if window.is_empty() { 0 } else { sep_len };
                }
            }
            if !window.is_empty() {
                total += sep_len;
            }
            window.push_back(piece);
            total += len;
        }
        push_trimmed(&mut merged, &window, separator);
        merged
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
        }
    }

    fn source_name(&self, file_path: &Path) -> String {
        file_path
            .file_name()
            .map_or_else(|| file_path.to_string_lossy().to_string(), |n| n.to_string_lossy().to_string())
    }

    fn list_source_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path();
            let ext = path.extension().and_then(|s| s.to_str()).map(str::to_ascii_lowercase);
            if ext.as_deref().is_some_and(|e| EXTENSIONS.contains(&e)) { files.push(path.to_path_buf()); }
        }
        files.sort(); files
    }
}

fn char_len(s: &str) -> usize { s.chars().count() }

fn push_trimmed(out: &mut Vec<String>, window: &VecDeque<&str>, separator: &str) {
    let joined = window.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() { out.push(trimmed.to_string()); }
}

use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

use docqa_core::config::{resolve_with_base, Config};
use docqa_core::data_processor::{ChunkingConfig, DataProcessor};
use docqa_core::types::{ConversationTurn, PromptTemplate, RetrievalResult, Chunk, Role};
use docqa_core::Error;
use figment::{providers::{Format, Toml}, Figment};

#[test]
fn process_directory_single_small_file() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let file_path = dir.join("a.txt");
    let mut f = fs::File::create(&file_path).unwrap();
    writeln!(f, "Short text").unwrap();

    let processor = DataProcessor::default();
    let chunks = processor.process_directory(dir).expect("process");

    assert_eq!(chunks.len(), 1, "one small paragraph becomes one chunk");
    assert_eq!(chunks[0].text, "Short text");
    assert_eq!(chunks[0].source, "a.txt");
    assert_eq!(chunks[0].chunk_id, 0);
}

#[test]
fn process_directory_skips_unsupported_files_and_sorts() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("b.md"), "bravo").unwrap();
    fs::write(dir.join("a.txt"), "alpha").unwrap();
    fs::write(dir.join("c.pdf"), "not extracted").unwrap();

    let chunks = DataProcessor::default().process_directory(dir).expect("process");
    let sources: Vec<&str> = chunks.iter().map(|c| c.source.as_str()).collect();
    assert_eq!(sources, vec!["a.txt", "b.md"]);
}

#[test]
fn split_respects_chunk_size_and_carries_overlap() {
    let processor = DataProcessor::new(ChunkingConfig { chunk_size: 20, chunk_overlap: 8 });
    let text = "one two three four five six seven eight nine ten";
    let chunks = processor.split_text(text);

    assert!(chunks.len() > 1, "long text is split");
    for c in &chunks {
        assert!(c.chars().count() <= 20, "chunk too long: {c:?}");
    }
    // Consecutive chunks share at least one word thanks to the overlap.
    for pair in chunks.windows(2) {
        let last_word = pair[0].split_whitespace().last().unwrap();
        assert!(pair[1].contains(last_word), "{:?} does not overlap {:?}", pair[1], pair[0]);
    }
    assert!(chunks.first().unwrap().starts_with("one"));
    assert!(chunks.last().unwrap().ends_with("ten"));
}

#[test]
fn split_prefers_paragraph_boundaries() {
    let processor = DataProcessor::new(ChunkingConfig { chunk_size: 30, chunk_overlap: 0 });
    let chunks = processor.split_text("first paragraph here\n\nsecond paragraph here");
    assert_eq!(chunks, vec!["first paragraph here".to_string(), "second paragraph here".to_string()]);
}

#[test]
fn split_document_numbers_chunks_per_source() {
    let processor = DataProcessor::new(ChunkingConfig { chunk_size: 10, chunk_overlap: 0 });
    let chunks = processor.split_document("aaaa bbbb cccc dddd", "manual.txt");
    let ids: Vec<usize> = chunks.iter().map(|c| c.chunk_id).collect();
    assert_eq!(ids, (0..chunks.len()).collect::<Vec<_>>());
    assert!(chunks.iter().all(|c| c.source == "manual.txt" && !c.text.is_empty()));
}

#[test]
fn split_falls_back_to_characters_for_unbroken_text() {
    let processor = DataProcessor::new(ChunkingConfig { chunk_size: 4, chunk_overlap: 0 });
    let chunks = processor.split_text("abcdefghij");
    assert_eq!(chunks, vec!["abcd".to_string(), "efgh".to_string(), "ij".to_string()]);
}

fn config_from(toml: &str) -> Config {
    Config::from_figment(Figment::new().merge(Toml::string(toml)), Path::new("/srv/app"))
}

#[test]
fn settings_defaults() {
    let settings = config_from("").settings().expect("settings");
    assert_eq!(settings.index.k_neighbors, 5);
    assert_eq!(settings.index.index_path(), Path::new("/srv/app/./faiss_index/index.bin"));
    assert_eq!(settings.index.metadata_path(), Path::new("/srv/app/./faiss_index/index.json"));
    assert_eq!(settings.embedding.model, "BAAI/bge-large-en-v1.5");
    assert_eq!(settings.generation.model, "llama-3.3-70b-versatile");
    assert!((settings.generation.temperature - 0.7).abs() < 1e-6);
    assert_eq!(settings.generation.max_tokens, 1024);
    assert_eq!(settings.prompt.template, PromptTemplate::Grounded);
}

#[test]
fn settings_override_from_toml() {
    let config = config_from(
        r#"
        [index]
        dir = "/data/index"
        k_neighbors = 3

        [prompt]
        template = "context_only"
        "#,
    );
    let settings = config.settings().expect("settings");
    assert_eq!(settings.index.dir, Path::new("/data/index"));
    assert_eq!(settings.index.k_neighbors, 3);
    assert_eq!(settings.prompt.template, PromptTemplate::ContextOnly);
}

#[test]
fn settings_reject_out_of_range_temperature() {
    let err = config_from("[generation]\ntemperature = 2.5").settings().unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)), "got {err:?}");
}

#[test]
fn settings_reject_overlap_not_smaller_than_chunk_size() {
    let err = config_from("[ingest]\nchunk_size = 100\nchunk_overlap = 100").settings().unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)), "got {err:?}");
}

#[test]
fn resolve_keeps_absolute_paths() {
    assert_eq!(resolve_with_base(Path::new("/base"), "/abs/x"), Path::new("/abs/x"));
    assert_eq!(resolve_with_base(Path::new("/base"), "rel/x"), Path::new("/base/rel/x"));
}

#[test]
fn wire_shapes_of_domain_types() {
    let turn: ConversationTurn = serde_json::from_str(r#"{"role":"assistant","content":"hi"}"#).unwrap();
    assert_eq!(turn.role, Role::Assistant);
    assert_eq!(Role::User.label(), "User");

    let result = RetrievalResult { chunk: Chunk::new("A", "doc1", 0), similarity_score: 0.5 };
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["source"], "doc1");
    assert_eq!(json["chunk_id"], 0);
    assert_eq!(json["similarity_score"], 0.5);
}

#[test]
fn load_from_reads_config_file_and_resolves_paths() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("config.toml"),
        "[index]\ndir = \"idx\"\nk_neighbors = 7\n\n[ingest]\nsource_dir = \"docs\"\n",
    )
    .unwrap();

    let settings = Config::load_from(tmp.path()).unwrap().settings().unwrap();
    assert_eq!(settings.index.k_neighbors, 7);
    assert_eq!(settings.index.dir, tmp.path().join("idx"));
    assert_eq!(settings.index.index_path(), tmp.path().join("idx").join("index.bin"));
    assert_eq!(settings.ingest.source_dir, tmp.path().join("docs"));
}

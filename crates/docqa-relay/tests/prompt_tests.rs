use docqa_core::types::{Chunk, ConversationTurn, PromptTemplate, RetrievalResult};
use docqa_relay::prompt::{render_context, render_history};
use docqa_relay::PromptAssembler;

fn result(text: &str, source: &str, chunk_id: usize, score: f32) -> RetrievalResult {
    RetrievalResult { chunk: Chunk::new(text, source, chunk_id), similarity_score: score }
}

#[test]
fn empty_history_renders_none_placeholder() {
    let prompt = PromptAssembler::default().assemble("Why?", &[], &[]);
    assert!(prompt.contains("Conversation History:\nNone\n"));
    assert!(prompt.contains("User Question: Why?"));
    assert!(prompt.ends_with("Answer:"));
}

#[test]
fn parts_are_numbered_in_retrieval_order() {
    let chunks = vec![result("first text", "a.txt", 3, 0.87654), result("second text", "b.md", 0, 0.5)];
    let prompt = PromptAssembler::default().assemble("q", &chunks, &[]);

    let first = prompt.find("[Part 1] (Document: a.txt, Relevance: 0.877)\nfirst text").unwrap();
    let second = prompt.find("[Part 2] (Document: b.md, Relevance: 0.500)\nsecond text").unwrap();
    assert!(first < second);
}

#[test]
fn context_parts_are_blank_line_separated() {
    let chunks = vec![result("x", "a", 0, 0.1), result("y", "b", 0, 0.2)];
    assert_eq!(
        render_context(&chunks),
        "[Part 1] (Document: a, Relevance: 0.100)\nx\n\n[Part 2] (Document: b, Relevance: 0.200)\ny"
    );
    assert_eq!(render_context(&[]), "");
}

#[test]
fn history_uses_capitalized_role_labels() {
    let history = vec![ConversationTurn::user("hi"), ConversationTurn::assistant("hello")];
    assert_eq!(render_history(&history), "User: hi\nAssistant: hello");

    let prompt = PromptAssembler::default().assemble("q", &[], &history);
    assert!(prompt.contains("Conversation History:\nUser: hi\nAssistant: hello\n"));
}

#[test]
fn grounded_template_allows_general_knowledge() {
    let prompt = PromptAssembler::default().assemble("q", &[], &[]);
    assert!(prompt.contains("answer based on your knowledge"));
    assert!(!prompt.contains("ONLY from"));
}

#[test]
fn context_only_template_forbids_general_knowledge() {
    let assembler = PromptAssembler::new(PromptTemplate::ContextOnly, "Barfield AI");
    assert_eq!(assembler.template(), PromptTemplate::ContextOnly);
    let prompt = assembler.assemble("q", &[], &[]);
    assert!(prompt.contains("ONLY from the information provided"));
    assert!(prompt.contains("Do not answer from general knowledge"));
}

#[test]
fn assistant_name_is_configurable() {
    let prompt = PromptAssembler::new(PromptTemplate::Grounded, "Homestead Helper").assemble("q", &[], &[]);
    assert!(prompt.starts_with("You are an intelligent assistant, named \"Homestead Helper\""));
}

#[test]
fn assembly_is_deterministic() {
    let chunks = vec![result("t", "s", 0, 0.3)];
    let history = vec![ConversationTurn::user("u")];
    let assembler = PromptAssembler::default();
    assert_eq!(assembler.assemble("q", &chunks, &history), assembler.assemble("q", &chunks, &history));
}

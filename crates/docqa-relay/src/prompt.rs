use docqa_core::config::PromptSettings;
use docqa_core::types::{ConversationTurn, PromptTemplate, RetrievalResult};

const GROUNDED_INSTRUCTIONS: &str = "\
- Answer the question based on the information provided in the context above or in the conversation history
- If the question asks to repeat a previous answer, use the relevant part of the history
- If the context or history don't contain enough information to answer the question, say so clearly
- If the question doesn't need any context or history, answer based on your knowledge
- Be concise and accurate
- Cite which document(s) you're referencing in your answer (at the end after jumping to the next line) if you reference any documents";

const CONTEXT_ONLY_INSTRUCTIONS: &str = "\
- Answer the question ONLY from the information provided in the context above or in the conversation history
- If the question asks to repeat a previous answer, use the relevant part of the history
- If the context or history don't contain enough information to answer the question, say so clearly and do not guess
- Do not answer from general knowledge
- Be concise and accurate
- Cite which document(s) you're referencing in your answer (at the end after jumping to the next line) if you reference any documents";

/// Builds the single user prompt sent to the generation backend.
///
/// Pure and total: any combination of question, chunks and history
/// (including empty ones) yields a well-formed prompt.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    template: PromptTemplate,
    assistant_name: String,
}

impl Default for PromptAssembler {
    fn default() -> Self { Self::from_settings(&PromptSettings::default()) }
}

impl PromptAssembler {
    pub fn new(template: PromptTemplate, assistant_name: impl Into<String>) -> Self {
        Self { template, assistant_name: assistant_name.into() }
    }

    pub fn from_settings(settings: &PromptSettings) -> Self {
        Self::new(settings.template, settings.assistant_name.clone())
    }

    pub fn template(&self) -> PromptTemplate { self.template }

    pub fn assemble(&self, question: &str, chunks: &[RetrievalResult], history: &[ConversationTurn]) -> String {
        let context = render_context(chunks);
        let history = render_history(history);
        let history = if history.is_empty() { "None" } else { history.as_str() };
        let instructions = match self.template {
            PromptTemplate::Grounded => GROUNDED_INSTRUCTIONS,
            PromptTemplate::ContextOnly => CONTEXT_ONLY_INSTRUCTIONS,
        };
        format!(
            "You are an intelligent assistant, named \"{name}\", that answers questions based on provided context from documents and conversation history.

Context from relevant parts:
{context}

Conversation History:
{history}

User Question: {question}

Instructions:
{instructions}

Answer:",
            name = self.assistant_name,
        )
    }
}

/// `[Part i] (Document: source, Relevance: 0.123)` headers, numbered from 1
/// in retrieval order.
pub fn render_context(chunks: &[RetrievalResult]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!("[Part {}] (Document: {}, Relevance: {:.3})\n{}", i + 1, r.chunk.source, r.similarity_score, r.chunk.text)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn render_history(history: &[ConversationTurn]) -> String {
    history
        .iter()
        .map(|turn| format!("{}: {}", turn.role.label(), turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

//! Domain types shared by the index, the prompt assembler and the relay.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One retrievable unit of source text.
///
/// - `text`: the passage itself (non-empty)
/// - `source`: originating document identifier (file name)
/// - `chunk_id`: position of the passage within `source`, starting at 0
///
/// Identity is `(source, chunk_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source: String,
    pub chunk_id: usize,
}

impl Chunk {
    pub fn new(text: impl Into<String>, source: impl Into<String>, chunk_id: usize) -> Self {
        Self { text: text.into(), source: source.into(), chunk_id }
    }
}

/// A chunk annotated with its similarity to the query. Higher is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    #[serde(flatten)]
    pub chunk: Chunk,
    pub similarity_score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Capitalized label used when rendering history into a prompt.
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Which instruction block the prompt assembler emits.
///
/// `Grounded` lets the model fall back to general knowledge when the question
/// needs no context; `ContextOnly` treats the retrieved context as a ceiling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptTemplate {
    #[default]
    Grounded,
    ContextOnly,
}

use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;

use docqa_core::types::{ConversationTurn, RetrievalResult, Role};

use crate::backend::{ChatMessage, ChatRequest, GenerationBackend};
use crate::frame::Frame;
use crate::prompt::PromptAssembler;
use crate::request::validate_temperature;

/// Finite frame sequence ending in exactly one `Done` or `Error`.
pub type FrameStream = BoxStream<'static, Frame>;

/// Turns a retrieval result plus conversation into a streamed answer.
#[derive(Clone)]
pub struct StreamRelay {
    backend: Arc<dyn GenerationBackend>,
    assembler: PromptAssembler,
}

impl StreamRelay {
    pub fn new(backend: Arc<dyn GenerationBackend>, assembler: PromptAssembler) -> Self {
        Self { backend, assembler }
    }

    pub fn assembler(&self) -> &PromptAssembler { &self.assembler }

    /// History turns in order, then the assembled prompt as the final user message.
    pub fn build_messages(
        &self,
        question: &str,
        chunks: &[RetrievalResult],
        history: &[ConversationTurn],
    ) -> Vec<ChatMessage> {
        let mut messages: Vec<ChatMessage> = history
            .iter()
            .map(|turn| ChatMessage { role: turn.role, content: turn.content.clone() })
            .collect();
        messages.push(ChatMessage { role: Role::User, content: self.assembler.assemble(question, chunks, history) });
        messages
    }

    /// Nothing is sent to the backend until the returned stream is first
    /// polled. Dropping the stream drops the backend stream with it.
    pub fn stream(
        &self,
        question: &str,
        chunks: &[RetrievalResult],
        model_id: &str,
        temperature: f32,
        history: &[ConversationTurn],
    ) -> FrameStream {
        let backend = Arc::clone(&self.backend);
        let request = ChatRequest {
            model: model_id.to_string(),
            messages: self.build_messages(question, chunks, history),
            temperature,
        };

        Box::pin(async_stream::stream! {
            if let Err(e) = validate_temperature(request.temperature) {
                yield Frame::Error(e.to_string());
                return;
            }
            let mut tokens = backend.stream_chat(request);
            let mut emitted = 0usize;
            while let Some(item) = tokens.next().await {
                match item {
                    Ok(token) if token.is_empty() => {}
                    Ok(token) => {
                        emitted += 1;
                        yield Frame::Content(token);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, emitted, "generation stream failed");
                        yield Frame::Error(e.to_string());
                        return;
                    }
                }
            }
            tracing::debug!(emitted, "generation stream complete");
            yield Frame::Done;
        })
    }
}
